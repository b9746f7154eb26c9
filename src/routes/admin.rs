use crate::config::Config;
use crate::error::ApiError;
use crate::helper::admin_helpers::{self, PendingImage};
use crate::helper::form_helpers;
use crate::middleware::AdminUser;
use crate::routes::response;
use crate::{validation, DbPool};
use actix_web::{web, HttpRequest, HttpResponse};
use std::path::Path;

pub fn config_admin(cfg: &mut web::ServiceConfig) {
    // `form-data` must be registered before `{id}`.
    cfg.route("/articles/form-data", web::get().to(form_data))
        .route("/articles", web::get().to(list_articles))
        .route("/articles", web::post().to(create_article))
        .route("/articles/{id}", web::get().to(show_article))
        .route("/articles/{id}", web::put().to(update_article))
        .route("/articles/{id}", web::delete().to(delete_article))
        .route("/comments", web::get().to(list_comments))
        .route("/comments/{id}/approve", web::put().to(approve_comment))
        .route("/comments/{id}", web::delete().to(delete_comment));
}

async fn list_articles(
    _admin: AdminUser,
    req: HttpRequest,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let filters = validation::admin_article_filters(&form_helpers::query_fields(&req), config.locale())?;
    let conn = pool.get()?;
    Ok(response::ok(admin_helpers::list_articles(&conn, &filters, &config.app_url)?))
}

async fn form_data(
    _admin: AdminUser,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let conn = pool.get()?;
    Ok(response::ok(admin_helpers::form_data(&conn, &config.app_url)?))
}

async fn show_article(
    _admin: AdminUser,
    id: web::Path<i64>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let conn = pool.get()?;
    Ok(response::ok(admin_helpers::show_article(&conn, id.into_inner(), &config.app_url)?))
}

async fn create_article(
    _admin: AdminUser,
    req: HttpRequest,
    payload: web::Payload,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let (fields, image) = form_helpers::read_fields(&req, payload, config.max_image_size_kb).await?;
    let conn = pool.get()?;
    let (input, kind) =
        validation::article_store(&conn, &fields, image.as_ref(), config.locale(), config.max_image_size_kb)?;
    let pending = image.zip(kind).map(|(image, kind)| PendingImage { image, kind });

    let article =
        admin_helpers::create_article(&conn, Path::new(&config.storage_path), input, pending, &config.app_url).await?;
    Ok(response::created("Article created.", article))
}

async fn update_article(
    _admin: AdminUser,
    req: HttpRequest,
    id: web::Path<i64>,
    payload: web::Payload,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let (fields, image) = form_helpers::read_fields(&req, payload, config.max_image_size_kb).await?;
    let conn = pool.get()?;
    let (changes, kind) =
        validation::article_update(&conn, &fields, image.as_ref(), config.locale(), config.max_image_size_kb)?;
    let pending = image.zip(kind).map(|(image, kind)| PendingImage { image, kind });

    let article = admin_helpers::update_article(
        &conn,
        Path::new(&config.storage_path),
        id.into_inner(),
        changes,
        pending,
        &config.app_url,
    )
    .await?;
    Ok(response::ok_with_message("Article updated.", article))
}

async fn delete_article(
    _admin: AdminUser,
    id: web::Path<i64>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let conn = pool.get()?;
    admin_helpers::delete_article(&conn, Path::new(&config.storage_path), id.into_inner()).await?;
    Ok(response::ok_with_message("Article deleted.", ()))
}

async fn list_comments(
    _admin: AdminUser,
    req: HttpRequest,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let filters = validation::comment_filters(&form_helpers::query_fields(&req), config.locale())?;
    let conn = pool.get()?;
    Ok(response::ok(admin_helpers::list_comments(&conn, &filters)?))
}

async fn approve_comment(
    _admin: AdminUser,
    req: HttpRequest,
    id: web::Path<i64>,
    payload: web::Payload,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let (fields, _) = form_helpers::read_fields(&req, payload, config.max_image_size_kb).await?;
    let approved = validation::approval(&fields, config.locale())?;
    let conn = pool.get()?;
    let comment = admin_helpers::set_comment_approval(&conn, id.into_inner(), approved)?;
    let message = if approved { "Comment approved." } else { "Comment unapproved." };
    Ok(response::ok_with_message(message, comment))
}

async fn delete_comment(
    _admin: AdminUser,
    id: web::Path<i64>,
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, ApiError> {
    let conn = pool.get()?;
    admin_helpers::delete_comment(&conn, id.into_inner())?;
    Ok(response::ok_with_message("Comment deleted.", ()))
}
