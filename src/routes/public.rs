use crate::config::Config;
use crate::error::ApiError;
use crate::helper::{form_helpers, public_helpers};
use crate::routes::response;
use crate::{validation, DbPool};
use actix_web::{web, HttpRequest, HttpResponse};

pub fn config_public(cfg: &mut web::ServiceConfig) {
    cfg.route("/articles", web::get().to(list_articles))
        .route("/articles/{slug}", web::get().to(show_article))
        .route("/articles/{slug}/comments", web::post().to(submit_comment))
        .route("/articles/{slug}/likes", web::post().to(update_likes))
        .route("/categories", web::get().to(list_categories));
}

async fn list_articles(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let filters = validation::public_article_filters(&form_helpers::query_fields(&req), config.locale())?;
    let conn = pool.get()?;
    let page = public_helpers::list_published(&conn, &filters, &config.app_url)?;
    Ok(response::ok(page))
}

async fn show_article(
    slug: web::Path<String>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let conn = pool.get()?;
    let article = public_helpers::show_published(&conn, &slug, &config.app_url)?;
    Ok(response::ok(article))
}

async fn list_categories(pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    let conn = pool.get()?;
    Ok(response::ok(public_helpers::list_categories(&conn)?))
}

async fn submit_comment(
    req: HttpRequest,
    slug: web::Path<String>,
    payload: web::Payload,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let (fields, _) = form_helpers::read_fields(&req, payload, config.max_image_size_kb).await?;
    let conn = pool.get()?;
    let article_id = public_helpers::published_article_id(&conn, &slug)?;
    let input = validation::comment_store(&conn, &fields, config.locale())?;
    let comment = public_helpers::submit_comment(&conn, article_id, input)?;
    Ok(response::created("Comment submitted. It will appear once approved.", comment))
}

async fn update_likes(
    req: HttpRequest,
    slug: web::Path<String>,
    payload: web::Payload,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let (fields, _) = form_helpers::read_fields(&req, payload, config.max_image_size_kb).await?;
    let liked = validation::like_toggle(&fields, config.locale())?;
    let conn = pool.get()?;
    let summary = public_helpers::update_likes(&conn, &slug, liked)?;
    Ok(response::ok(summary))
}
