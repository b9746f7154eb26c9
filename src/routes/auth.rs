use crate::config::Config;
use crate::error::ApiError;
use crate::helper::form_helpers;
use crate::middleware::{self, AdminPolicy, AuthenticatedUser, SESSION_USER_ID};
use crate::models::db_operations::users_db_operations;
use crate::models::UserResource;
use crate::routes::response;
use crate::{validation, DbPool};
use actix_session::Session;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Serialize;

#[derive(Serialize)]
struct SessionState {
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<UserResource>,
    xsrf_token: String,
}

pub fn config_auth(cfg: &mut web::ServiceConfig) {
    cfg.route("/login", web::post().to(login))
        .route("/logout", web::post().to(logout))
        .route("/csrf-cookie", web::get().to(csrf_cookie))
        .route("/user", web::get().to(current_user));
}

async fn login(
    req: HttpRequest,
    payload: web::Payload,
    session: Session,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    policy: web::Data<AdminPolicy>,
) -> Result<HttpResponse, ApiError> {
    let (fields, _) = form_helpers::read_fields(&req, payload, config.max_image_size_kb).await?;
    let credentials = validation::login(&fields, config.locale())?;

    let conn = pool.get()?;
    let user = match users_db_operations::verify_credentials(&conn, &credentials.email, &credentials.password)? {
        Some(user) => user,
        None => {
            log::warn!("Failed login attempt for '{}'.", credentials.email);
            return Err(ApiError::LoginFailed);
        }
    };

    // New session id on privilege change.
    session.renew();
    session.insert(SESSION_USER_ID, user.id)?;
    let xsrf_token = middleware::rotate_xsrf_token(&session)?;
    log::info!("User {} logged in.", user.id);

    Ok(response::ok_with_message(
        "Login successful",
        SessionState { user: Some(policy.resource(&user)), xsrf_token },
    ))
}

async fn logout(session: Session) -> Result<HttpResponse, ApiError> {
    if let Ok(Some(user_id)) = session.get::<i64>(SESSION_USER_ID) {
        log::info!("User {} logged out.", user_id);
    }
    session.clear();
    session.renew();
    let xsrf_token = middleware::rotate_xsrf_token(&session)?;
    Ok(response::ok_with_message("Logged out successfully", SessionState { user: None, xsrf_token }))
}

async fn csrf_cookie(session: Session) -> Result<HttpResponse, ApiError> {
    let xsrf_token = middleware::current_xsrf_token(&session)?;
    Ok(response::ok(SessionState { user: None, xsrf_token }))
}

async fn current_user(user: AuthenticatedUser, policy: web::Data<AdminPolicy>) -> HttpResponse {
    response::ok(policy.resource(&user.0))
}
