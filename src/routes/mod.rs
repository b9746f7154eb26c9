pub mod admin;
pub mod auth;
pub mod public;
pub mod response;

use crate::error::ApiError;
use crate::middleware::XsrfProtection;
use actix_web::web;

/// Registers every JSON route. Session middleware is applied by the caller.
pub fn config_api(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::PathConfig::default().error_handler(|_, _| ApiError::NotFound("Resource not found.".to_string()).into()),
    )
    .configure(public::config_public)
    .configure(auth::config_auth)
    .service(web::scope("/admin").wrap(XsrfProtection).configure(admin::config_admin));
}
