use crate::helper::storage_helpers::StorageError;
use crate::models::db_operations::DbError;
use crate::routes::response;
use crate::validation::ValidationErrors;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

/// Every failure a handler can surface, mapped onto the failure envelope.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("The given data was invalid.")]
    Validation(ValidationErrors),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Authentication required.")]
    Unauthenticated,
    #[error("Administrator privileges required.")]
    Forbidden,
    #[error("Login failed")]
    LoginFailed,
    #[error("CSRF token mismatch.")]
    CsrfMismatch,
    #[error("Database error: {0}")]
    Database(#[from] DbError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Session error: {0}")]
    Session(String),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found.", what))
    }
}

impl From<r2d2::Error> for ApiError {
    fn from(e: r2d2::Error) -> Self {
        ApiError::Database(DbError::Pool(e))
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(e: rusqlite::Error) -> Self {
        ApiError::Database(DbError::Rusqlite(e))
    }
}

impl From<actix_session::SessionInsertError> for ApiError {
    fn from(e: actix_session::SessionInsertError) -> Self {
        ApiError::Session(e.to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthenticated | ApiError::LoginFailed => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            // 419 "Page Expired", the status browsers' XSRF clients expect.
            ApiError::CsrfMismatch => StatusCode::from_u16(419).unwrap_or(StatusCode::FORBIDDEN),
            ApiError::Database(_) | ApiError::Storage(_) | ApiError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            ApiError::Validation(errors) => {
                let headline = errors.first_message().unwrap_or("The given data was invalid.");
                response::failure(status, headline, Some(errors))
            }
            ApiError::Database(_) | ApiError::Storage(_) | ApiError::Session(_) => {
                log::error!("Request failed: {}", self);
                response::failure::<()>(status, "Server error. Please try again later.", None)
            }
            other => response::failure::<()>(status, &other.to_string(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use rstest::rstest;
    use serde_json::Value;

    #[rstest]
    #[case(ApiError::Unauthenticated, 401)]
    #[case(ApiError::Forbidden, 403)]
    #[case(ApiError::LoginFailed, 401)]
    #[case(ApiError::CsrfMismatch, 419)]
    #[case(ApiError::not_found("Article"), 404)]
    #[case(ApiError::Validation(ValidationErrors::default()), 422)]
    fn status_mapping(#[case] err: ApiError, #[case] expected: u16) {
        assert_eq!(err.status_code().as_u16(), expected);
    }

    #[actix_web::test]
    async fn validation_envelope_lists_field_errors() {
        let mut errors = ValidationErrors::default();
        errors.record("title", "The title field is required.");
        let res = ApiError::Validation(errors).error_response();
        let body: Value = serde_json::from_slice(&to_bytes(res.into_body()).await.unwrap()).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "The title field is required.");
        assert_eq!(body["errors"]["title"][0], "The title field is required.");
    }

    #[actix_web::test]
    async fn internal_errors_hide_details() {
        let err = ApiError::from(rusqlite::Error::InvalidQuery);
        let res = err.error_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_slice(&to_bytes(res.into_body()).await.unwrap()).unwrap();
        assert_eq!(body["message"], "Server error. Please try again later.");
        assert!(body["errors"].is_null());
    }
}
