use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Serialize;

/// `{success: true, message, data}`
#[derive(Serialize)]
pub struct SuccessBody<'a, T: Serialize> {
    pub success: bool,
    pub message: Option<&'a str>,
    pub data: T,
}

/// `{success: false, message, errors}`
#[derive(Serialize)]
pub struct FailureBody<'a, E: Serialize> {
    pub success: bool,
    pub message: &'a str,
    pub errors: Option<E>,
}

pub fn respond<T: Serialize>(status: StatusCode, message: Option<&str>, data: T) -> HttpResponse {
    HttpResponse::build(status).json(SuccessBody { success: true, message, data })
}

pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    respond(StatusCode::OK, None, data)
}

pub fn ok_with_message<T: Serialize>(message: &str, data: T) -> HttpResponse {
    respond(StatusCode::OK, Some(message), data)
}

pub fn created<T: Serialize>(message: &str, data: T) -> HttpResponse {
    respond(StatusCode::CREATED, Some(message), data)
}

pub fn failure<E: Serialize>(status: StatusCode, message: &str, errors: Option<E>) -> HttpResponse {
    HttpResponse::build(status).json(FailureBody { success: false, message, errors })
}
