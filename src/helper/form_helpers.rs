use crate::error::ApiError;
use crate::helper::storage_helpers::UploadedImage;
use crate::validation::FieldMap;
use actix_multipart::Multipart;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::{web, HttpRequest};
use futures_util::StreamExt;
use serde_json::Value;
use url::form_urlencoded;

const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;
const IMAGE_FIELD: &str = "image";

/// Query string parameters as string-valued fields.
pub fn query_fields(req: &HttpRequest) -> FieldMap {
    parse_urlencoded(req.query_string().as_bytes())
}

fn parse_urlencoded(bytes: &[u8]) -> FieldMap {
    form_urlencoded::parse(bytes)
        .into_owned()
        .map(|(k, v)| (k, Value::String(v)))
        .collect()
}

fn content_type(req: &HttpRequest) -> String {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Reads a JSON, urlencoded or multipart body into fields plus the optional
/// `image` file part. The file is buffered up to one byte past `max_image_kb`,
/// enough for validation to reject it as too large.
pub async fn read_fields(
    req: &HttpRequest,
    payload: web::Payload,
    max_image_kb: u64,
) -> Result<(FieldMap, Option<UploadedImage>), ApiError> {
    let content_type = content_type(req);
    if content_type.starts_with("multipart/form-data") {
        return read_multipart(req, payload, max_image_kb).await;
    }

    let body = read_body(payload).await?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok((FieldMap::new(), None));
    }

    if content_type.starts_with("application/x-www-form-urlencoded") {
        return Ok((parse_urlencoded(&body), None));
    }

    match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(map)) => Ok((map, None)),
        Ok(_) => Err(ApiError::BadRequest("Request body must be a JSON object.".to_string())),
        Err(e) => Err(ApiError::BadRequest(format!("Malformed JSON body: {}", e))),
    }
}

async fn read_body(mut payload: web::Payload) -> Result<web::BytesMut, ApiError> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| ApiError::BadRequest(format!("Failed to read request body: {}", e)))?;
        if body.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(ApiError::BadRequest("Request body is too large.".to_string()));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

async fn read_multipart(
    req: &HttpRequest,
    payload: web::Payload,
    max_image_kb: u64,
) -> Result<(FieldMap, Option<UploadedImage>), ApiError> {
    let image_limit = (max_image_kb as usize).saturating_mul(1024).saturating_add(1);
    let mut multipart = Multipart::new(req.headers(), payload);
    let mut fields = FieldMap::new();
    let mut image = None;
    let mut text_bytes = 0usize;

    while let Some(item) = multipart.next().await {
        let mut field = item.map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?;
        let name = field.content_disposition().get_name().unwrap_or_default().to_string();
        let file_name = field.content_disposition().get_filename().map(str::to_string);

        if name == IMAGE_FIELD && file_name.is_some() {
            let content_type = field.content_type().map(|m| m.essence_str().to_string());
            let mut bytes = Vec::new();
            while let Some(chunk) = field.next().await {
                let chunk = chunk.map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
                let room = image_limit.saturating_sub(bytes.len());
                bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
            }
            // An empty file input is sent as a nameless, empty part.
            if !bytes.is_empty() {
                image = Some(UploadedImage { file_name, content_type, bytes });
            }
            continue;
        }

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::BadRequest(format!("Failed to read form field: {}", e)))?;
            text_bytes += chunk.len();
            if text_bytes > MAX_BODY_BYTES {
                return Err(ApiError::BadRequest("Request body is too large.".to_string()));
            }
            data.extend_from_slice(&chunk);
        }
        let value = String::from_utf8(data)
            .map_err(|_| ApiError::BadRequest(format!("Invalid UTF-8 in form field '{}'.", name)))?;
        fields.insert(name, Value::String(value));
    }

    Ok((fields, image))
}
