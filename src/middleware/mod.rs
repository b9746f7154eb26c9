use crate::error::ApiError;
use crate::models::db_operations::users_db_operations;
use crate::models::{User, UserResource};
use crate::DbPool;
use actix_session::{Session, SessionExt};
use actix_web::{
    body::EitherBody,
    dev::{self, forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    web, Error, FromRequest, HttpRequest, ResponseError,
};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use rand::RngCore;
use std::collections::HashSet;
use std::future::{ready, Ready as StdReady};

pub const SESSION_USER_ID: &str = "user_id";
pub const SESSION_XSRF_TOKEN: &str = "xsrf_token";
pub const XSRF_HEADER: &str = "X-XSRF-TOKEN";

/// Who may use the admin API: a fixed allowlist of email addresses,
/// resolved once from configuration.
#[derive(Debug, Clone, Default)]
pub struct AdminPolicy {
    emails: HashSet<String>,
}

impl AdminPolicy {
    pub fn new(emails: impl IntoIterator<Item = String>) -> Self {
        AdminPolicy { emails: emails.into_iter().map(|e| e.trim().to_lowercase()).collect() }
    }

    pub fn is_admin(&self, user: &User) -> bool {
        self.emails.contains(&user.email.to_lowercase())
    }

    pub fn resource(&self, user: &User) -> UserResource {
        UserResource {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            is_admin: self.is_admin(user),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// The user behind the current session.
pub struct AuthenticatedUser(pub User);

fn load_session_user(req: &HttpRequest) -> Result<User, ApiError> {
    let session = req.get_session();
    let user_id = match session.get::<i64>(SESSION_USER_ID) {
        Ok(Some(id)) => id,
        Ok(None) => return Err(ApiError::Unauthenticated),
        Err(e) => {
            log::warn!("Unreadable session state: {}", e);
            return Err(ApiError::Unauthenticated);
        }
    };

    let pool = req
        .app_data::<web::Data<DbPool>>()
        .ok_or_else(|| ApiError::Session("database pool is not configured".to_string()))?;
    let conn = pool.get()?;
    match users_db_operations::read_user_by_id(&conn, user_id)? {
        Some(user) => Ok(user),
        None => {
            log::warn!("Session refers to deleted user {}; treating as logged out.", user_id);
            session.remove(SESSION_USER_ID);
            Err(ApiError::Unauthenticated)
        }
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = StdReady<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        ready(load_session_user(req).map(AuthenticatedUser))
    }
}

/// A logged-in user who also passes the [`AdminPolicy`].
/// No session gives 401; a session for a non-admin gives 403.
pub struct AdminUser(pub User);

impl FromRequest for AdminUser {
    type Error = ApiError;
    type Future = StdReady<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let result = load_session_user(req).and_then(|user| {
            let policy = req
                .app_data::<web::Data<AdminPolicy>>()
                .ok_or_else(|| ApiError::Session("admin policy is not configured".to_string()))?;
            if policy.is_admin(&user) {
                Ok(AdminUser(user))
            } else {
                log::warn!("User {} attempted to reach the admin API without privileges.", user.id);
                Err(ApiError::Forbidden)
            }
        });
        ready(result)
    }
}

/// Stores a fresh random token in the session and returns it.
pub fn rotate_xsrf_token(session: &Session) -> Result<String, ApiError> {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);
    session.insert(SESSION_XSRF_TOKEN, &token)?;
    Ok(token)
}

/// The session's token, issuing one if none exists yet.
pub fn current_xsrf_token(session: &Session) -> Result<String, ApiError> {
    match session.get::<String>(SESSION_XSRF_TOKEN) {
        Ok(Some(token)) => Ok(token),
        _ => rotate_xsrf_token(session),
    }
}

fn is_state_changing(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

// --- XSRF check for the admin scope ---

/// Rejects state-changing requests from a logged-in session unless they echo
/// the session's token in `X-XSRF-TOKEN`. Requests without a session user pass
/// through so the handler's extractor can answer 401.
pub struct XsrfProtection;

impl<S, B> Transform<S, ServiceRequest> for XsrfProtection
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = XsrfProtectionMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(XsrfProtectionMiddleware { service })
    }
}

pub struct XsrfProtectionMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for XsrfProtectionMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let is_valid = if is_state_changing(req.method()) {
            let session = req.get_session();
            match session.get::<i64>(SESSION_USER_ID) {
                Ok(Some(_)) => {
                    let expected = session.get::<String>(SESSION_XSRF_TOKEN).ok().flatten();
                    let sent = req.headers().get(XSRF_HEADER).and_then(|v| v.to_str().ok());
                    matches!((expected.as_deref(), sent), (Some(expected), Some(sent)) if expected == sent)
                }
                _ => true,
            }
        } else {
            true
        };

        if is_valid {
            let fut = self.service.call(req);
            Box::pin(async move {
                let res = fut.await?;
                Ok(res.map_into_left_body())
            })
        } else {
            Box::pin(async move {
                log::warn!("Rejected {} {} with a missing or stale XSRF token.", req.method(), req.path());
                let (http_req, _payload) = req.into_parts();
                let res = ApiError::CsrfMismatch.error_response().map_into_right_body();
                Ok(ServiceResponse::new(http_req, res))
            })
        }
    }
}
