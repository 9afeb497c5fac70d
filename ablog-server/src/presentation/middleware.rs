use crate::domain::DomainError;
use crate::infrastructure::jwt::JwtService;
use crate::presentation::response::ApiError;
use actix_web::dev::Payload;
use actix_web::http::header::Header;
use actix_web::{web, FromRequest, HttpRequest};
use actix_web_httpauth::headers::authorization::{Authorization, Bearer};
use std::future::{ready, Ready};
use std::sync::Arc;

/// Caller resolved from `Authorization: Bearer <jwt>`.
///
/// Handlers that take `Option<AuthUser>` accept anonymous requests; a missing
/// or invalid token then yields `None` instead of a 401.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: i64,
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, DomainError> {
    let jwt_service = req
        .app_data::<web::Data<Arc<JwtService>>>()
        .ok_or_else(|| DomainError::InternalError("JWT service not configured".to_string()))?;

    let header = Authorization::<Bearer>::parse(req).map_err(|_| {
        DomainError::Unauthorized("Missing or malformed bearer token".to_string())
    })?;
    let bearer = header.into_scheme();

    let id = jwt_service.verify_token(bearer.token())?;
    Ok(AuthUser { id })
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req).map_err(|e| {
            tracing::debug!("Rejected request to {}: {}", req.path(), e);
            ApiError(e)
        }))
    }
}
