use crate::domain::DomainError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

const HIDDEN_ERROR: &str = "An unexpected error occurred";

#[derive(Serialize)]
struct Envelope<T> {
    success: bool,
    #[serde(flatten)]
    payload: T,
}

#[derive(Serialize)]
struct Failure<'a> {
    success: bool,
    error: &'a str,
}

/// `200 { success: true, ...payload }`
pub fn ok<T: Serialize>(payload: T) -> HttpResponse {
    HttpResponse::Ok().json(Envelope {
        success: true,
        payload,
    })
}

/// `201 { success: true, ...payload }`
pub fn created<T: Serialize>(payload: T) -> HttpResponse {
    HttpResponse::Created().json(Envelope {
        success: true,
        payload,
    })
}

/// `DomainError` rendered as the failure envelope.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.to_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let message = if self.0.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
            HIDDEN_ERROR.to_string()
        } else {
            self.0.to_string()
        };

        HttpResponse::build(self.status_code()).json(Failure {
            success: false,
            error: &message,
        })
    }
}
