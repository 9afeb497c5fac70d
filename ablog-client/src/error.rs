use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AblogClientError {
    // HTTP ошибки
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    // Ошибки, которые вернул сервер
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    // Ошибки сериализации/десериализации
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// Тело ответа с ошибкой: { "success": false, "error": "..." }
#[derive(Debug, Deserialize)]
struct FailureBody {
    error: String,
}

impl AblogClientError {
    /// Maps a non-success response to an error, reading the message from the
    /// failure envelope when the body carries one.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<FailureBody>(body)
            .map(|f| f.error)
            .unwrap_or_else(|_| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("Unknown error")
                        .to_string()
                } else {
                    trimmed.to_string()
                }
            });

        match status {
            StatusCode::NOT_FOUND => Self::NotFound(message),
            StatusCode::UNAUTHORIZED => Self::Unauthorized(message),
            StatusCode::FORBIDDEN => Self::Forbidden(message),
            StatusCode::CONFLICT => Self::Conflict(message),
            s if s.is_client_error() => Self::InvalidRequest(message),
            s => Self::ServerError {
                status: s.as_u16(),
                message,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AblogClientError::NotFound(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AblogClientError::Unauthorized(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_failure_envelope() {
        let err = AblogClientError::from_response(
            StatusCode::UNAUTHORIZED,
            r#"{"success":false,"error":"Invalid email or password"}"#,
        );
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "Unauthorized: Invalid email or password");
    }

    #[test]
    fn maps_statuses_to_variants() {
        let body = r#"{"success":false,"error":"x"}"#;
        assert!(AblogClientError::from_response(StatusCode::NOT_FOUND, body).is_not_found());
        assert!(matches!(
            AblogClientError::from_response(StatusCode::FORBIDDEN, body),
            AblogClientError::Forbidden(_)
        ));
        assert!(matches!(
            AblogClientError::from_response(StatusCode::CONFLICT, body),
            AblogClientError::Conflict(_)
        ));
        assert!(matches!(
            AblogClientError::from_response(StatusCode::BAD_REQUEST, body),
            AblogClientError::InvalidRequest(_)
        ));
        assert!(matches!(
            AblogClientError::from_response(StatusCode::BAD_GATEWAY, body),
            AblogClientError::ServerError { status: 502, .. }
        ));
    }

    #[test]
    fn falls_back_to_raw_body_or_reason() {
        let err = AblogClientError::from_response(StatusCode::BAD_REQUEST, "plain text");
        assert_eq!(err.to_string(), "Invalid request: plain text");

        let err = AblogClientError::from_response(StatusCode::NOT_FOUND, "");
        assert_eq!(err.to_string(), "Not found: Not Found");
    }
}
