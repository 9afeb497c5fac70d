use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("User not found")]
    UserNotFound,

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Post not found")]
    PostNotFound,

    #[error("Comment not found")]
    CommentNotFound,

    #[error("Category not found")]
    CategoryNotFound,

    #[error("Forbidden: you don't have permission to perform this action")]
    Forbidden,

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl DomainError {
    pub fn to_status_code(&self) -> u16 {
        match self {
            Self::UserNotFound
            | Self::PostNotFound
            | Self::CommentNotFound
            | Self::CategoryNotFound => 404,
            Self::UserAlreadyExists | Self::Conflict(_) => 409,
            Self::InvalidCredentials | Self::Unauthorized(_) => 401,
            Self::Forbidden => 403,
            Self::ValidationError(_) => 400,
            Self::DatabaseError(_) | Self::InternalError(_) => 500,
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.to_status_code() >= 500
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or_default();
                return if constraint.starts_with("users_") {
                    Self::UserAlreadyExists
                } else {
                    Self::Conflict(format!("Duplicate value violates {}", constraint))
                };
            }
        }
        Self::DatabaseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_http_status() {
        assert_eq!(DomainError::PostNotFound.to_status_code(), 404);
        assert_eq!(DomainError::CommentNotFound.to_status_code(), 404);
        assert_eq!(DomainError::InvalidCredentials.to_status_code(), 401);
        assert_eq!(DomainError::Forbidden.to_status_code(), 403);
        assert_eq!(
            DomainError::ValidationError("bad".into()).to_status_code(),
            400
        );
        assert_eq!(DomainError::UserAlreadyExists.to_status_code(), 409);
        assert!(DomainError::DatabaseError("down".into()).is_server_error());
        assert!(!DomainError::Forbidden.is_server_error());
    }

    #[test]
    fn credential_message_does_not_reveal_which_part_failed() {
        assert_eq!(
            DomainError::InvalidCredentials.to_string(),
            "Invalid email or password"
        );
    }
}
