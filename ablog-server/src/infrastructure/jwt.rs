use crate::domain::DomainError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    pub exp: usize,
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        if secret.len() < 32 {
            tracing::warn!(
                "JWT secret is too short ({} chars). Minimum recommended is 32 chars.",
                secret.len()
            );
        }

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn generate_token(&self, user_id: i64, username: &str) -> Result<String, DomainError> {
        tracing::debug!("Generating token for user_id: {}", user_id);

        let expiration = Utc::now()
            .checked_add_signed(Duration::days(TOKEN_TTL_DAYS))
            .ok_or_else(|| DomainError::InternalError("Token expiry overflow".to_string()))?
            .timestamp() as usize;

        let claims = Claims {
            user_id,
            username: username.to_string(),
            exp: expiration,
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode token: {}", e);
            DomainError::InternalError(format!("Failed to generate token: {}", e))
        })
    }

    /// Returns the user id carried by a valid, unexpired token.
    pub fn verify_token(&self, token: &str) -> Result<i64, DomainError> {
        match decode::<Claims>(token, &self.decoding_key, &Validation::default()) {
            Ok(token_data) => {
                tracing::debug!("Token verified for user_id: {}", token_data.claims.user_id);
                Ok(token_data.claims.user_id)
            }
            Err(e) => {
                tracing::warn!("Token verification failed: {}", e);
                Err(DomainError::Unauthorized("Invalid or expired token".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-with-at-least-32-characters";

    #[test]
    fn token_round_trips_user_id() {
        let jwt = JwtService::new(SECRET);
        let token = jwt.generate_token(42, "ann").unwrap();
        assert_eq!(jwt.verify_token(&token).unwrap(), 42);
    }

    #[test]
    fn token_expires_in_seven_days() {
        let jwt = JwtService::new(SECRET);
        let token = jwt.generate_token(1, "ann").unwrap();
        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(SECRET.as_bytes()),
            &Validation::default(),
        )
        .unwrap();

        let ttl = data.claims.exp as i64 - Utc::now().timestamp();
        assert!((Duration::days(7).num_seconds() - 5..=Duration::days(7).num_seconds())
            .contains(&ttl));
    }

    #[test]
    fn rejects_foreign_and_garbage_tokens() {
        let ours = JwtService::new(SECRET);
        let theirs = JwtService::new("another-secret-with-at-least-32-chars!");
        let token = theirs.generate_token(1, "mallory").unwrap();

        assert!(matches!(
            ours.verify_token(&token),
            Err(DomainError::Unauthorized(_))
        ));
        assert!(ours.verify_token("not.a.token").is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let jwt = JwtService::new(SECRET);
        let claims = Claims {
            user_id: 1,
            username: "ann".into(),
            exp: (Utc::now() - Duration::hours(1)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(jwt.verify_token(&token).is_err());
    }
}
