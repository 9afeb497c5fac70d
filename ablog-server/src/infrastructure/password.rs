use crate::domain::DomainError;

/// Work factor bounds accepted by bcrypt.
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

const DUMMY_PASSWORD: &str = "ablog-no-such-account";

/// bcrypt hashing with a configurable work factor.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
    // hash at the same cost, checked when a login names no account
    dummy_hash: Option<String>,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        let dummy_hash = match bcrypt::hash(DUMMY_PASSWORD, cost) {
            Ok(hash) => Some(hash),
            Err(e) => {
                tracing::warn!("Failed to prepare dummy password hash: {}", e);
                None
            }
        };

        Self { cost, dummy_hash }
    }

    pub fn hash(&self, password: &str) -> Result<String, DomainError> {
        bcrypt::hash(password, self.cost).map_err(|e| {
            tracing::error!("Password hashing failed: {}", e);
            DomainError::InternalError(format!("Password hashing failed: {}", e))
        })
    }

    /// `Ok(false)` on mismatch; `Err` only when the stored hash is malformed.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, DomainError> {
        bcrypt::verify(password, hash).map_err(|e| {
            tracing::error!("Invalid password hash format: {}", e);
            DomainError::InternalError(format!("Invalid password hash: {}", e))
        })
    }

    /// Spends the same bcrypt work as `verify` without a stored hash.
    pub fn verify_absent(&self, password: &str) {
        if let Some(hash) = &self.dummy_hash {
            let _ = bcrypt::verify(password, hash);
        }
    }
}
