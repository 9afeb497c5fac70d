use crate::data::user_repository::UserRepository;
use crate::domain::user::{LoginUserRequest, NewUser, RegisterUserRequest, UserResponse};
use crate::domain::DomainError;
use crate::infrastructure::jwt::JwtService;
use crate::infrastructure::password::PasswordHasher;
use std::sync::Arc;

const MIN_PASSWORD_LEN: usize = 6;

pub struct AuthService {
    user_repo: Arc<dyn UserRepository + Send + Sync>,
    jwt_service: Arc<JwtService>,
    hasher: PasswordHasher,
}

impl AuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository + Send + Sync>,
        jwt_service: Arc<JwtService>,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            user_repo,
            jwt_service,
            hasher,
        }
    }

    pub async fn register(
        &self,
        req: RegisterUserRequest,
    ) -> Result<(String, UserResponse), DomainError> {
        let email = req.email.trim().to_lowercase();
        let username = req.username.trim().to_string();
        tracing::debug!("Registration attempt: username={}, email={}", username, email);

        validate_registration(&email, &req.password, &username)?;

        if self.user_repo.find_by_username(&username).await.is_ok() {
            tracing::warn!("Registration failed: username {} already exists", username);
            return Err(DomainError::UserAlreadyExists);
        }
        if self.user_repo.find_by_email(&email).await.is_ok() {
            tracing::warn!("Registration failed: email {} already exists", email);
            return Err(DomainError::UserAlreadyExists);
        }

        let password_hash = self.hasher.hash(&req.password)?;

        let full_name = req
            .full_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let user = self
            .user_repo
            .create(NewUser {
                email,
                password_hash,
                username,
                full_name,
            })
            .await?;

        let token = self.jwt_service.generate_token(user.id, &user.username)?;

        tracing::info!(
            "User registered successfully: id={}, username={}",
            user.id,
            user.username
        );
        Ok((token, UserResponse::from(user)))
    }

    pub async fn login(
        &self,
        req: LoginUserRequest,
    ) -> Result<(String, UserResponse), DomainError> {
        let email = req.email.trim().to_lowercase();
        tracing::debug!("Login attempt: email={}", email);

        // unknown email and wrong password must look the same to the caller
        let user = match self.user_repo.find_by_email(&email).await {
            Ok(user) => user,
            Err(DomainError::UserNotFound) => {
                self.hasher.verify_absent(&req.password);
                tracing::warn!("Login failed: no user with email {}", email);
                return Err(DomainError::InvalidCredentials);
            }
            Err(e) => return Err(e),
        };

        if !self.hasher.verify(&req.password, &user.password_hash)? {
            tracing::warn!("Login failed: wrong password for user {}", user.username);
            return Err(DomainError::InvalidCredentials);
        }

        let token = self.jwt_service.generate_token(user.id, &user.username)?;

        tracing::info!(
            "User logged in successfully: id={}, username={}",
            user.id,
            user.username
        );
        Ok((token, UserResponse::from(user)))
    }

    pub async fn current_user(&self, user_id: i64) -> Result<UserResponse, DomainError> {
        let user = self.user_repo.find_by_id(user_id).await?;
        Ok(UserResponse::from(user))
    }
}

fn validate_registration(email: &str, password: &str, username: &str) -> Result<(), DomainError> {
    if !email.contains('@') {
        return Err(DomainError::ValidationError(
            "A valid email is required".to_string(),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let valid_username = (3..=30).contains(&username.chars().count())
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid_username {
        return Err(DomainError::ValidationError(
            "Username must be 3-30 characters of letters, digits or underscores".to_string(),
        ));
    }

    Ok(())
}
