pub mod auth_service;
pub mod blog_service;
pub mod comment_service;
pub mod markdown;
pub mod taxonomy_service;
pub mod user_service;

pub use auth_service::AuthService;
pub use blog_service::BlogService;
pub use comment_service::CommentService;
pub use taxonomy_service::TaxonomyService;
pub use user_service::UserService;

use crate::data::Repositories;
use crate::infrastructure::jwt::JwtService;
use crate::infrastructure::password::PasswordHasher;
use std::sync::Arc;

/// Every service of the server, wired to the same repositories.
#[derive(Clone)]
pub struct AppServices {
    pub jwt: Arc<JwtService>,
    pub auth: Arc<AuthService>,
    pub blog: Arc<BlogService>,
    pub comments: Arc<CommentService>,
    pub taxonomy: Arc<TaxonomyService>,
    pub users: Arc<UserService>,
}

impl AppServices {
    pub fn new(repos: Repositories, jwt: Arc<JwtService>, hasher: PasswordHasher) -> Self {
        Self {
            auth: Arc::new(AuthService::new(repos.users.clone(), jwt.clone(), hasher)),
            blog: Arc::new(BlogService::new(
                repos.posts.clone(),
                repos.users.clone(),
                repos.taxonomy.clone(),
                repos.comments.clone(),
                repos.engagement.clone(),
            )),
            comments: Arc::new(CommentService::new(
                repos.comments.clone(),
                repos.posts.clone(),
                repos.users.clone(),
            )),
            taxonomy: Arc::new(TaxonomyService::new(repos.taxonomy.clone())),
            users: Arc::new(UserService::new(repos.users, repos.follows, repos.posts)),
            jwt,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::data::LocalStore;
    use crate::domain::post::CreatePostRequest;
    use crate::domain::user::RegisterUserRequest;
    use crate::infrastructure::password::MIN_BCRYPT_COST;

    pub const TEST_SECRET: &str = "test-secret-with-at-least-32-characters";

    pub type Fixture = AppServices;

    impl AppServices {
        /// Services over a fresh in-memory store.
        pub fn in_memory() -> Self {
            AppServices::new(
                Repositories::local(Arc::new(LocalStore::in_memory())),
                Arc::new(JwtService::new(TEST_SECRET)),
                PasswordHasher::new(MIN_BCRYPT_COST),
            )
        }
    }

    /// Registers `username` and returns the new user id.
    pub async fn register(fx: &Fixture, username: &str) -> i64 {
        let (_, user) = fx
            .auth
            .register(RegisterUserRequest {
                email: format!("{}@example.com", username),
                password: "secret123".to_string(),
                username: username.to_string(),
                full_name: None,
            })
            .await
            .unwrap();
        user.id
    }

    pub fn create_request(title: &str) -> CreatePostRequest {
        CreatePostRequest {
            title: title.to_string(),
            content: format!("Body of {}", title),
            excerpt: None,
            cover_image: None,
            status: None,
            scheduled_publish_date: None,
            categories: Vec::new(),
            tags: Vec::new(),
        }
    }
}
