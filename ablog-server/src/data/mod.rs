pub mod comment_repository;
pub mod engagement_repository;
pub mod follow_repository;
pub mod local;
pub mod post_repository;
pub mod taxonomy_repository;
pub mod user_repository;

pub use local::LocalStore;

use comment_repository::{CommentRepository, PostgresCommentRepository};
use engagement_repository::{EngagementRepository, PostgresEngagementRepository};
use follow_repository::{FollowRepository, PostgresFollowRepository};
use post_repository::{PostRepository, PostgresPostRepository};
use sqlx::PgPool;
use std::sync::Arc;
use taxonomy_repository::{PostgresTaxonomyRepository, TaxonomyRepository};
use user_repository::{PostgresUserRepository, UserRepository};

/// One store, seen through every repository trait.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository + Send + Sync>,
    pub posts: Arc<dyn PostRepository + Send + Sync>,
    pub taxonomy: Arc<dyn TaxonomyRepository + Send + Sync>,
    pub comments: Arc<dyn CommentRepository + Send + Sync>,
    pub engagement: Arc<dyn EngagementRepository + Send + Sync>,
    pub follows: Arc<dyn FollowRepository + Send + Sync>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PostgresUserRepository::new(pool.clone())),
            posts: Arc::new(PostgresPostRepository::new(pool.clone())),
            taxonomy: Arc::new(PostgresTaxonomyRepository::new(pool.clone())),
            comments: Arc::new(PostgresCommentRepository::new(pool.clone())),
            engagement: Arc::new(PostgresEngagementRepository::new(pool.clone())),
            follows: Arc::new(PostgresFollowRepository::new(pool)),
        }
    }

    pub fn local(store: Arc<LocalStore>) -> Self {
        Self {
            users: store.clone(),
            posts: store.clone(),
            taxonomy: store.clone(),
            comments: store.clone(),
            engagement: store.clone(),
            follows: store,
        }
    }
}
