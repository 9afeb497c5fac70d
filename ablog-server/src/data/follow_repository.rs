use crate::domain::DomainError;
use async_trait::async_trait;
use sqlx::{PgPool, Row};

#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Returns `false` when the follow already existed.
    async fn follow(&self, follower_id: i64, following_id: i64) -> Result<bool, DomainError>;
    /// Returns `false` when there was nothing to remove.
    async fn unfollow(&self, follower_id: i64, following_id: i64) -> Result<bool, DomainError>;
    async fn is_following(&self, follower_id: i64, following_id: i64)
        -> Result<bool, DomainError>;
    async fn follower_ids(&self, user_id: i64) -> Result<Vec<i64>, DomainError>;
    async fn following_ids(&self, user_id: i64) -> Result<Vec<i64>, DomainError>;
    /// (followers, following) of a user.
    async fn counts(&self, user_id: i64) -> Result<(i64, i64), DomainError>;
}

pub struct PostgresFollowRepository {
    pool: PgPool,
}

impl PostgresFollowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FollowRepository for PostgresFollowRepository {
    async fn follow(&self, follower_id: i64, following_id: i64) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO follows (follower_id, following_id, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (follower_id, following_id) DO NOTHING
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn unfollow(&self, follower_id: i64, following_id: i64) -> Result<bool, DomainError> {
        let result =
            sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
                .bind(follower_id)
                .bind(following_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_following(
        &self,
        follower_id: i64,
        following_id: i64,
    ) -> Result<bool, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = $2
            ) AS following
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("following")?)
    }

    async fn follower_ids(&self, user_id: i64) -> Result<Vec<i64>, DomainError> {
        let rows = sqlx::query(
            "SELECT follower_id FROM follows WHERE following_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<i64, _>("follower_id").map_err(DomainError::from))
            .collect()
    }

    async fn following_ids(&self, user_id: i64) -> Result<Vec<i64>, DomainError> {
        let rows = sqlx::query(
            "SELECT following_id FROM follows WHERE follower_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<i64, _>("following_id").map_err(DomainError::from))
            .collect()
    }

    async fn counts(&self, user_id: i64) -> Result<(i64, i64), DomainError> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM follows WHERE following_id = $1) AS followers,
                (SELECT COUNT(*) FROM follows WHERE follower_id = $1) AS following
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((row.try_get("followers")?, row.try_get("following")?))
    }
}
