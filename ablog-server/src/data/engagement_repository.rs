use crate::domain::DomainError;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::{HashMap, HashSet};

/// Likes and bookmarks: (post_id, user_id) pairs whose existence is the state.
#[async_trait]
pub trait EngagementRepository: Send + Sync {
    /// Returns `false` when the like already existed.
    async fn add_like(&self, post_id: i64, user_id: i64) -> Result<bool, DomainError>;
    /// Returns `false` when there was nothing to remove.
    async fn remove_like(&self, post_id: i64, user_id: i64) -> Result<bool, DomainError>;
    async fn like_counts(&self, post_ids: &[i64]) -> Result<HashMap<i64, i64>, DomainError>;
    async fn liked_among(&self, user_id: i64, post_ids: &[i64])
        -> Result<HashSet<i64>, DomainError>;

    async fn add_bookmark(&self, post_id: i64, user_id: i64) -> Result<bool, DomainError>;
    async fn remove_bookmark(&self, post_id: i64, user_id: i64) -> Result<bool, DomainError>;
    async fn bookmarked_among(
        &self,
        user_id: i64,
        post_ids: &[i64],
    ) -> Result<HashSet<i64>, DomainError>;
    /// Bookmarked post ids of a user, most recent first.
    async fn bookmarks_of(&self, user_id: i64) -> Result<Vec<i64>, DomainError>;
}

pub struct PostgresEngagementRepository {
    pool: PgPool,
}

impl PostgresEngagementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_pair(&self, table: &str, post_id: i64, user_id: i64) -> Result<bool, DomainError> {
        let result = sqlx::query(&format!(
            "INSERT INTO {} (post_id, user_id, created_at) VALUES ($1, $2, NOW()) \
             ON CONFLICT (post_id, user_id) DO NOTHING",
            table
        ))
        .bind(post_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_pair(&self, table: &str, post_id: i64, user_id: i64) -> Result<bool, DomainError> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE post_id = $1 AND user_id = $2",
            table
        ))
        .bind(post_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn present_among(
        &self,
        table: &str,
        user_id: i64,
        post_ids: &[i64],
    ) -> Result<HashSet<i64>, DomainError> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT post_id FROM {} WHERE user_id = $1 AND post_id = ANY($2)",
            table
        ))
        .bind(user_id)
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<i64, _>("post_id").map_err(DomainError::from))
            .collect()
    }
}

#[async_trait]
impl EngagementRepository for PostgresEngagementRepository {
    async fn add_like(&self, post_id: i64, user_id: i64) -> Result<bool, DomainError> {
        self.insert_pair("likes", post_id, user_id).await
    }

    async fn remove_like(&self, post_id: i64, user_id: i64) -> Result<bool, DomainError> {
        self.delete_pair("likes", post_id, user_id).await
    }

    async fn like_counts(&self, post_ids: &[i64]) -> Result<HashMap<i64, i64>, DomainError> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT post_id, COUNT(*) AS count
            FROM likes
            WHERE post_id = ANY($1)
            GROUP BY post_id
            "#,
        )
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<(i64, i64), DomainError> {
                Ok((row.try_get("post_id")?, row.try_get("count")?))
            })
            .collect()
    }

    async fn liked_among(
        &self,
        user_id: i64,
        post_ids: &[i64],
    ) -> Result<HashSet<i64>, DomainError> {
        self.present_among("likes", user_id, post_ids).await
    }

    async fn add_bookmark(&self, post_id: i64, user_id: i64) -> Result<bool, DomainError> {
        self.insert_pair("bookmarks", post_id, user_id).await
    }

    async fn remove_bookmark(&self, post_id: i64, user_id: i64) -> Result<bool, DomainError> {
        self.delete_pair("bookmarks", post_id, user_id).await
    }

    async fn bookmarked_among(
        &self,
        user_id: i64,
        post_ids: &[i64],
    ) -> Result<HashSet<i64>, DomainError> {
        self.present_among("bookmarks", user_id, post_ids).await
    }

    async fn bookmarks_of(&self, user_id: i64) -> Result<Vec<i64>, DomainError> {
        let rows = sqlx::query(
            "SELECT post_id FROM bookmarks WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<i64, _>("post_id").map_err(DomainError::from))
            .collect()
    }
}
