use crate::domain::{Category, DomainError, Tag};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

#[async_trait]
pub trait TaxonomyRepository: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>, DomainError>;
    async fn find_categories(&self, ids: &[i64]) -> Result<Vec<Category>, DomainError>;
    async fn create_category(
        &self,
        name: &str,
        slug: &str,
        description: Option<&str>,
    ) -> Result<Category, DomainError>;
    async fn list_tags(&self) -> Result<Vec<Tag>, DomainError>;
    async fn create_tag(&self, name: &str, slug: &str) -> Result<Tag, DomainError>;
    /// Returns the tag with `slug`, creating it under `name` when missing.
    async fn find_or_create_tag(&self, name: &str, slug: &str) -> Result<Tag, DomainError>;
}

fn category_from_row(row: &PgRow) -> Result<Category, DomainError> {
    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
    })
}

fn tag_from_row(row: &PgRow) -> Result<Tag, DomainError> {
    Ok(Tag {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
    })
}

fn map_duplicate(err: sqlx::Error, what: &str) -> DomainError {
    match DomainError::from(err) {
        DomainError::Conflict(_) => DomainError::Conflict(format!("{} already exists", what)),
        other => other,
    }
}

pub struct PostgresTaxonomyRepository {
    pool: PgPool,
}

impl PostgresTaxonomyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaxonomyRepository for PostgresTaxonomyRepository {
    async fn list_categories(&self) -> Result<Vec<Category>, DomainError> {
        let rows = sqlx::query("SELECT id, name, slug, description FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(category_from_row).collect()
    }

    async fn find_categories(&self, ids: &[i64]) -> Result<Vec<Category>, DomainError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT id, name, slug, description FROM categories WHERE id = ANY($1) ORDER BY name",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(category_from_row).collect()
    }

    async fn create_category(
        &self,
        name: &str,
        slug: &str,
        description: Option<&str>,
    ) -> Result<Category, DomainError> {
        let row = sqlx::query(
            r#"
            INSERT INTO categories (name, slug, description)
            VALUES ($1, $2, $3)
            RETURNING id, name, slug, description
            "#,
        )
        .bind(name)
        .bind(slug)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_duplicate(e, "Category"))?;

        category_from_row(&row)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, DomainError> {
        let rows = sqlx::query("SELECT id, name, slug FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(tag_from_row).collect()
    }

    async fn create_tag(&self, name: &str, slug: &str) -> Result<Tag, DomainError> {
        let row = sqlx::query(
            r#"
            INSERT INTO tags (name, slug)
            VALUES ($1, $2)
            RETURNING id, name, slug
            "#,
        )
        .bind(name)
        .bind(slug)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_duplicate(e, "Tag"))?;

        tag_from_row(&row)
    }

    async fn find_or_create_tag(&self, name: &str, slug: &str) -> Result<Tag, DomainError> {
        // DO UPDATE makes RETURNING yield the existing row as well
        let row = sqlx::query(
            r#"
            INSERT INTO tags (name, slug)
            VALUES ($1, $2)
            ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug
            RETURNING id, name, slug
            "#,
        )
        .bind(name)
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;

        tag_from_row(&row)
    }
}
