use crate::domain::post::{Pagination, PostFilter, PostWrite};
use crate::domain::{Category, DomainError, Post, Tag};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use std::collections::HashMap;

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, author_id: i64, post: PostWrite) -> Result<Post, DomainError>;
    async fn find_by_slug(&self, slug: &str) -> Result<Post, DomainError>;
    /// Posts for the given ids, in no particular order; unknown ids are skipped.
    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Post>, DomainError>;
    async fn slug_exists(&self, slug: &str, except_id: Option<i64>) -> Result<bool, DomainError>;
    /// Overwrites the whole record, including its category and tag links.
    async fn update(&self, id: i64, post: PostWrite) -> Result<Post, DomainError>;
    /// Removes the post together with its comments, likes, bookmarks and links.
    async fn delete(&self, id: i64) -> Result<(), DomainError>;
    /// One page of matching posts, newest first, plus the total match count.
    async fn list(
        &self,
        filter: &PostFilter,
        page: Pagination,
        now: DateTime<Utc>,
    ) -> Result<(Vec<Post>, i64), DomainError>;
    async fn count_published_by_author(&self, author_id: i64) -> Result<i64, DomainError>;
    /// Flips scheduled posts whose publish date has passed to published.
    async fn publish_due(&self, now: DateTime<Utc>) -> Result<u64, DomainError>;
}

const POST_COLUMNS: &str = "posts.id, posts.title, posts.slug, posts.content, posts.excerpt, \
     posts.cover_image, posts.author_id, posts.status, posts.scheduled_publish_date, \
     posts.created_at, posts.updated_at";

fn post_from_row(row: &PgRow) -> Result<Post, DomainError> {
    let status: String = row.try_get("status")?;

    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        content: row.try_get("content")?,
        excerpt: row.try_get("excerpt")?,
        cover_image: row.try_get("cover_image")?,
        author_id: row.try_get("author_id")?,
        status: status.parse()?,
        scheduled_publish_date: row.try_get("scheduled_publish_date")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        categories: Vec::new(),
        tags: Vec::new(),
    })
}

/// Escapes LIKE wildcards so search text matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn push_filter<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &PostFilter, now: DateTime<Utc>) {
    qb.push(" WHERE ");
    if filter.any_status {
        qb.push("TRUE");
    } else {
        qb.push("(posts.status = 'published'");
        if filter.include_scheduled {
            qb.push(" OR (posts.status = 'scheduled' AND posts.scheduled_publish_date <= ")
                .push_bind(now)
                .push(")");
        }
        qb.push(")");
    }

    if let Some(author_id) = filter.author_id {
        qb.push(" AND posts.author_id = ").push_bind(author_id);
    }
    if let Some(category) = &filter.category {
        qb.push(
            " AND EXISTS (SELECT 1 FROM post_categories pc \
             JOIN categories c ON c.id = pc.category_id \
             WHERE pc.post_id = posts.id AND c.slug = ",
        )
        .push_bind(category.clone())
        .push(")");
    }
    if let Some(tag) = &filter.tag {
        qb.push(
            " AND EXISTS (SELECT 1 FROM post_tags pt \
             JOIN tags t ON t.id = pt.tag_id \
             WHERE pt.post_id = posts.id AND t.slug = ",
        )
        .push_bind(tag.clone())
        .push(")");
    }
    if let Some(search) = filter.search_term() {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (posts.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR posts.content ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

async fn link_taxonomy(
    tx: &mut Transaction<'_, Postgres>,
    post_id: i64,
    category_ids: &[i64],
    tag_ids: &[i64],
) -> Result<(), DomainError> {
    sqlx::query(
        r#"
        INSERT INTO post_categories (post_id, category_id)
        SELECT $1, UNNEST($2::BIGINT[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(post_id)
    .bind(category_ids)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO post_tags (post_id, tag_id)
        SELECT $1, UNNEST($2::BIGINT[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(post_id)
    .bind(tag_ids)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub struct PostgresPostRepository {
    pool: PgPool,
}

impl PostgresPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads categories and tags for every post in one query each.
    async fn attach_taxonomy(&self, posts: &mut [Post]) -> Result<(), DomainError> {
        if posts.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();

        let category_rows = sqlx::query(
            r#"
            SELECT pc.post_id, c.id, c.name, c.slug, c.description
            FROM post_categories pc
            JOIN categories c ON c.id = pc.category_id
            WHERE pc.post_id = ANY($1)
            ORDER BY c.name
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut categories: HashMap<i64, Vec<Category>> = HashMap::new();
        for row in category_rows {
            categories
                .entry(row.try_get("post_id")?)
                .or_default()
                .push(Category {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    slug: row.try_get("slug")?,
                    description: row.try_get("description")?,
                });
        }

        let tag_rows = sqlx::query(
            r#"
            SELECT pt.post_id, t.id, t.name, t.slug
            FROM post_tags pt
            JOIN tags t ON t.id = pt.tag_id
            WHERE pt.post_id = ANY($1)
            ORDER BY t.name
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut tags: HashMap<i64, Vec<Tag>> = HashMap::new();
        for row in tag_rows {
            tags.entry(row.try_get("post_id")?).or_default().push(Tag {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                slug: row.try_get("slug")?,
            });
        }

        for post in posts.iter_mut() {
            post.categories = categories.remove(&post.id).unwrap_or_default();
            post.tags = tags.remove(&post.id).unwrap_or_default();
        }

        Ok(())
    }

    async fn fetch_single(&self, mut qb: QueryBuilder<'_, Postgres>) -> Result<Post, DomainError> {
        let row = qb.build().fetch_optional(&self.pool).await?;

        match row {
            Some(row) => {
                let mut post = post_from_row(&row)?;
                self.attach_taxonomy(std::slice::from_mut(&mut post)).await?;
                Ok(post)
            }
            None => Err(DomainError::PostNotFound),
        }
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn create(&self, author_id: i64, post: PostWrite) -> Result<Post, DomainError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO posts (title, slug, content, excerpt, cover_image, author_id,
                               status, scheduled_publish_date, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            RETURNING {}
            "#,
            POST_COLUMNS
        ))
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(&post.cover_image)
        .bind(author_id)
        .bind(post.status.as_str())
        .bind(post.scheduled_publish_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create post: {}", e);
            DomainError::from(e)
        })?;

        let mut created = post_from_row(&row)?;
        link_taxonomy(&mut tx, created.id, &post.category_ids, &post.tag_ids).await?;
        tx.commit().await?;

        self.attach_taxonomy(std::slice::from_mut(&mut created))
            .await?;
        Ok(created)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Post, DomainError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM posts WHERE posts.slug = ",
            POST_COLUMNS
        ));
        qb.push_bind(slug.to_string());
        self.fetch_single(qb).await
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Post>, DomainError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT {} FROM posts WHERE posts.id = ANY($1)",
            POST_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut posts = rows
            .iter()
            .map(post_from_row)
            .collect::<Result<Vec<Post>, DomainError>>()?;
        self.attach_taxonomy(&mut posts).await?;
        Ok(posts)
    }

    async fn slug_exists(&self, slug: &str, except_id: Option<i64>) -> Result<bool, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM posts
                WHERE slug = $1 AND ($2::BIGINT IS NULL OR id <> $2)
            ) AS taken
            "#,
        )
        .bind(slug)
        .bind(except_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("taken")?)
    }

    async fn update(&self, id: i64, post: PostWrite) -> Result<Post, DomainError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE posts
            SET
                title = $1,
                slug = $2,
                content = $3,
                excerpt = $4,
                cover_image = $5,
                status = $6,
                scheduled_publish_date = $7,
                updated_at = NOW()
            WHERE id = $8
            RETURNING {}
            "#,
            POST_COLUMNS
        ))
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(&post.cover_image)
        .bind(post.status.as_str())
        .bind(post.scheduled_publish_date)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let mut updated = match row {
            Some(row) => post_from_row(&row)?,
            None => return Err(DomainError::PostNotFound),
        };

        sqlx::query("DELETE FROM post_categories WHERE post_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        link_taxonomy(&mut tx, id, &post.category_ids, &post.tag_ids).await?;

        tx.commit().await?;

        self.attach_taxonomy(std::slice::from_mut(&mut updated))
            .await?;
        Ok(updated)
    }

    async fn delete(&self, id: i64) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await?;

        for table in ["comments", "likes", "bookmarks", "post_categories", "post_tags"] {
            sqlx::query(&format!("DELETE FROM {} WHERE post_id = $1", table))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            // dropping the transaction rolls it back
            return Err(DomainError::PostNotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list(
        &self,
        filter: &PostFilter,
        page: Pagination,
        now: DateTime<Utc>,
    ) -> Result<(Vec<Post>, i64), DomainError> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS count FROM posts");
        push_filter(&mut count_qb, filter, now);
        let total: i64 = count_qb
            .build()
            .fetch_one(&self.pool)
            .await?
            .try_get("count")?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM posts", POST_COLUMNS));
        push_filter(&mut qb, filter, now);
        qb.push(" ORDER BY posts.created_at DESC, posts.id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = qb.build().fetch_all(&self.pool).await?;

        let mut posts = rows
            .iter()
            .map(post_from_row)
            .collect::<Result<Vec<Post>, DomainError>>()?;
        self.attach_taxonomy(&mut posts).await?;

        Ok((posts, total))
    }

    async fn count_published_by_author(&self, author_id: i64) -> Result<i64, DomainError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM posts WHERE author_id = $1 AND status = 'published'",
        )
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("count")?)
    }

    async fn publish_due(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET status = 'published', updated_at = NOW()
            WHERE status = 'scheduled' AND scheduled_publish_date <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
