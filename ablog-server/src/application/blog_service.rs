use crate::application::markdown;
use crate::data::comment_repository::CommentRepository;
use crate::data::engagement_repository::EngagementRepository;
use crate::data::post_repository::PostRepository;
use crate::data::taxonomy_repository::TaxonomyRepository;
use crate::data::user_repository::UserRepository;
use crate::domain::post::{
    BookmarkStatus, CreatePostRequest, LikeStatus, Pagination, PostFilter, PostListQuery,
    PostPage, PostResponse, PostStatus, PostWrite, UpdatePostRequest,
};
use crate::domain::slug::{slugify, with_random_suffix};
use crate::domain::user::AuthorSummary;
use crate::domain::{DomainError, Post};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const SLUG_ATTEMPTS: usize = 5;

/// Flips overdue scheduled posts to published. Failures only cost freshness.
pub(crate) async fn sweep_scheduled(posts: &(dyn PostRepository + Send + Sync), now: DateTime<Utc>) {
    match posts.publish_due(now).await {
        Ok(0) => {}
        Ok(n) => tracing::info!("Published {} scheduled post(s)", n),
        Err(e) => tracing::warn!("Scheduled publish sweep failed: {}", e),
    }
}

/// Post by slug as seen by `viewer`; drafts and future posts exist only for their author.
pub(crate) async fn find_visible(
    posts: &(dyn PostRepository + Send + Sync),
    slug: &str,
    viewer: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Post, DomainError> {
    let post = posts.find_by_slug(slug).await?;
    if post.is_public(now) || viewer == Some(post.author_id) {
        Ok(post)
    } else {
        tracing::debug!("Post {} is not visible to {:?}", slug, viewer);
        Err(DomainError::PostNotFound)
    }
}

pub struct BlogService {
    post_repo: Arc<dyn PostRepository + Send + Sync>,
    user_repo: Arc<dyn UserRepository + Send + Sync>,
    taxonomy_repo: Arc<dyn TaxonomyRepository + Send + Sync>,
    comment_repo: Arc<dyn CommentRepository + Send + Sync>,
    engagement_repo: Arc<dyn EngagementRepository + Send + Sync>,
}

impl BlogService {
    pub fn new(
        post_repo: Arc<dyn PostRepository + Send + Sync>,
        user_repo: Arc<dyn UserRepository + Send + Sync>,
        taxonomy_repo: Arc<dyn TaxonomyRepository + Send + Sync>,
        comment_repo: Arc<dyn CommentRepository + Send + Sync>,
        engagement_repo: Arc<dyn EngagementRepository + Send + Sync>,
    ) -> Self {
        Self {
            post_repo,
            user_repo,
            taxonomy_repo,
            comment_repo,
            engagement_repo,
        }
    }

    pub async fn create_post(
        &self,
        author_id: i64,
        req: CreatePostRequest,
    ) -> Result<PostResponse, DomainError> {
        let title = non_empty(&req.title, "Title cannot be empty")?;
        let content = non_empty(&req.content, "Content cannot be empty")?;
        let status = req.status.unwrap_or(PostStatus::Published);
        let scheduled_publish_date = check_schedule(status, req.scheduled_publish_date)?;

        let write = PostWrite {
            slug: self.unique_slug(&title, None).await?,
            excerpt: excerpt_or_derived(req.excerpt, &content),
            cover_image: optional_text(req.cover_image),
            category_ids: self.resolve_categories(&req.categories).await?,
            tag_ids: self.resolve_tags(&req.tags).await?,
            title,
            content,
            status,
            scheduled_publish_date,
        };

        let post = self.post_repo.create(author_id, write).await?;

        tracing::info!(
            "Post created: id={}, slug={}, author_id={}",
            post.id,
            post.slug,
            author_id
        );

        self.decorate_one(post, Some(author_id)).await
    }

    pub async fn get_post(
        &self,
        slug: &str,
        viewer: Option<i64>,
    ) -> Result<PostResponse, DomainError> {
        let now = Utc::now();
        sweep_scheduled(self.post_repo.as_ref(), now).await;

        let post = find_visible(self.post_repo.as_ref(), slug, viewer, now).await?;
        self.decorate_one(post, viewer).await
    }

    pub async fn update_post(
        &self,
        slug: &str,
        user_id: i64,
        req: UpdatePostRequest,
    ) -> Result<PostResponse, DomainError> {
        let post = self.owned_post(slug, user_id, "update").await?;

        let title = match req.title {
            Some(title) => non_empty(&title, "Title cannot be empty")?,
            None => post.title.clone(),
        };
        let content = match req.content {
            Some(content) => non_empty(&content, "Content cannot be empty")?,
            None => post.content.clone(),
        };
        let status = req.status.unwrap_or(post.status);
        let scheduled_publish_date = check_schedule(
            status,
            req.scheduled_publish_date.or(post.scheduled_publish_date),
        )?;

        let slug = if title != post.title {
            self.unique_slug(&title, Some(post.id)).await?
        } else {
            post.slug.clone()
        };

        let category_ids = match req.categories {
            Some(ids) => self.resolve_categories(&ids).await?,
            None => post.categories.iter().map(|c| c.id).collect(),
        };
        let tag_ids = match req.tags {
            Some(names) => self.resolve_tags(&names).await?,
            None => post.tags.iter().map(|t| t.id).collect(),
        };
        let cover_image = match req.cover_image {
            Some(cover) => optional_text(Some(cover)),
            None => post.cover_image.clone(),
        };

        // an excerpt derived from the old content follows the new content
        let stored_excerpt = post
            .excerpt
            .clone()
            .filter(|e| *e != markdown::excerpt(&post.content));

        let write = PostWrite {
            excerpt: excerpt_or_derived(req.excerpt.or(stored_excerpt), &content),
            title,
            slug,
            content,
            cover_image,
            status,
            scheduled_publish_date,
            category_ids,
            tag_ids,
        };

        let updated = self.post_repo.update(post.id, write).await?;

        tracing::info!(
            "Post updated: id={}, slug={}, author_id={}",
            updated.id,
            updated.slug,
            user_id
        );

        self.decorate_one(updated, Some(user_id)).await
    }

    pub async fn delete_post(&self, slug: &str, user_id: i64) -> Result<(), DomainError> {
        let post = self.owned_post(slug, user_id, "delete").await?;

        self.post_repo.delete(post.id).await?;

        tracing::info!("Post deleted: id={}, author_id={}", post.id, user_id);

        Ok(())
    }

    pub async fn list_posts(
        &self,
        query: PostListQuery,
        viewer: Option<i64>,
    ) -> Result<PostPage, DomainError> {
        let page = Pagination::new(query.page, query.limit)?;
        let filter = PostFilter {
            category: query.category.filter(|c| !c.trim().is_empty()),
            tag: query.tag.filter(|t| !t.trim().is_empty()),
            search: query.search,
            author_id: query.author,
            include_scheduled: query.include_scheduled,
            any_status: false,
        };

        tracing::debug!(
            "Listing posts: page={}, limit={}, filter={:?}",
            page.page,
            page.limit,
            filter
        );

        self.page_of(&filter, page, viewer).await
    }

    /// Every post of the author, drafts and future schedules included.
    pub async fn list_my_posts(
        &self,
        user_id: i64,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<PostPage, DomainError> {
        let page = Pagination::new(page, limit)?;
        let filter = PostFilter {
            author_id: Some(user_id),
            any_status: true,
            ..Default::default()
        };

        self.page_of(&filter, page, Some(user_id)).await
    }

    /// Bookmarked posts the user can still see, most recently bookmarked first.
    pub async fn bookmarked_posts(&self, user_id: i64) -> Result<Vec<PostResponse>, DomainError> {
        let now = Utc::now();
        sweep_scheduled(self.post_repo.as_ref(), now).await;

        let ids = self.engagement_repo.bookmarks_of(user_id).await?;
        let mut by_id: HashMap<i64, Post> = self
            .post_repo
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .filter(|p| p.is_public(now) || p.author_id == user_id)
            .map(|p| (p.id, p))
            .collect();

        let posts = ids.iter().filter_map(|id| by_id.remove(id)).collect();
        self.decorate(posts, Some(user_id)).await
    }

    pub async fn like_post(&self, slug: &str, user_id: i64) -> Result<LikeStatus, DomainError> {
        let post = find_visible(self.post_repo.as_ref(), slug, Some(user_id), Utc::now()).await?;
        if self.engagement_repo.add_like(post.id, user_id).await? {
            tracing::info!("User {} liked post {}", user_id, post.id);
        }
        self.like_status(post.id, true).await
    }

    pub async fn unlike_post(&self, slug: &str, user_id: i64) -> Result<LikeStatus, DomainError> {
        let post = find_visible(self.post_repo.as_ref(), slug, Some(user_id), Utc::now()).await?;
        if self.engagement_repo.remove_like(post.id, user_id).await? {
            tracing::info!("User {} unliked post {}", user_id, post.id);
        }
        self.like_status(post.id, false).await
    }

    pub async fn bookmark_post(
        &self,
        slug: &str,
        user_id: i64,
    ) -> Result<BookmarkStatus, DomainError> {
        let post = find_visible(self.post_repo.as_ref(), slug, Some(user_id), Utc::now()).await?;
        self.engagement_repo.add_bookmark(post.id, user_id).await?;
        Ok(BookmarkStatus { bookmarked: true })
    }

    pub async fn unbookmark_post(
        &self,
        slug: &str,
        user_id: i64,
    ) -> Result<BookmarkStatus, DomainError> {
        let post = find_visible(self.post_repo.as_ref(), slug, Some(user_id), Utc::now()).await?;
        self.engagement_repo.remove_bookmark(post.id, user_id).await?;
        Ok(BookmarkStatus { bookmarked: false })
    }

    async fn like_status(&self, post_id: i64, liked: bool) -> Result<LikeStatus, DomainError> {
        let counts = self.engagement_repo.like_counts(&[post_id]).await?;
        Ok(LikeStatus {
            liked,
            like_count: counts.get(&post_id).copied().unwrap_or(0),
        })
    }

    async fn page_of(
        &self,
        filter: &PostFilter,
        page: Pagination,
        viewer: Option<i64>,
    ) -> Result<PostPage, DomainError> {
        let now = Utc::now();
        sweep_scheduled(self.post_repo.as_ref(), now).await;

        let (posts, total) = self.post_repo.list(filter, page, now).await?;
        let posts = self.decorate(posts, viewer).await?;

        Ok(PostPage {
            posts,
            total,
            page: page.page,
            limit: page.limit,
            total_pages: page.total_pages(total),
        })
    }

    /// Loads a post for a mutation by `user_id`. Hidden posts stay 404 for other users.
    async fn owned_post(&self, slug: &str, user_id: i64, action: &str) -> Result<Post, DomainError> {
        let post = find_visible(self.post_repo.as_ref(), slug, Some(user_id), Utc::now()).await?;

        if post.author_id != user_id {
            tracing::warn!(
                "User {} attempted to {} post {} owned by {}",
                user_id,
                action,
                post.id,
                post.author_id
            );
            return Err(DomainError::Forbidden);
        }

        Ok(post)
    }

    async fn unique_slug(&self, title: &str, except_id: Option<i64>) -> Result<String, DomainError> {
        let base = slugify(title);
        if !self.post_repo.slug_exists(&base, except_id).await? {
            return Ok(base);
        }

        for _ in 0..SLUG_ATTEMPTS {
            let candidate = with_random_suffix(&base);
            if !self.post_repo.slug_exists(&candidate, except_id).await? {
                tracing::debug!("Slug {} taken, using {}", base, candidate);
                return Ok(candidate);
            }
        }

        Err(DomainError::Conflict(format!(
            "Could not find a free slug for {}",
            base
        )))
    }

    async fn resolve_categories(&self, ids: &[i64]) -> Result<Vec<i64>, DomainError> {
        let mut unique = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }
        if unique.is_empty() {
            return Ok(unique);
        }

        let found = self.taxonomy_repo.find_categories(&unique).await?;
        if found.len() != unique.len() {
            tracing::warn!("Unknown category among {:?}", unique);
            return Err(DomainError::CategoryNotFound);
        }

        Ok(unique)
    }

    async fn resolve_tags(&self, names: &[String]) -> Result<Vec<i64>, DomainError> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();

        for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            let slug = slugify(name);
            if !seen.insert(slug.clone()) {
                continue;
            }
            let tag = self.taxonomy_repo.find_or_create_tag(name, &slug).await?;
            ids.push(tag.id);
        }

        Ok(ids)
    }

    async fn decorate_one(&self, post: Post, viewer: Option<i64>) -> Result<PostResponse, DomainError> {
        self.decorate(vec![post], viewer)
            .await?
            .pop()
            .ok_or(DomainError::PostNotFound)
    }

    /// Joins authors, counters and the viewer's like/bookmark flags onto posts.
    async fn decorate(
        &self,
        posts: Vec<Post>,
        viewer: Option<i64>,
    ) -> Result<Vec<PostResponse>, DomainError> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        let mut author_ids: Vec<i64> = posts.iter().map(|p| p.author_id).collect();
        author_ids.sort_unstable();
        author_ids.dedup();

        let authors: HashMap<i64, AuthorSummary> = self
            .user_repo
            .find_by_ids(&author_ids)
            .await?
            .iter()
            .map(|u| (u.id, AuthorSummary::from(u)))
            .collect();
        let like_counts = self.engagement_repo.like_counts(&post_ids).await?;
        let comment_counts = self.comment_repo.count_for_posts(&post_ids).await?;

        let (liked, bookmarked) = match viewer {
            Some(user_id) => (
                Some(self.engagement_repo.liked_among(user_id, &post_ids).await?),
                Some(self.engagement_repo.bookmarked_among(user_id, &post_ids).await?),
            ),
            None => (None, None),
        };

        Ok(posts
            .into_iter()
            .map(|post| PostResponse {
                content_html: markdown::render_markdown(&post.content),
                author: authors.get(&post.author_id).cloned(),
                like_count: like_counts.get(&post.id).copied().unwrap_or(0),
                comment_count: comment_counts.get(&post.id).copied().unwrap_or(0),
                liked: liked.as_ref().map(|set| set.contains(&post.id)),
                bookmarked: bookmarked.as_ref().map(|set| set.contains(&post.id)),
                id: post.id,
                title: post.title,
                slug: post.slug,
                content: post.content,
                excerpt: post.excerpt,
                cover_image: post.cover_image,
                author_id: post.author_id,
                status: post.status,
                scheduled_publish_date: post.scheduled_publish_date,
                categories: post.categories,
                tags: post.tags,
                created_at: post.created_at,
                updated_at: post.updated_at,
            })
            .collect())
    }
}

fn non_empty(value: &str, message: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::ValidationError(message.to_string()));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn excerpt_or_derived(excerpt: Option<String>, content: &str) -> Option<String> {
    optional_text(excerpt).or_else(|| {
        let derived = markdown::excerpt(content);
        (!derived.is_empty()).then_some(derived)
    })
}

/// Scheduled posts need a date; other statuses drop it.
fn check_schedule(
    status: PostStatus,
    date: Option<DateTime<Utc>>,
) -> Result<Option<DateTime<Utc>>, DomainError> {
    match (status, date) {
        (PostStatus::Scheduled, None) => Err(DomainError::ValidationError(
            "Scheduled posts need a scheduled_publish_date".to_string(),
        )),
        (PostStatus::Scheduled, date) => Ok(date),
        _ => Ok(None),
    }
}
