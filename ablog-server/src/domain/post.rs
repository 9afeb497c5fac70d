use super::taxonomy::{Category, Tag};
use super::user::AuthorSummary;
use super::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Published,
    Draft,
    Scheduled,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "published" => Ok(Self::Published),
            "draft" => Ok(Self::Draft),
            "scheduled" => Ok(Self::Scheduled),
            other => Err(DomainError::ValidationError(format!(
                "Unknown post status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub author_id: i64,
    pub status: PostStatus,
    pub scheduled_publish_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Post {
    /// A scheduled post whose publish date has passed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == PostStatus::Scheduled
            && self
                .scheduled_publish_date
                .is_some_and(|date| date <= now)
    }

    /// Visible to readers other than the author.
    pub fn is_public(&self, now: DateTime<Utc>) -> bool {
        self.status == PostStatus::Published || self.is_due(now)
    }
}

/// Full record written on create and on update.
#[derive(Debug, Clone)]
pub struct PostWrite {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub status: PostStatus,
    pub scheduled_publish_date: Option<DateTime<Utc>>,
    pub category_ids: Vec<i64>,
    pub tag_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub status: Option<PostStatus>,
    pub scheduled_publish_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub categories: Vec<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub status: Option<PostStatus>,
    pub scheduled_publish_date: Option<DateTime<Utc>>,
    pub categories: Option<Vec<i64>>,
    pub tags: Option<Vec<String>>,
}

/// Page/limit pair; page is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Result<Self, DomainError> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);

        if page < 1 {
            return Err(DomainError::ValidationError(
                "Page must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(DomainError::ValidationError(format!(
                "Limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        if (page - 1).checked_mul(limit).is_none() {
            return Err(DomainError::ValidationError(
                "Page is out of range".to_string(),
            ));
        }

        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        (total + self.limit - 1) / self.limit
    }
}

/// Which posts a listing selects.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub author_id: Option<i64>,
    pub include_scheduled: bool,
    /// Drafts and future scheduled posts too; only used for an author's own listing.
    pub any_status: bool,
}

impl PostFilter {
    pub fn matches(&self, post: &Post, now: DateTime<Utc>) -> bool {
        let status_ok = self.any_status
            || post.status == PostStatus::Published
            || (self.include_scheduled && post.is_due(now));
        if !status_ok {
            return false;
        }

        if let Some(author_id) = self.author_id {
            if post.author_id != author_id {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if !post.categories.iter().any(|c| &c.slug == category) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !post.tags.iter().any(|t| &t.slug == tag) {
                return false;
            }
        }
        if let Some(search) = self.search_term() {
            let needle = search.to_lowercase();
            if !post.title.to_lowercase().contains(&needle)
                && !post.content.to_lowercase().contains(&needle)
            {
                return false;
            }
        }

        true
    }

    /// Trimmed search text, `None` when blank.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

// Query string of GET /api/posts
#[derive(Debug, Default, Deserialize)]
pub struct PostListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub author: Option<i64>,
    #[serde(rename = "includeScheduled", default)]
    pub include_scheduled: bool,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub content_html: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub author_id: i64,
    pub author: Option<AuthorSummary>,
    pub status: PostStatus,
    pub scheduled_publish_date: Option<DateTime<Utc>>,
    pub categories: Vec<Category>,
    pub tags: Vec<Tag>,
    pub like_count: i64,
    pub comment_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookmarked: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PostPage {
    pub posts: Vec<PostResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

/// State reported after a like or unlike.
#[derive(Debug, Serialize)]
pub struct LikeStatus {
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Serialize)]
pub struct BookmarkStatus {
    pub bookmarked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn post(status: PostStatus, scheduled: Option<DateTime<Utc>>) -> Post {
        let now = Utc::now();
        Post {
            id: 1,
            title: "Learning Rust".into(),
            slug: "learning-rust".into(),
            content: "Ownership and Borrowing".into(),
            excerpt: None,
            cover_image: None,
            author_id: 3,
            status,
            scheduled_publish_date: scheduled,
            created_at: now,
            updated_at: now,
            categories: vec![Category {
                id: 1,
                name: "Programming".into(),
                slug: "programming".into(),
                description: None,
            }],
            tags: vec![Tag {
                id: 2,
                name: "rust".into(),
                slug: "rust".into(),
            }],
        }
    }

    #[test]
    fn pagination_offset_and_total_pages() {
        let p = Pagination::new(Some(3), Some(10)).unwrap();
        assert_eq!(p.offset(), 20);
        assert_eq!(p.total_pages(0), 0);
        assert_eq!(p.total_pages(20), 2);
        assert_eq!(p.total_pages(21), 3);
    }

    #[test]
    fn pagination_defaults_and_bounds() {
        let p = Pagination::new(None, None).unwrap();
        assert_eq!((p.page, p.limit), (1, DEFAULT_PAGE_SIZE));
        assert!(Pagination::new(Some(0), None).is_err());
        assert!(Pagination::new(None, Some(0)).is_err());
        assert!(Pagination::new(None, Some(MAX_PAGE_SIZE + 1)).is_err());
    }

    #[test]
    fn pagination_rejects_pages_whose_offset_overflows() {
        assert!(matches!(
            Pagination::new(Some(i64::MAX), Some(10)),
            Err(DomainError::ValidationError(_))
        ));

        let last = i64::MAX / MAX_PAGE_SIZE + 1;
        let p = Pagination::new(Some(last), Some(MAX_PAGE_SIZE)).unwrap();
        assert!(p.offset() > 0);
    }

    #[test]
    fn filter_hides_drafts_and_future_schedules() {
        let now = Utc::now();
        let filter = PostFilter {
            include_scheduled: true,
            ..Default::default()
        };
        assert!(filter.matches(&post(PostStatus::Published, None), now));
        assert!(!filter.matches(&post(PostStatus::Draft, None), now));
        assert!(!filter.matches(
            &post(PostStatus::Scheduled, Some(now + Duration::hours(1))),
            now
        ));
        assert!(filter.matches(
            &post(PostStatus::Scheduled, Some(now - Duration::hours(1))),
            now
        ));
    }

    #[test]
    fn overdue_schedule_needs_include_flag() {
        let now = Utc::now();
        let overdue = post(PostStatus::Scheduled, Some(now - Duration::minutes(5)));
        assert!(!PostFilter::default().matches(&overdue, now));
    }

    #[test]
    fn filter_search_is_case_insensitive_over_title_and_content() {
        let now = Utc::now();
        let published = post(PostStatus::Published, None);
        let by_title = PostFilter {
            search: Some("RUST".into()),
            ..Default::default()
        };
        let by_content = PostFilter {
            search: Some("borrowing".into()),
            ..Default::default()
        };
        let miss = PostFilter {
            search: Some("python".into()),
            ..Default::default()
        };
        assert!(by_title.matches(&published, now));
        assert!(by_content.matches(&published, now));
        assert!(!miss.matches(&published, now));
    }

    #[test]
    fn filter_by_taxonomy_and_author() {
        let now = Utc::now();
        let published = post(PostStatus::Published, None);
        let matching = PostFilter {
            category: Some("programming".into()),
            tag: Some("rust".into()),
            author_id: Some(3),
            ..Default::default()
        };
        let other_tag = PostFilter {
            tag: Some("go".into()),
            ..Default::default()
        };
        let other_author = PostFilter {
            author_id: Some(4),
            ..Default::default()
        };
        assert!(matching.matches(&published, now));
        assert!(!other_tag.matches(&published, now));
        assert!(!other_author.matches(&published, now));
    }

    #[test]
    fn status_parses_from_lowercase_names() {
        assert_eq!("draft".parse::<PostStatus>().unwrap(), PostStatus::Draft);
        assert!("archived".parse::<PostStatus>().is_err());
    }
}
