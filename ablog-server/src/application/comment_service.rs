use crate::application::blog_service::{find_visible, sweep_scheduled};
use crate::data::comment_repository::CommentRepository;
use crate::data::post_repository::PostRepository;
use crate::data::user_repository::UserRepository;
use crate::domain::comment::{CommentResponse, CreateCommentRequest, UpdateCommentRequest};
use crate::domain::user::AuthorSummary;
use crate::domain::{Comment, DomainError, User};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

pub struct CommentService {
    comment_repo: Arc<dyn CommentRepository + Send + Sync>,
    post_repo: Arc<dyn PostRepository + Send + Sync>,
    user_repo: Arc<dyn UserRepository + Send + Sync>,
}

impl CommentService {
    pub fn new(
        comment_repo: Arc<dyn CommentRepository + Send + Sync>,
        post_repo: Arc<dyn PostRepository + Send + Sync>,
        user_repo: Arc<dyn UserRepository + Send + Sync>,
    ) -> Self {
        Self {
            comment_repo,
            post_repo,
            user_repo,
        }
    }

    /// Comments of a visible post, oldest first.
    pub async fn list_comments(
        &self,
        slug: &str,
        viewer: Option<i64>,
    ) -> Result<Vec<CommentResponse>, DomainError> {
        let now = Utc::now();
        sweep_scheduled(self.post_repo.as_ref(), now).await;
        let post = find_visible(self.post_repo.as_ref(), slug, viewer, now).await?;

        let comments = self.comment_repo.list_for_post(post.id).await?;

        let mut author_ids: Vec<i64> = comments.iter().map(|c| c.author_id).collect();
        author_ids.sort_unstable();
        author_ids.dedup();
        let authors: HashMap<i64, User> = self
            .user_repo
            .find_by_ids(&author_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        comments
            .into_iter()
            .map(|comment| {
                let author = authors
                    .get(&comment.author_id)
                    .ok_or(DomainError::UserNotFound)?;
                Ok(to_response(comment, author))
            })
            .collect()
    }

    pub async fn add_comment(
        &self,
        slug: &str,
        user_id: i64,
        req: CreateCommentRequest,
    ) -> Result<CommentResponse, DomainError> {
        let content = comment_text(&req.content)?;
        let post = find_visible(self.post_repo.as_ref(), slug, Some(user_id), Utc::now()).await?;
        let author = self.user_repo.find_by_id(user_id).await?;

        let comment = self.comment_repo.create(post.id, user_id, &content).await?;

        tracing::info!(
            "Comment created: id={}, post_id={}, author_id={}",
            comment.id,
            post.id,
            user_id
        );
        Ok(to_response(comment, &author))
    }

    pub async fn update_comment(
        &self,
        id: i64,
        user_id: i64,
        req: UpdateCommentRequest,
    ) -> Result<CommentResponse, DomainError> {
        let content = comment_text(&req.content)?;
        self.owned_comment(id, user_id, "update").await?;
        let author = self.user_repo.find_by_id(user_id).await?;

        let comment = self.comment_repo.update(id, &content).await?;

        tracing::info!("Comment updated: id={}, author_id={}", id, user_id);
        Ok(to_response(comment, &author))
    }

    pub async fn delete_comment(&self, id: i64, user_id: i64) -> Result<(), DomainError> {
        self.owned_comment(id, user_id, "delete").await?;

        self.comment_repo.delete(id).await?;

        tracing::info!("Comment deleted: id={}, author_id={}", id, user_id);
        Ok(())
    }

    async fn owned_comment(&self, id: i64, user_id: i64, action: &str) -> Result<Comment, DomainError> {
        let comment = self.comment_repo.find_by_id(id).await?;
        if comment.author_id != user_id {
            tracing::warn!(
                "User {} attempted to {} comment {} owned by {}",
                user_id,
                action,
                id,
                comment.author_id
            );
            return Err(DomainError::Forbidden);
        }
        Ok(comment)
    }
}

fn comment_text(content: &str) -> Result<String, DomainError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(DomainError::ValidationError(
            "Comment cannot be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

fn to_response(comment: Comment, author: &User) -> CommentResponse {
    CommentResponse {
        id: comment.id,
        post_id: comment.post_id,
        content: comment.content,
        author: AuthorSummary::from(author),
        created_at: comment.created_at,
        updated_at: comment.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{create_request, register, Fixture};
    use crate::domain::PostStatus;

    fn text(content: &str) -> CreateCommentRequest {
        CreateCommentRequest {
            content: content.to_string(),
        }
    }

    #[actix_rt::test]
    async fn comments_are_listed_oldest_first_with_authors() {
        let fx = Fixture::in_memory();
        let ann = register(&fx, "ann").await;
        let bob = register(&fx, "bob").await;
        let post = fx.blog.create_post(ann, create_request("Talk")).await.unwrap();

        fx.comments.add_comment(&post.slug, bob, text("first")).await.unwrap();
        fx.comments.add_comment(&post.slug, ann, text("second")).await.unwrap();

        let listed = fx.comments.list_comments(&post.slug, None).await.unwrap();
        let summary: Vec<(&str, &str)> = listed
            .iter()
            .map(|c| (c.content.as_str(), c.author.username.as_str()))
            .collect();
        assert_eq!(summary, vec![("first", "bob"), ("second", "ann")]);

        let counted = fx.blog.get_post(&post.slug, None).await.unwrap();
        assert_eq!(counted.comment_count, 2);
    }

    #[actix_rt::test]
    async fn only_the_comment_author_can_edit_or_delete() {
        let fx = Fixture::in_memory();
        let ann = register(&fx, "ann").await;
        let bob = register(&fx, "bob").await;
        let post = fx.blog.create_post(ann, create_request("Talk")).await.unwrap();
        let comment = fx.comments.add_comment(&post.slug, bob, text("hi")).await.unwrap();

        let edit = |content: &str| UpdateCommentRequest {
            content: content.to_string(),
        };

        assert!(matches!(
            fx.comments.update_comment(comment.id, ann, edit("hijacked")).await,
            Err(DomainError::Forbidden)
        ));
        assert!(matches!(
            fx.comments.delete_comment(comment.id, ann).await,
            Err(DomainError::Forbidden)
        ));

        let edited = fx
            .comments
            .update_comment(comment.id, bob, edit("hello"))
            .await
            .unwrap();
        assert_eq!(edited.content, "hello");

        fx.comments.delete_comment(comment.id, bob).await.unwrap();
        assert!(matches!(
            fx.comments.delete_comment(comment.id, bob).await,
            Err(DomainError::CommentNotFound)
        ));
    }

    #[actix_rt::test]
    async fn rejects_blank_comments_and_hidden_posts() {
        let fx = Fixture::in_memory();
        let ann = register(&fx, "ann").await;
        let bob = register(&fx, "bob").await;

        let mut req = create_request("Draft");
        req.status = Some(PostStatus::Draft);
        let draft = fx.blog.create_post(ann, req).await.unwrap();

        assert!(matches!(
            fx.comments.add_comment(&draft.slug, ann, text("  ")).await,
            Err(DomainError::ValidationError(_))
        ));
        assert!(matches!(
            fx.comments.add_comment(&draft.slug, bob, text("sneaky")).await,
            Err(DomainError::PostNotFound)
        ));
        assert!(fx.comments.add_comment(&draft.slug, ann, text("note")).await.is_ok());
    }
}
