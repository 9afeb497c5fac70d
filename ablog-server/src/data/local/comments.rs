use super::LocalStore;
use crate::data::comment_repository::CommentRepository;
use crate::domain::{Comment, DomainError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;

#[async_trait]
impl CommentRepository for LocalStore {
    async fn create(
        &self,
        post_id: i64,
        author_id: i64,
        content: &str,
    ) -> Result<Comment, DomainError> {
        let content = content.to_string();

        self.write(move |state| {
            if !state.posts.iter().any(|p| p.id == post_id) {
                return Err(DomainError::PostNotFound);
            }

            state.sequences.comment += 1;
            let now = Utc::now();
            let comment = Comment {
                id: state.sequences.comment,
                post_id,
                author_id,
                content,
                created_at: now,
                updated_at: now,
            };
            state.comments.push(comment.clone());
            Ok(comment)
        })
        .await
    }

    async fn find_by_id(&self, id: i64) -> Result<Comment, DomainError> {
        self.read()
            .await
            .comments
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(DomainError::CommentNotFound)
    }

    async fn update(&self, id: i64, content: &str) -> Result<Comment, DomainError> {
        let content = content.to_string();

        self.write(move |state| {
            let comment = state
                .comments
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or(DomainError::CommentNotFound)?;
            comment.content = content;
            comment.updated_at = Utc::now();
            Ok(comment.clone())
        })
        .await
    }

    async fn delete(&self, id: i64) -> Result<(), DomainError> {
        self.write(move |state| {
            let before = state.comments.len();
            state.comments.retain(|c| c.id != id);
            if state.comments.len() == before {
                Err(DomainError::CommentNotFound)
            } else {
                Ok(())
            }
        })
        .await
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>, DomainError> {
        let mut comments: Vec<Comment> = self
            .read()
            .await
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn count_for_posts(&self, post_ids: &[i64]) -> Result<HashMap<i64, i64>, DomainError> {
        let mut counts = HashMap::new();
        for comment in self
            .read()
            .await
            .comments
            .iter()
            .filter(|c| post_ids.contains(&c.post_id))
        {
            *counts.entry(comment.post_id).or_insert(0) += 1;
        }
        Ok(counts)
    }
}
