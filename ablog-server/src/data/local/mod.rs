//! Document store kept in memory and optionally mirrored to a JSON file.
//!
//! This is the demo backend: the whole database is one serialized document,
//! the same shape a browser would keep under a single storage key. Every
//! mutation takes the write lock, changes the document and rewrites the file
//! before the lock is released, so readers never see a state the file lacks.

mod comments;
mod engagement;
mod posts;
mod taxonomy;
mod users;

use crate::domain::{Category, Comment, DomainError, Post, Tag, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::{RwLock, RwLockReadGuard};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Sequences {
    user: i64,
    post: i64,
    category: i64,
    tag: i64,
    comment: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct PostLink {
    post_id: i64,
    target_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Reaction {
    post_id: i64,
    user_id: i64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FollowEdge {
    follower_id: i64,
    following_id: i64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
struct LocalState {
    sequences: Sequences,
    users: Vec<User>,
    /// Stored without categories/tags; those live in the link tables.
    posts: Vec<Post>,
    categories: Vec<Category>,
    tags: Vec<Tag>,
    post_categories: Vec<PostLink>,
    post_tags: Vec<PostLink>,
    comments: Vec<Comment>,
    likes: Vec<Reaction>,
    bookmarks: Vec<Reaction>,
    follows: Vec<FollowEdge>,
}

impl LocalState {
    /// Copy of `post` with its categories and tags joined in.
    fn hydrate(&self, post: &Post) -> Post {
        let mut post = post.clone();
        post.categories = self
            .post_categories
            .iter()
            .filter(|link| link.post_id == post.id)
            .filter_map(|link| self.categories.iter().find(|c| c.id == link.target_id))
            .cloned()
            .collect();
        post.categories.sort_by(|a, b| a.name.cmp(&b.name));
        post.tags = self
            .post_tags
            .iter()
            .filter(|link| link.post_id == post.id)
            .filter_map(|link| self.tags.iter().find(|t| t.id == link.target_id))
            .cloned()
            .collect();
        post.tags.sort_by(|a, b| a.name.cmp(&b.name));
        post
    }
}

pub struct LocalStore {
    state: RwLock<LocalState>,
    path: Option<PathBuf>,
}

impl LocalStore {
    /// Store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(LocalState::default()),
            path: None,
        }
    }

    /// Loads the document at `path`, starting empty when the file does not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref().to_path_buf();

        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                DomainError::InternalError(format!(
                    "Corrupt local store {}: {}",
                    path.display(),
                    e
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("Local store {} not found, starting empty", path.display());
                LocalState::default()
            }
            Err(e) => {
                return Err(DomainError::InternalError(format!(
                    "Failed to read local store {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        tracing::info!(
            "Local store loaded from {}: {} users, {} posts",
            path.display(),
            state.users.len(),
            state.posts.len()
        );

        Ok(Self {
            state: RwLock::new(state),
            path: Some(path),
        })
    }

    async fn read(&self) -> RwLockReadGuard<'_, LocalState> {
        self.state.read().await
    }

    /// Runs `mutate` under the write lock and persists the result.
    ///
    /// `mutate` must validate before changing anything: an `Err` leaves the
    /// document as it was. With a backing file the change is made on a copy
    /// that replaces the document only once the file holds it.
    async fn write<T>(
        &self,
        mutate: impl FnOnce(&mut LocalState) -> Result<T, DomainError> + Send,
    ) -> Result<T, DomainError> {
        let mut state = self.state.write().await;

        if self.path.is_none() {
            return mutate(&mut state);
        }

        let mut candidate = state.clone();
        let output = mutate(&mut candidate)?;
        self.persist(&candidate).await?;
        *state = candidate;
        Ok(output)
    }

    async fn persist(&self, state: &LocalState) -> Result<(), DomainError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| DomainError::InternalError(format!("Failed to encode store: {}", e)))?;

        // write-then-rename so a crash never leaves a truncated document
        let tmp = path.with_extension("json.tmp");
        let result = async {
            tokio::fs::write(&tmp, &bytes).await?;
            tokio::fs::rename(&tmp, path).await
        }
        .await;

        result.map_err(|e| {
            tracing::error!("Failed to persist local store {}: {}", path.display(), e);
            DomainError::InternalError(format!("Failed to persist local store: {}", e))
        })
    }
}
