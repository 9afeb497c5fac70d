use crate::data::follow_repository::FollowRepository;
use crate::data::post_repository::PostRepository;
use crate::data::user_repository::UserRepository;
use crate::domain::user::{
    AuthorSummary, FollowStatus, ProfileResponse, UpdateProfileRequest, UserResponse,
};
use crate::domain::{DomainError, User};
use std::collections::HashMap;
use std::sync::Arc;

pub struct UserService {
    user_repo: Arc<dyn UserRepository + Send + Sync>,
    follow_repo: Arc<dyn FollowRepository + Send + Sync>,
    post_repo: Arc<dyn PostRepository + Send + Sync>,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository + Send + Sync>,
        follow_repo: Arc<dyn FollowRepository + Send + Sync>,
        post_repo: Arc<dyn PostRepository + Send + Sync>,
    ) -> Self {
        Self {
            user_repo,
            follow_repo,
            post_repo,
        }
    }

    pub async fn profile(
        &self,
        username: &str,
        viewer: Option<i64>,
    ) -> Result<ProfileResponse, DomainError> {
        let user = self.user_repo.find_by_username(username).await?;
        let (follower_count, following_count) = self.follow_repo.counts(user.id).await?;
        let post_count = self.post_repo.count_published_by_author(user.id).await?;

        let is_following = match viewer {
            Some(viewer_id) if viewer_id != user.id => {
                Some(self.follow_repo.is_following(viewer_id, user.id).await?)
            }
            _ => None,
        };

        Ok(ProfileResponse {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            avatar_url: user.avatar_url,
            cover_image: user.cover_image,
            bio: user.bio,
            website: user.website,
            location: user.location,
            created_at: user.created_at,
            follower_count,
            following_count,
            post_count,
            is_following,
        })
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        req: UpdateProfileRequest,
    ) -> Result<UserResponse, DomainError> {
        let mut user = self.user_repo.find_by_id(user_id).await?;
        user.apply_profile(req);

        let updated = self.user_repo.update(&user).await?;

        tracing::info!("Profile updated: id={}, username={}", updated.id, updated.username);
        Ok(UserResponse::from(updated))
    }

    pub async fn follow(&self, user_id: i64, username: &str) -> Result<FollowStatus, DomainError> {
        let target = self.user_repo.find_by_username(username).await?;
        if target.id == user_id {
            tracing::warn!("User {} attempted to follow themselves", user_id);
            return Err(DomainError::ValidationError(
                "You cannot follow yourself".to_string(),
            ));
        }

        if self.follow_repo.follow(user_id, target.id).await? {
            tracing::info!("User {} now follows {}", user_id, target.id);
        }
        self.follow_status(target.id, true).await
    }

    pub async fn unfollow(&self, user_id: i64, username: &str) -> Result<FollowStatus, DomainError> {
        let target = self.user_repo.find_by_username(username).await?;

        if self.follow_repo.unfollow(user_id, target.id).await? {
            tracing::info!("User {} unfollowed {}", user_id, target.id);
        }
        self.follow_status(target.id, false).await
    }

    pub async fn followers(&self, username: &str) -> Result<Vec<AuthorSummary>, DomainError> {
        let user = self.user_repo.find_by_username(username).await?;
        let ids = self.follow_repo.follower_ids(user.id).await?;
        self.summaries(&ids).await
    }

    pub async fn following(&self, username: &str) -> Result<Vec<AuthorSummary>, DomainError> {
        let user = self.user_repo.find_by_username(username).await?;
        let ids = self.follow_repo.following_ids(user.id).await?;
        self.summaries(&ids).await
    }

    async fn follow_status(&self, target_id: i64, following: bool) -> Result<FollowStatus, DomainError> {
        let (follower_count, _) = self.follow_repo.counts(target_id).await?;
        Ok(FollowStatus {
            following,
            follower_count,
        })
    }

    // keeps the order of `ids`
    async fn summaries(&self, ids: &[i64]) -> Result<Vec<AuthorSummary>, DomainError> {
        let users: HashMap<i64, User> = self
            .user_repo
            .find_by_ids(ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        Ok(ids
            .iter()
            .filter_map(|id| users.get(id))
            .map(AuthorSummary::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{create_request, register, Fixture};

    #[actix_rt::test]
    async fn profile_counts_followers_and_posts() {
        let fx = Fixture::in_memory();
        let ann = register(&fx, "ann").await;
        let bob = register(&fx, "bob").await;
        fx.blog.create_post(ann, create_request("One")).await.unwrap();

        fx.users.follow(bob, "ann").await.unwrap();

        let seen_by_bob = fx.users.profile("ann", Some(bob)).await.unwrap();
        assert_eq!(seen_by_bob.follower_count, 1);
        assert_eq!(seen_by_bob.following_count, 0);
        assert_eq!(seen_by_bob.post_count, 1);
        assert_eq!(seen_by_bob.is_following, Some(true));

        let own = fx.users.profile("ann", Some(ann)).await.unwrap();
        assert_eq!(own.is_following, None);
    }

    #[actix_rt::test]
    async fn follow_is_idempotent_and_rejects_self() {
        let fx = Fixture::in_memory();
        let ann = register(&fx, "ann").await;
        let bob = register(&fx, "bob").await;

        assert_eq!(fx.users.follow(bob, "ann").await.unwrap().follower_count, 1);
        assert_eq!(fx.users.follow(bob, "ann").await.unwrap().follower_count, 1);
        assert!(matches!(
            fx.users.follow(ann, "ann").await,
            Err(DomainError::ValidationError(_))
        ));

        let followers = fx.users.followers("ann").await.unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].username, "bob");
        assert_eq!(fx.users.following("bob").await.unwrap()[0].username, "ann");

        let status = fx.users.unfollow(bob, "ann").await.unwrap();
        assert!(!status.following);
        assert_eq!(status.follower_count, 0);
        assert_eq!(fx.users.unfollow(bob, "ann").await.unwrap().follower_count, 0);
    }

    #[actix_rt::test]
    async fn update_profile_merges_fields() {
        let fx = Fixture::in_memory();
        let ann = register(&fx, "ann").await;

        let updated = fx
            .users
            .update_profile(
                ann,
                UpdateProfileRequest {
                    bio: Some("Writes about Rust".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.bio.as_deref(), Some("Writes about Rust"));
        assert_eq!(updated.username, "ann");
        assert!(matches!(
            fx.users.profile("nobody", None).await,
            Err(DomainError::UserNotFound)
        ));
    }
}
