use super::{FollowEdge, LocalStore, Reaction};
use crate::data::engagement_repository::EngagementRepository;
use crate::data::follow_repository::FollowRepository;
use crate::domain::DomainError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};

fn add_reaction(reactions: &mut Vec<Reaction>, post_id: i64, user_id: i64) -> bool {
    if reactions
        .iter()
        .any(|r| r.post_id == post_id && r.user_id == user_id)
    {
        return false;
    }
    reactions.push(Reaction {
        post_id,
        user_id,
        created_at: Utc::now(),
    });
    true
}

fn remove_reaction(reactions: &mut Vec<Reaction>, post_id: i64, user_id: i64) -> bool {
    let before = reactions.len();
    reactions.retain(|r| !(r.post_id == post_id && r.user_id == user_id));
    reactions.len() != before
}

fn reacted_among(reactions: &[Reaction], user_id: i64, post_ids: &[i64]) -> HashSet<i64> {
    reactions
        .iter()
        .filter(|r| r.user_id == user_id && post_ids.contains(&r.post_id))
        .map(|r| r.post_id)
        .collect()
}

#[async_trait]
impl EngagementRepository for LocalStore {
    async fn add_like(&self, post_id: i64, user_id: i64) -> Result<bool, DomainError> {
        self.write(move |state| Ok(add_reaction(&mut state.likes, post_id, user_id)))
            .await
    }

    async fn remove_like(&self, post_id: i64, user_id: i64) -> Result<bool, DomainError> {
        self.write(move |state| Ok(remove_reaction(&mut state.likes, post_id, user_id)))
            .await
    }

    async fn like_counts(&self, post_ids: &[i64]) -> Result<HashMap<i64, i64>, DomainError> {
        let mut counts = HashMap::new();
        for like in self
            .read()
            .await
            .likes
            .iter()
            .filter(|l| post_ids.contains(&l.post_id))
        {
            *counts.entry(like.post_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn liked_among(
        &self,
        user_id: i64,
        post_ids: &[i64],
    ) -> Result<HashSet<i64>, DomainError> {
        Ok(reacted_among(&self.read().await.likes, user_id, post_ids))
    }

    async fn add_bookmark(&self, post_id: i64, user_id: i64) -> Result<bool, DomainError> {
        self.write(move |state| Ok(add_reaction(&mut state.bookmarks, post_id, user_id)))
            .await
    }

    async fn remove_bookmark(&self, post_id: i64, user_id: i64) -> Result<bool, DomainError> {
        self.write(move |state| Ok(remove_reaction(&mut state.bookmarks, post_id, user_id)))
            .await
    }

    async fn bookmarked_among(
        &self,
        user_id: i64,
        post_ids: &[i64],
    ) -> Result<HashSet<i64>, DomainError> {
        Ok(reacted_among(&self.read().await.bookmarks, user_id, post_ids))
    }

    async fn bookmarks_of(&self, user_id: i64) -> Result<Vec<i64>, DomainError> {
        let state = self.read().await;
        let mut bookmarks: Vec<&Reaction> = state
            .bookmarks
            .iter()
            .filter(|b| b.user_id == user_id)
            .collect();
        bookmarks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookmarks.into_iter().map(|b| b.post_id).collect())
    }
}

#[async_trait]
impl FollowRepository for LocalStore {
    async fn follow(&self, follower_id: i64, following_id: i64) -> Result<bool, DomainError> {
        self.write(move |state| {
            if state
                .follows
                .iter()
                .any(|f| f.follower_id == follower_id && f.following_id == following_id)
            {
                return Ok(false);
            }
            state.follows.push(FollowEdge {
                follower_id,
                following_id,
                created_at: Utc::now(),
            });
            Ok(true)
        })
        .await
    }

    async fn unfollow(&self, follower_id: i64, following_id: i64) -> Result<bool, DomainError> {
        self.write(move |state| {
            let before = state.follows.len();
            state
                .follows
                .retain(|f| !(f.follower_id == follower_id && f.following_id == following_id));
            Ok(state.follows.len() != before)
        })
        .await
    }

    async fn is_following(
        &self,
        follower_id: i64,
        following_id: i64,
    ) -> Result<bool, DomainError> {
        Ok(self
            .read()
            .await
            .follows
            .iter()
            .any(|f| f.follower_id == follower_id && f.following_id == following_id))
    }

    async fn follower_ids(&self, user_id: i64) -> Result<Vec<i64>, DomainError> {
        let state = self.read().await;
        let mut edges: Vec<&FollowEdge> = state
            .follows
            .iter()
            .filter(|f| f.following_id == user_id)
            .collect();
        edges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(edges.into_iter().map(|f| f.follower_id).collect())
    }

    async fn following_ids(&self, user_id: i64) -> Result<Vec<i64>, DomainError> {
        let state = self.read().await;
        let mut edges: Vec<&FollowEdge> = state
            .follows
            .iter()
            .filter(|f| f.follower_id == user_id)
            .collect();
        edges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(edges.into_iter().map(|f| f.following_id).collect())
    }

    async fn counts(&self, user_id: i64) -> Result<(i64, i64), DomainError> {
        let state = self.read().await;
        let followers = state
            .follows
            .iter()
            .filter(|f| f.following_id == user_id)
            .count() as i64;
        let following = state
            .follows
            .iter()
            .filter(|f| f.follower_id == user_id)
            .count() as i64;
        Ok((followers, following))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_rt::test]
    async fn likes_are_idempotent_pairs() {
        let store = LocalStore::in_memory();

        assert!(store.add_like(1, 10).await.unwrap());
        assert!(!store.add_like(1, 10).await.unwrap());
        assert!(store.add_like(1, 11).await.unwrap());
        assert_eq!(store.like_counts(&[1]).await.unwrap().get(&1), Some(&2));

        assert!(store.remove_like(1, 10).await.unwrap());
        assert!(!store.remove_like(1, 10).await.unwrap());
        assert_eq!(
            store.liked_among(11, &[1, 2]).await.unwrap(),
            HashSet::from([1])
        );
    }

    #[actix_rt::test]
    async fn follow_twice_keeps_a_single_edge() {
        let store = LocalStore::in_memory();

        assert!(store.follow(1, 2).await.unwrap());
        assert!(!store.follow(1, 2).await.unwrap());
        assert_eq!(store.counts(2).await.unwrap(), (1, 0));
        assert_eq!(store.follower_ids(2).await.unwrap(), vec![1]);

        assert!(store.unfollow(1, 2).await.unwrap());
        assert!(!store.unfollow(1, 2).await.unwrap());
        assert!(!store.is_following(1, 2).await.unwrap());
        assert_eq!(store.counts(2).await.unwrap(), (0, 0));
    }
}
