use super::{LocalState, LocalStore, PostLink};
use crate::data::post_repository::PostRepository;
use crate::domain::post::{Pagination, PostFilter, PostStatus, PostWrite};
use crate::domain::{DomainError, Post};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

fn links(post_id: i64, ids: &[i64]) -> impl Iterator<Item = PostLink> + '_ {
    ids.iter().map(move |&target_id| PostLink { post_id, target_id })
}

impl LocalState {
    fn check_references(&self, post: &PostWrite) -> Result<(), DomainError> {
        if post
            .category_ids
            .iter()
            .any(|id| !self.categories.iter().any(|c| c.id == *id))
        {
            return Err(DomainError::CategoryNotFound);
        }
        if post
            .tag_ids
            .iter()
            .any(|id| !self.tags.iter().any(|t| t.id == *id))
        {
            return Err(DomainError::ValidationError("Unknown tag".to_string()));
        }
        Ok(())
    }

    fn slug_taken(&self, slug: &str, except_id: Option<i64>) -> bool {
        self.posts
            .iter()
            .any(|p| p.slug == slug && Some(p.id) != except_id)
    }

    fn relink(&mut self, post_id: i64, post: &PostWrite) {
        self.post_categories.retain(|l| l.post_id != post_id);
        self.post_tags.retain(|l| l.post_id != post_id);
        self.post_categories
            .extend(links(post_id, &post.category_ids));
        self.post_tags.extend(links(post_id, &post.tag_ids));
    }
}

#[async_trait]
impl PostRepository for LocalStore {
    async fn create(&self, author_id: i64, post: PostWrite) -> Result<Post, DomainError> {
        self.write(move |state| {
            if !state.users.iter().any(|u| u.id == author_id) {
                return Err(DomainError::UserNotFound);
            }
            if state.slug_taken(&post.slug, None) {
                return Err(DomainError::Conflict("Slug already exists".to_string()));
            }
            state.check_references(&post)?;

            state.sequences.post += 1;
            let now = Utc::now();
            let created = Post {
                id: state.sequences.post,
                title: post.title.clone(),
                slug: post.slug.clone(),
                content: post.content.clone(),
                excerpt: post.excerpt.clone(),
                cover_image: post.cover_image.clone(),
                author_id,
                status: post.status,
                scheduled_publish_date: post.scheduled_publish_date,
                created_at: now,
                updated_at: now,
                categories: Vec::new(),
                tags: Vec::new(),
            };
            state.posts.push(created.clone());
            state.relink(created.id, &post);

            Ok(state.hydrate(&created))
        })
        .await
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Post, DomainError> {
        let state = self.read().await;
        state
            .posts
            .iter()
            .find(|p| p.slug == slug)
            .map(|p| state.hydrate(p))
            .ok_or(DomainError::PostNotFound)
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Post>, DomainError> {
        let state = self.read().await;
        Ok(state
            .posts
            .iter()
            .filter(|p| ids.contains(&p.id))
            .map(|p| state.hydrate(p))
            .collect())
    }

    async fn slug_exists(&self, slug: &str, except_id: Option<i64>) -> Result<bool, DomainError> {
        Ok(self.read().await.slug_taken(slug, except_id))
    }

    async fn update(&self, id: i64, post: PostWrite) -> Result<Post, DomainError> {
        self.write(move |state| {
            if !state.posts.iter().any(|p| p.id == id) {
                return Err(DomainError::PostNotFound);
            }
            if state.slug_taken(&post.slug, Some(id)) {
                return Err(DomainError::Conflict("Slug already exists".to_string()));
            }
            state.check_references(&post)?;

            let stored = state
                .posts
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or(DomainError::PostNotFound)?;
            stored.title = post.title.clone();
            stored.slug = post.slug.clone();
            stored.content = post.content.clone();
            stored.excerpt = post.excerpt.clone();
            stored.cover_image = post.cover_image.clone();
            stored.status = post.status;
            stored.scheduled_publish_date = post.scheduled_publish_date;
            stored.updated_at = Utc::now();
            let updated = stored.clone();

            state.relink(id, &post);
            Ok(state.hydrate(&updated))
        })
        .await
    }

    async fn delete(&self, id: i64) -> Result<(), DomainError> {
        self.write(move |state| {
            if !state.posts.iter().any(|p| p.id == id) {
                return Err(DomainError::PostNotFound);
            }

            state.comments.retain(|c| c.post_id != id);
            state.likes.retain(|l| l.post_id != id);
            state.bookmarks.retain(|b| b.post_id != id);
            state.post_categories.retain(|l| l.post_id != id);
            state.post_tags.retain(|l| l.post_id != id);
            state.posts.retain(|p| p.id != id);
            Ok(())
        })
        .await
    }

    async fn list(
        &self,
        filter: &PostFilter,
        page: Pagination,
        now: DateTime<Utc>,
    ) -> Result<(Vec<Post>, i64), DomainError> {
        let state = self.read().await;

        let mut matching: Vec<Post> = state
            .posts
            .iter()
            .map(|p| state.hydrate(p))
            .filter(|p| filter.matches(p, now))
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matching.len() as i64;
        let posts = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect();

        Ok((posts, total))
    }

    async fn count_published_by_author(&self, author_id: i64) -> Result<i64, DomainError> {
        Ok(self
            .read()
            .await
            .posts
            .iter()
            .filter(|p| p.author_id == author_id && p.status == PostStatus::Published)
            .count() as i64)
    }

    async fn publish_due(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        // skip the write lock and the file rewrite when nothing is due
        if !self.read().await.posts.iter().any(|p| p.is_due(now)) {
            return Ok(0);
        }

        self.write(move |state| {
            let mut flipped = 0;
            for post in state.posts.iter_mut().filter(|p| p.is_due(now)) {
                post.status = PostStatus::Published;
                post.updated_at = now;
                flipped += 1;
            }
            Ok(flipped)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{new_user, post_write};
    use super::*;
    use crate::data::comment_repository::CommentRepository;
    use crate::data::engagement_repository::EngagementRepository;
    use crate::data::taxonomy_repository::TaxonomyRepository;
    use crate::data::user_repository::UserRepository;
    use chrono::Duration;

    async fn store_with_author() -> (LocalStore, i64) {
        let store = LocalStore::in_memory();
        let author = UserRepository::create(&store, new_user("author"))
            .await
            .unwrap();
        (store, author.id)
    }

    #[actix_rt::test]
    async fn create_rejects_taken_slug_and_unknown_category() {
        let (store, author) = store_with_author().await;
        PostRepository::create(&store, author, post_write("Hello", "hello"))
            .await
            .unwrap();

        let duplicate = PostRepository::create(&store, author, post_write("Hello", "hello")).await;
        assert!(matches!(duplicate, Err(DomainError::Conflict(_))));

        let mut bad_category = post_write("Other", "other");
        bad_category.category_ids = vec![42];
        let result = PostRepository::create(&store, author, bad_category).await;
        assert!(matches!(result, Err(DomainError::CategoryNotFound)));
        assert!(!store.slug_exists("other", None).await.unwrap());
    }

    #[actix_rt::test]
    async fn list_paginates_newest_first() {
        let (store, author) = store_with_author().await;
        for i in 0..25 {
            let title = format!("Post {}", i);
            PostRepository::create(&store, author, post_write(&title, &format!("post-{}", i)))
                .await
                .unwrap();
        }

        let page = Pagination::new(Some(3), Some(10)).unwrap();
        let (posts, total) = store
            .list(&PostFilter::default(), page, Utc::now())
            .await
            .unwrap();

        assert_eq!(total, 25);
        assert_eq!(posts.len(), 5);
        // ids descend with creation order; page 3 holds the five oldest
        assert_eq!(posts.first().unwrap().slug, "post-4");
        assert_eq!(posts.last().unwrap().slug, "post-0");
    }

    #[actix_rt::test]
    async fn update_replaces_links() {
        let (store, author) = store_with_author().await;
        let news = store.create_category("News", "news", None).await.unwrap();
        let tech = store.create_category("Tech", "tech", None).await.unwrap();

        let mut write = post_write("Hello", "hello");
        write.category_ids = vec![news.id];
        let post = PostRepository::create(&store, author, write).await.unwrap();
        assert_eq!(post.categories, vec![news.clone()]);

        let mut write = post_write("Hello again", "hello-again");
        write.category_ids = vec![tech.id];
        let updated = PostRepository::update(&store, post.id, write).await.unwrap();

        assert_eq!(updated.slug, "hello-again");
        assert_eq!(updated.categories, vec![tech]);
        assert!(!store.slug_exists("hello", None).await.unwrap());
    }

    #[actix_rt::test]
    async fn delete_cascades_to_dependents() {
        let (store, author) = store_with_author().await;
        let post = PostRepository::create(&store, author, post_write("Doomed", "doomed"))
            .await
            .unwrap();
        let keep = PostRepository::create(&store, author, post_write("Keep", "keep"))
            .await
            .unwrap();

        CommentRepository::create(&store, post.id, author, "first")
            .await
            .unwrap();
        CommentRepository::create(&store, keep.id, author, "stays")
            .await
            .unwrap();
        store.add_like(post.id, author).await.unwrap();
        store.add_bookmark(post.id, author).await.unwrap();

        PostRepository::delete(&store, post.id).await.unwrap();

        assert!(matches!(
            store.find_by_slug("doomed").await,
            Err(DomainError::PostNotFound)
        ));
        assert!(store.list_for_post(post.id).await.unwrap().is_empty());
        assert_eq!(store.list_for_post(keep.id).await.unwrap().len(), 1);
        assert!(store.like_counts(&[post.id]).await.unwrap().is_empty());
        assert!(store.bookmarks_of(author).await.unwrap().is_empty());
        assert!(matches!(
            PostRepository::delete(&store, post.id).await,
            Err(DomainError::PostNotFound)
        ));
    }

    #[actix_rt::test]
    async fn publish_due_flips_only_past_schedules() {
        let (store, author) = store_with_author().await;
        let now = Utc::now();

        let mut past = post_write("Past", "past");
        past.status = PostStatus::Scheduled;
        past.scheduled_publish_date = Some(now - Duration::hours(1));
        let mut future = post_write("Future", "future");
        future.status = PostStatus::Scheduled;
        future.scheduled_publish_date = Some(now + Duration::hours(1));
        PostRepository::create(&store, author, past).await.unwrap();
        PostRepository::create(&store, author, future).await.unwrap();

        assert_eq!(store.publish_due(now).await.unwrap(), 1);
        assert_eq!(store.publish_due(now).await.unwrap(), 0);

        assert_eq!(
            store.find_by_slug("past").await.unwrap().status,
            PostStatus::Published
        );
        assert_eq!(
            store.find_by_slug("future").await.unwrap().status,
            PostStatus::Scheduled
        );
    }
}
