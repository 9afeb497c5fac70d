use super::LocalStore;
use crate::data::user_repository::UserRepository;
use crate::domain::user::NewUser;
use crate::domain::{DomainError, User};
use async_trait::async_trait;
use chrono::Utc;

#[async_trait]
impl UserRepository for LocalStore {
    async fn create(&self, user: NewUser) -> Result<User, DomainError> {
        self.write(move |state| {
            if state
                .users
                .iter()
                .any(|u| u.email == user.email || u.username == user.username)
            {
                return Err(DomainError::UserAlreadyExists);
            }

            state.sequences.user += 1;
            let now = Utc::now();
            let created = User {
                id: state.sequences.user,
                email: user.email,
                password_hash: user.password_hash,
                username: user.username,
                full_name: user.full_name,
                avatar_url: None,
                cover_image: None,
                bio: None,
                website: None,
                location: None,
                created_at: now,
                updated_at: now,
            };
            state.users.push(created.clone());
            Ok(created)
        })
        .await
    }

    async fn find_by_id(&self, id: i64) -> Result<User, DomainError> {
        self.read()
            .await
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(DomainError::UserNotFound)
    }

    async fn find_by_email(&self, email: &str) -> Result<User, DomainError> {
        self.read()
            .await
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(DomainError::UserNotFound)
    }

    async fn find_by_username(&self, username: &str) -> Result<User, DomainError> {
        self.read()
            .await
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(DomainError::UserNotFound)
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, DomainError> {
        Ok(self
            .read()
            .await
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn update(&self, user: &User) -> Result<User, DomainError> {
        let user = user.clone();
        self.write(move |state| {
            let stored = state
                .users
                .iter_mut()
                .find(|u| u.id == user.id)
                .ok_or(DomainError::UserNotFound)?;

            stored.full_name = user.full_name;
            stored.avatar_url = user.avatar_url;
            stored.cover_image = user.cover_image;
            stored.bio = user.bio;
            stored.website = user.website;
            stored.location = user.location;
            stored.updated_at = Utc::now();
            Ok(stored.clone())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::new_user;
    use super::*;

    #[actix_rt::test]
    async fn duplicate_email_or_username_is_rejected() {
        let store = LocalStore::in_memory();
        store.create(new_user("ann")).await.unwrap();

        let mut same_name = new_user("ann");
        same_name.email = "other@example.com".into();
        assert!(matches!(
            store.create(same_name).await,
            Err(DomainError::UserAlreadyExists)
        ));

        let mut same_email = new_user("bob");
        same_email.email = "ann@example.com".into();
        assert!(matches!(
            store.create(same_email).await,
            Err(DomainError::UserAlreadyExists)
        ));
    }

    #[actix_rt::test]
    async fn lookups_and_profile_update() {
        let store = LocalStore::in_memory();
        let ann = store.create(new_user("ann")).await.unwrap();
        let bob = store.create(new_user("bob")).await.unwrap();

        assert_eq!(store.find_by_email("bob@example.com").await.unwrap().id, bob.id);
        assert_eq!(store.find_by_ids(&[ann.id, 99]).await.unwrap().len(), 1);
        assert!(matches!(
            store.find_by_username("carol").await,
            Err(DomainError::UserNotFound)
        ));

        let mut changed = ann.clone();
        changed.bio = Some("Writes about Rust".into());
        let updated = store.update(&changed).await.unwrap();
        assert_eq!(updated.bio.as_deref(), Some("Writes about Rust"));
        assert_eq!(
            store.find_by_id(ann.id).await.unwrap().bio.as_deref(),
            Some("Writes about Rust")
        );
    }
}
