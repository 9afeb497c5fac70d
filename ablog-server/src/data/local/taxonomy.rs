use super::LocalStore;
use crate::data::taxonomy_repository::TaxonomyRepository;
use crate::domain::{Category, DomainError, Tag};
use async_trait::async_trait;

#[async_trait]
impl TaxonomyRepository for LocalStore {
    async fn list_categories(&self) -> Result<Vec<Category>, DomainError> {
        let mut categories = self.read().await.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn find_categories(&self, ids: &[i64]) -> Result<Vec<Category>, DomainError> {
        Ok(self
            .read()
            .await
            .categories
            .iter()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn create_category(
        &self,
        name: &str,
        slug: &str,
        description: Option<&str>,
    ) -> Result<Category, DomainError> {
        let name = name.to_string();
        let slug = slug.to_string();
        let description = description.map(str::to_string);

        self.write(move |state| {
            if state.categories.iter().any(|c| c.slug == slug) {
                return Err(DomainError::Conflict(
                    "Category already exists".to_string(),
                ));
            }

            state.sequences.category += 1;
            let category = Category {
                id: state.sequences.category,
                name,
                slug,
                description,
            };
            state.categories.push(category.clone());
            Ok(category)
        })
        .await
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, DomainError> {
        let mut tags = self.read().await.tags.clone();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn create_tag(&self, name: &str, slug: &str) -> Result<Tag, DomainError> {
        let name = name.to_string();
        let slug = slug.to_string();

        self.write(move |state| {
            if state.tags.iter().any(|t| t.slug == slug) {
                return Err(DomainError::Conflict("Tag already exists".to_string()));
            }

            state.sequences.tag += 1;
            let tag = Tag {
                id: state.sequences.tag,
                name,
                slug,
            };
            state.tags.push(tag.clone());
            Ok(tag)
        })
        .await
    }

    async fn find_or_create_tag(&self, name: &str, slug: &str) -> Result<Tag, DomainError> {
        if let Some(tag) = self.read().await.tags.iter().find(|t| t.slug == slug) {
            return Ok(tag.clone());
        }

        let name = name.to_string();
        let slug = slug.to_string();

        // re-checked under the write lock; another writer may have won
        self.write(move |state| {
            if let Some(tag) = state.tags.iter().find(|t| t.slug == slug) {
                return Ok(tag.clone());
            }

            state.sequences.tag += 1;
            let tag = Tag {
                id: state.sequences.tag,
                name,
                slug,
            };
            state.tags.push(tag.clone());
            Ok(tag)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_rt::test]
    async fn categories_are_unique_by_slug_and_sorted() {
        let store = LocalStore::in_memory();
        store.create_category("Travel", "travel", None).await.unwrap();
        store
            .create_category("Food", "food", Some("Recipes"))
            .await
            .unwrap();

        assert!(matches!(
            store.create_category("Travel!", "travel", None).await,
            Err(DomainError::Conflict(_))
        ));

        let names: Vec<String> = store
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Food", "Travel"]);
    }

    #[actix_rt::test]
    async fn find_or_create_tag_reuses_existing() {
        let store = LocalStore::in_memory();
        let first = store.find_or_create_tag("Rust", "rust").await.unwrap();
        let again = store.find_or_create_tag("rust", "rust").await.unwrap();

        assert_eq!(first, again);
        assert_eq!(store.list_tags().await.unwrap().len(), 1);
    }
}
