use crate::data::taxonomy_repository::TaxonomyRepository;
use crate::domain::slug::slugify;
use crate::domain::taxonomy::{CreateCategoryRequest, CreateTagRequest};
use crate::domain::{Category, DomainError, Tag};
use std::sync::Arc;

pub struct TaxonomyService {
    taxonomy_repo: Arc<dyn TaxonomyRepository + Send + Sync>,
}

impl TaxonomyService {
    pub fn new(taxonomy_repo: Arc<dyn TaxonomyRepository + Send + Sync>) -> Self {
        Self { taxonomy_repo }
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, DomainError> {
        self.taxonomy_repo.list_categories().await
    }

    pub async fn create_category(&self, req: CreateCategoryRequest) -> Result<Category, DomainError> {
        let name = required_name(&req.name, "Category")?;
        let description = req
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());

        let category = self
            .taxonomy_repo
            .create_category(&name, &slugify(&name), description)
            .await?;

        tracing::info!("Category created: id={}, slug={}", category.id, category.slug);
        Ok(category)
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>, DomainError> {
        self.taxonomy_repo.list_tags().await
    }

    pub async fn create_tag(&self, req: CreateTagRequest) -> Result<Tag, DomainError> {
        let name = required_name(&req.name, "Tag")?;

        let tag = self.taxonomy_repo.create_tag(&name, &slugify(&name)).await?;

        tracing::info!("Tag created: id={}, slug={}", tag.id, tag.slug);
        Ok(tag)
    }
}

fn required_name(name: &str, what: &str) -> Result<String, DomainError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::ValidationError(format!(
            "{} name cannot be empty",
            what
        )));
    }
    Ok(trimmed.to_string())
}
