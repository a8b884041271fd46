use super::aggregate::Category;
use super::errors::CategoryError;
use super::repository::CategoryRepository;
use crate::state::{track, RequestState};

// ============================================================================
// Category State
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct CategoryState {
    pub items: Vec<Category>,
    pub request: RequestState,
    pub current_category: Option<Category>,
    /// Case-insensitive name filter applied to the cached list
    pub search_term: String,
}

impl CategoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_current_category(&mut self, category: Option<Category>) {
        self.current_category = category;
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
    }

    pub fn visible(&self) -> Vec<&Category> {
        let needle = self.search_term.trim().to_lowercase();
        self.items
            .iter()
            .filter(|c| needle.is_empty() || c.name.to_lowercase().contains(&needle))
            .collect()
    }

    pub async fn fetch_categories(&mut self, repo: &CategoryRepository) -> Result<(), CategoryError> {
        self.items = track(&mut self.request, repo.get_categories()).await?;
        Ok(())
    }

    pub async fn create_category(&mut self, repo: &CategoryRepository, name: &str) -> Result<(), CategoryError> {
        let category = track(&mut self.request, repo.add_category(name)).await?;
        self.items.push(category);
        Ok(())
    }

    pub async fn edit_category(
        &mut self,
        repo: &CategoryRepository,
        category_id: &str,
        name: &str,
    ) -> Result<(), CategoryError> {
        let category = track(&mut self.request, repo.update_category(category_id, name)).await?;
        if let Some(slot) = self.items.iter_mut().find(|c| c.id == category.id) {
            *slot = category;
        }
        Ok(())
    }

    pub async fn remove_category(&mut self, repo: &CategoryRepository, category_id: &str) -> Result<(), CategoryError> {
        let removed = track(&mut self.request, repo.delete_category(category_id)).await?;
        self.items.retain(|c| c.id != removed);
        Ok(())
    }
}
