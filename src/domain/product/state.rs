use super::aggregate::{Product, ProductDraft};
use super::errors::ProductError;
use super::repository::{ProductFilters, ProductRepository};
use crate::state::{paginate, total_pages, track, RequestState};

// ============================================================================
// Product State
// ============================================================================

#[derive(Debug, Clone)]
pub struct ProductState {
    pub items: Vec<Product>,
    pub request: RequestState,
    pub current_product: Option<Product>,
    pub filters: ProductFilters,
    per_page: usize,
}

impl ProductState {
    pub fn new(per_page: usize) -> Self {
        Self {
            items: Vec::new(),
            request: RequestState::default(),
            current_product: None,
            filters: ProductFilters::default(),
            per_page,
        }
    }

    pub fn set_current_product(&mut self, product: Option<Product>) {
        self.current_product = product;
    }

    pub fn set_filters(&mut self, filters: ProductFilters) {
        self.filters = filters;
    }

    pub async fn fetch_products(&mut self, repo: &ProductRepository) -> Result<(), ProductError> {
        let filters = self.filters.clone();
        self.items = track(&mut self.request, repo.get_products(&filters)).await?;
        Ok(())
    }

    pub async fn create_product(&mut self, repo: &ProductRepository, draft: ProductDraft) -> Result<(), ProductError> {
        let product = track(&mut self.request, repo.add_product(draft)).await?;
        self.items.push(product);
        Ok(())
    }

    pub async fn edit_product(
        &mut self,
        repo: &ProductRepository,
        product_id: &str,
        draft: ProductDraft,
    ) -> Result<(), ProductError> {
        let product = track(&mut self.request, repo.update_product(product_id, draft)).await?;
        if let Some(slot) = self.items.iter_mut().find(|p| p.id == product.id) {
            *slot = product.clone();
        }
        if self.current_product.as_ref().is_some_and(|p| p.id == product.id) {
            self.current_product = Some(product);
        }
        Ok(())
    }

    pub async fn remove_product(&mut self, repo: &ProductRepository, product_id: &str) -> Result<(), ProductError> {
        let removed = track(&mut self.request, repo.delete_product(product_id)).await?;
        self.items.retain(|p| p.id != removed);
        Ok(())
    }

    pub fn page(&self, page: usize) -> &[Product] {
        paginate(&self.items, page, self.per_page)
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.items.len(), self.per_page)
    }
}
