use std::sync::Arc;

use serde_json::Value;

use crate::metrics::Metrics;
use crate::store::{
    collections, encode, DocRef, DocumentStore, FieldUpdates, Query, WriteBatch, SERVER_TIMESTAMP,
};

use super::aggregate::{Product, ProductDraft};
use super::errors::ProductError;
use super::value_objects::{ProductStatus, StockStatus};

// ============================================================================
// Product Repository
// ============================================================================
//
// Plain CRUD over the `products` collection. `update_product` overwrites the
// stock field with whatever the form submitted; an edit racing an order
// acceptance can therefore undo that acceptance's decrement.
//
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilters {
    /// Case-insensitive substring of the product name
    pub search: String,
    pub category: Option<String>,
    pub status: Option<ProductStatus>,
    pub stock_status: Option<StockStatus>,
}

pub struct ProductRepository {
    store: Arc<dyn DocumentStore>,
    metrics: Arc<Metrics>,
    low_stock_threshold: i64,
}

impl ProductRepository {
    pub fn new(store: Arc<dyn DocumentStore>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            metrics,
            low_stock_threshold: 10,
        }
    }

    pub fn with_low_stock_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = threshold;
        self
    }

    pub fn low_stock_threshold(&self) -> i64 {
        self.low_stock_threshold
    }

    pub async fn get_products(&self, filters: &ProductFilters) -> Result<Vec<Product>, ProductError> {
        self.metrics
            .observe("get_products", async move {
                let mut query = Query::collection(collections::PRODUCTS);
                if let Some(category) = filters.category.as_deref().filter(|c| !c.is_empty()) {
                    query = query.where_eq("category", category);
                }
                if let Some(status) = filters.status {
                    query = query.where_eq("status", status.as_str());
                }

                let needle = filters.search.trim().to_lowercase();
                let products = self
                    .store
                    .query(&query)
                    .await?
                    .iter()
                    .map(|doc| doc.decode::<Product>())
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter()
                    .filter(|p| {
                        filters
                            .stock_status
                            .map_or(true, |s| p.stock_status(self.low_stock_threshold) == s)
                    })
                    .filter(|p| needle.is_empty() || p.name.to_lowercase().contains(&needle))
                    .collect::<Vec<_>>();

                tracing::debug!(count = products.len(), "Fetched products");
                Ok::<_, ProductError>(products)
            })
            .await
    }

    pub async fn get_product(&self, product_id: &str) -> Result<Product, ProductError> {
        self.metrics.observe("get_product", self.load(product_id)).await
    }

    pub async fn add_product(&self, draft: ProductDraft) -> Result<Product, ProductError> {
        draft.validate()?;

        self.metrics
            .observe("add_product", async move {
                let id = self.store.new_id();
                let mut data = encode(&draft)?;
                data.insert("createdAt".to_string(), Value::from(SERVER_TIMESTAMP));
                data.insert("updatedAt".to_string(), Value::from(SERVER_TIMESTAMP));

                let mut batch = WriteBatch::new();
                batch.create(product_ref(&id), data);
                let receipt = self.store.commit(batch).await?;

                tracing::info!(product_id = %id, name = %draft.name, stock = draft.stock, "Product added");
                Ok::<_, ProductError>(from_draft(id, draft, receipt.committed_at))
            })
            .await
    }

    /// Overwrite every editable field, stock included
    pub async fn update_product(&self, product_id: &str, draft: ProductDraft) -> Result<Product, ProductError> {
        draft.validate()?;

        self.metrics
            .observe("update_product", async move {
                let mut fields = FieldUpdates::new();
                for (key, value) in encode(&draft)? {
                    fields = fields.set(&key, value);
                }
                if draft.cost_price.is_none() {
                    fields = fields.delete("costPrice");
                }
                if draft.images.is_none() {
                    fields = fields.delete("images");
                }

                let mut batch = WriteBatch::new();
                batch.update(product_ref(product_id), fields.server_timestamp("updatedAt"));
                self.store.commit(batch).await?;

                tracing::info!(product_id, stock = draft.stock, "Product updated");
                self.load(product_id).await
            })
            .await
    }

    pub async fn delete_product(&self, product_id: &str) -> Result<String, ProductError> {
        self.metrics
            .observe("delete_product", async move {
                let mut batch = WriteBatch::new();
                batch.delete(product_ref(product_id));
                self.store.commit(batch).await?;

                tracing::info!(product_id, "Product deleted");
                Ok::<_, ProductError>(product_id.to_string())
            })
            .await
    }

    async fn load(&self, product_id: &str) -> Result<Product, ProductError> {
        let document = self
            .store
            .get(&product_ref(product_id))
            .await?
            .ok_or_else(|| ProductError::NotFound(format!("product {}", product_id)))?;
        Ok(document.decode::<Product>()?)
    }
}

fn product_ref(product_id: &str) -> DocRef {
    DocRef::new(collections::PRODUCTS, product_id)
}

fn from_draft(id: String, draft: ProductDraft, at: chrono::DateTime<chrono::Utc>) -> Product {
    Product {
        id,
        name: draft.name,
        category: draft.category,
        price: draft.price,
        cost_price: draft.cost_price,
        stock: draft.stock,
        status: draft.status,
        images: draft.images,
        created_at: Some(at),
        updated_at: Some(at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn repo() -> (Arc<InMemoryStore>, ProductRepository) {
        let store = Arc::new(InMemoryStore::new());
        let repo = ProductRepository::new(store.clone(), Arc::new(Metrics::new().unwrap()))
            .with_low_stock_threshold(10);
        (store, repo)
    }

    #[tokio::test]
    async fn test_add_and_get() {
        let (_store, repo) = repo();
        let added = repo
            .add_product(ProductDraft::new("Widget", "Tools", 9.99, 20))
            .await
            .unwrap();

        let fetched = repo.get_product(&added.id).await.unwrap();
        assert_eq!(fetched.name, "Widget");
        assert_eq!(fetched.stock, 20);
        assert!(fetched.created_at.is_some());
    }

    #[tokio::test]
    async fn test_invalid_draft_not_written() {
        let (store, repo) = repo();
        let err = repo
            .add_product(ProductDraft::new("", "Tools", 9.99, 20))
            .await
            .unwrap_err();
        assert!(matches!(err, ProductError::Validation(_)));
        assert_eq!(store.commit_attempts(), 0);
    }

    #[tokio::test]
    async fn test_filters() {
        let (_store, repo) = repo();
        for (name, category, stock) in [
            ("Hammer", "Tools", 50),
            ("Wrench", "Tools", 4),
            ("Socks", "Apparel", 0),
        ] {
            repo.add_product(ProductDraft::new(name, category, 5.0, stock))
                .await
                .unwrap();
        }

        let tools = repo
            .get_products(&ProductFilters {
                category: Some("Tools".to_string()),
                ..ProductFilters::default()
            })
            .await
            .unwrap();
        assert_eq!(tools.len(), 2);

        let low = repo
            .get_products(&ProductFilters {
                stock_status: Some(StockStatus::LowStock),
                ..ProductFilters::default()
            })
            .await
            .unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].name, "Wrench");

        let search = repo
            .get_products(&ProductFilters {
                search: "SOC".to_string(),
                ..ProductFilters::default()
            })
            .await
            .unwrap();
        assert_eq!(search.len(), 1);
        assert_eq!(search[0].stock_status(10), StockStatus::OutOfStock);
    }

    #[tokio::test]
    async fn test_update_overwrites_fields() {
        let (_store, repo) = repo();
        let mut draft = ProductDraft::new("Widget", "Tools", 9.99, 20);
        draft.cost_price = Some(4.0);
        let added = repo.add_product(draft).await.unwrap();

        let mut edit = ProductDraft::new("Widget Pro", "Tools", 12.5, 7);
        edit.status = ProductStatus::Draft;
        let updated = repo.update_product(&added.id, edit).await.unwrap();

        assert_eq!(updated.name, "Widget Pro");
        assert_eq!(updated.stock, 7);
        assert_eq!(updated.status, ProductStatus::Draft);
        assert_eq!(updated.cost_price, None);
    }

    #[tokio::test]
    async fn test_update_missing_product() {
        let (_store, repo) = repo();
        let err = repo
            .update_product("nope", ProductDraft::new("Widget", "Tools", 9.99, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProductError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let (_store, repo) = repo();
        let added = repo
            .add_product(ProductDraft::new("Widget", "Tools", 9.99, 1))
            .await
            .unwrap();
        repo.delete_product(&added.id).await.unwrap();
        assert!(matches!(
            repo.get_product(&added.id).await,
            Err(ProductError::NotFound(_))
        ));
    }
}
