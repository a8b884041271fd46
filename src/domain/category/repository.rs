use std::sync::Arc;

use futures_util::future::try_join_all;
use serde_json::{json, Value};

use crate::metrics::Metrics;
use crate::store::{
    collections, encode, DocRef, DocumentStore, FieldUpdates, Query, StoreError, WriteBatch,
    SERVER_TIMESTAMP,
};

use super::aggregate::{normalize_name, Category};
use super::errors::CategoryError;

// ============================================================================
// Category Repository
// ============================================================================
//
// Every category name is also reserved as `category_names/{name}` in the
// same batch that writes the category. The reservation is a `create`, so two
// admins adding the same name at once cannot both commit.
//
// ============================================================================

pub struct CategoryRepository {
    store: Arc<dyn DocumentStore>,
    metrics: Arc<Metrics>,
}

impl CategoryRepository {
    pub fn new(store: Arc<dyn DocumentStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    /// All categories with the number of products filed under each
    pub async fn get_categories(&self) -> Result<Vec<Category>, CategoryError> {
        self.metrics
            .observe("get_categories", async move {
                let mut categories = self
                    .store
                    .query(&Query::collection(collections::CATEGORIES))
                    .await?
                    .iter()
                    .map(|doc| doc.decode::<Category>())
                    .collect::<Result<Vec<_>, _>>()?;

                let counts =
                    try_join_all(categories.iter().map(|c| self.product_count(&c.name))).await?;
                for (category, count) in categories.iter_mut().zip(counts) {
                    category.product_count = count;
                }
                categories.sort_by(|a, b| a.name.cmp(&b.name));

                tracing::debug!(count = categories.len(), "Fetched categories");
                Ok::<_, CategoryError>(categories)
            })
            .await
    }

    pub async fn add_category(&self, name: &str) -> Result<Category, CategoryError> {
        let name = normalize_name(name)?;

        self.metrics
            .observe("add_category", async move {
                if !self.find_by_name(&name).await?.is_empty() {
                    return Err(CategoryError::Duplicate(name));
                }

                let id = self.store.new_id();
                let data = encode(&json!({
                    "name": name,
                    "createdAt": SERVER_TIMESTAMP,
                    "updatedAt": SERVER_TIMESTAMP,
                }))?;
                let mut batch = WriteBatch::new();
                batch
                    .create(category_ref(&id), data)
                    .create(name_ref(&name), reservation(&id)?);
                let receipt = self
                    .store
                    .commit(batch)
                    .await
                    .map_err(|e| duplicate_on_conflict(e, &name))?;

                tracing::info!(category_id = %id, name = %name, "Category added");
                Ok(Category {
                    id,
                    name,
                    product_count: 0,
                    created_at: Some(receipt.committed_at),
                    updated_at: Some(receipt.committed_at),
                })
            })
            .await
    }

    /// Rename a category. Products keep the name they were filed under.
    pub async fn update_category(&self, category_id: &str, name: &str) -> Result<Category, CategoryError> {
        let name = normalize_name(name)?;

        self.metrics
            .observe("update_category", async move {
                let clash = self
                    .find_by_name(&name)
                    .await?
                    .into_iter()
                    .any(|c| c.id != category_id);
                if clash {
                    return Err(CategoryError::Duplicate(name));
                }

                let current = self.load(category_id).await?;
                let mut batch = WriteBatch::new();
                batch.update(
                    category_ref(category_id),
                    FieldUpdates::new()
                        .set("name", name.as_str())
                        .server_timestamp("updatedAt"),
                );
                if current.name != name {
                    batch
                        .delete(name_ref(&current.name))
                        .create(name_ref(&name), reservation(category_id)?);
                }
                self.store
                    .commit(batch)
                    .await
                    .map_err(|e| duplicate_on_conflict(e, &name))?;

                tracing::info!(category_id, from = %current.name, name = %name, "Category renamed");
                let mut category = self.load(category_id).await?;
                category.product_count = self.product_count(&category.name).await?;
                Ok(category)
            })
            .await
    }

    /// Refused while any product is filed under the category
    pub async fn delete_category(&self, category_id: &str) -> Result<String, CategoryError> {
        self.metrics
            .observe("delete_category", async move {
                let category = self.load(category_id).await?;
                let in_use = self.product_count(&category.name).await?;
                if in_use > 0 {
                    tracing::warn!(category_id, in_use, "Refusing to delete category in use");
                    return Err(CategoryError::InUse(in_use));
                }

                let mut batch = WriteBatch::new();
                batch
                    .delete(category_ref(category_id))
                    .delete(name_ref(&category.name));
                self.store.commit(batch).await?;

                tracing::info!(category_id, name = %category.name, "Category deleted");
                Ok(category_id.to_string())
            })
            .await
    }

    async fn product_count(&self, name: &str) -> Result<usize, CategoryError> {
        let query = Query::collection(collections::PRODUCTS).where_eq("category", name);
        Ok(self.store.count(&query).await?)
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<Category>, CategoryError> {
        let query = Query::collection(collections::CATEGORIES).where_eq("name", Value::from(name));
        self.store
            .query(&query)
            .await?
            .iter()
            .map(|doc| doc.decode::<Category>().map_err(CategoryError::from))
            .collect()
    }

    async fn load(&self, category_id: &str) -> Result<Category, CategoryError> {
        let document = self
            .store
            .get(&category_ref(category_id))
            .await?
            .ok_or_else(|| CategoryError::NotFound(format!("category {}", category_id)))?;
        Ok(document.decode::<Category>()?)
    }
}

fn category_ref(category_id: &str) -> DocRef {
    DocRef::new(collections::CATEGORIES, category_id)
}

/// Reservation document for a category name. Hex keeps any name a valid id.
fn name_ref(name: &str) -> DocRef {
    let key: String = name.bytes().map(|b| format!("{:02x}", b)).collect();
    DocRef::new(collections::CATEGORY_NAMES, key)
}

fn reservation(category_id: &str) -> Result<crate::store::Fields, StoreError> {
    encode(&json!({"categoryId": category_id}))
}

fn duplicate_on_conflict(err: StoreError, name: &str) -> CategoryError {
    match err {
        StoreError::AlreadyExists(_) => CategoryError::Duplicate(name.to_string()),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    async fn setup() -> (Arc<InMemoryStore>, CategoryRepository) {
        let store = Arc::new(InMemoryStore::new());
        for (id, category) in [("p1", "Tools"), ("p2", "Tools"), ("p3", "Garden")] {
            let data = encode(&json!({"name": id, "category": category, "price": 1.0, "stock": 1})).unwrap();
            store.insert(DocRef::new(collections::PRODUCTS, id), data).await;
        }
        let repo = CategoryRepository::new(store.clone(), Arc::new(Metrics::new().unwrap()));
        (store, repo)
    }

    #[tokio::test]
    async fn test_counts_attached() {
        let (_store, repo) = setup().await;
        repo.add_category("Tools").await.unwrap();
        repo.add_category("Kitchen").await.unwrap();

        let categories = repo.get_categories().await.unwrap();
        let counts: Vec<(&str, usize)> = categories
            .iter()
            .map(|c| (c.name.as_str(), c.product_count))
            .collect();
        assert_eq!(counts, vec![("Kitchen", 0), ("Tools", 2)]);
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected() {
        let (_store, repo) = setup().await;
        let tools = repo.add_category("Tools").await.unwrap();
        let garden = repo.add_category("Garden").await.unwrap();

        assert!(matches!(
            repo.add_category(" Tools ").await,
            Err(CategoryError::Duplicate(_))
        ));
        assert!(matches!(
            repo.update_category(&garden.id, "Tools").await,
            Err(CategoryError::Duplicate(_))
        ));

        // Keeping its own name is fine
        let same = repo.update_category(&tools.id, "Tools").await.unwrap();
        assert_eq!(same.product_count, 2);
    }

    #[tokio::test]
    async fn test_reserved_name_blocks_add() {
        let (store, repo) = setup().await;
        // Another admin's add committed its reservation; the category query misses it
        store
            .insert(name_ref("Tools"), reservation("c-other").unwrap())
            .await;

        assert_eq!(
            repo.add_category("Tools").await.unwrap_err(),
            CategoryError::Duplicate("Tools".to_string())
        );
        assert!(repo.get_categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_adds_keep_one_category() {
        let (_store, repo) = setup().await;
        let (a, b) = tokio::join!(repo.add_category("Tools"), repo.add_category("Tools"));

        assert!(a.is_ok() != b.is_ok());
        assert_eq!(repo.get_categories().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rename_and_delete_release_names() {
        let (_store, repo) = setup().await;
        let kitchen = repo.add_category("Kitchen").await.unwrap();

        repo.update_category(&kitchen.id, "Pantry").await.unwrap();
        let again = repo.add_category("Kitchen").await.unwrap();
        assert!(matches!(
            repo.add_category("Pantry").await,
            Err(CategoryError::Duplicate(_))
        ));

        repo.delete_category(&again.id).await.unwrap();
        repo.add_category("Kitchen").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_refused_while_in_use() {
        let (_store, repo) = setup().await;
        let tools = repo.add_category("Tools").await.unwrap();
        let kitchen = repo.add_category("Kitchen").await.unwrap();

        assert_eq!(
            repo.delete_category(&tools.id).await.unwrap_err(),
            CategoryError::InUse(2)
        );
        assert_eq!(repo.delete_category(&kitchen.id).await.unwrap(), kitchen.id);
        assert!(matches!(
            repo.delete_category(&kitchen.id).await,
            Err(CategoryError::NotFound(_))
        ));
    }
}
