use std::sync::Arc;

use serde_json::{json, Value};

use crate::domain::order::Order;
use crate::metrics::Metrics;
use crate::store::{collections, encode, DocRef, DocumentStore, Query, WriteBatch, SERVER_TIMESTAMP};

use super::aggregate::{Customer, NewCustomer};
use super::errors::CustomerError;

// ============================================================================
// Customer Repository
// ============================================================================

pub struct CustomerRepository {
    store: Arc<dyn DocumentStore>,
    metrics: Arc<Metrics>,
}

impl CustomerRepository {
    pub fn new(store: Arc<dyn DocumentStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    /// Customers whose email starts with `search_term` (all when empty)
    pub async fn fetch_customers(&self, search_term: &str) -> Result<Vec<Customer>, CustomerError> {
        self.metrics
            .observe("fetch_customers", async move {
                let mut query = Query::collection(collections::CUSTOMERS);
                let term = search_term.trim();
                if !term.is_empty() {
                    query = query.starts_with("email", term);
                }

                let customers = self
                    .store
                    .query(&query)
                    .await?
                    .iter()
                    .map(|doc| doc.decode::<Customer>())
                    .collect::<Result<Vec<_>, _>>()?;

                tracing::debug!(count = customers.len(), "Fetched customers");
                Ok::<_, CustomerError>(customers)
            })
            .await
    }

    /// Orders placed by one customer, newest first
    pub async fn fetch_customer_orders(&self, customer_id: &str) -> Result<Vec<Order>, CustomerError> {
        self.metrics
            .observe("fetch_customer_orders", async move {
                let query = Query::collection(collections::ORDERS).where_eq("userId", customer_id);
                let mut orders = self
                    .store
                    .query(&query)
                    .await?
                    .iter()
                    .map(|doc| doc.decode::<Order>())
                    .collect::<Result<Vec<_>, _>>()?;
                orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

                tracing::debug!(customer_id, count = orders.len(), "Fetched customer orders");
                Ok::<_, CustomerError>(orders)
            })
            .await
    }

    pub async fn create_customer(&self, new_customer: NewCustomer) -> Result<Customer, CustomerError> {
        new_customer.validate()?;

        self.metrics
            .observe("create_customer", async move {
                let id = self.store.new_id();
                let data = encode(&json!({
                    "name": new_customer.name,
                    "email": new_customer.email,
                    "phone": new_customer.phone,
                    "totalOrders": 0,
                    "totalSpent": 0,
                    "joinDate": SERVER_TIMESTAMP,
                    "lastOrder": Value::Null,
                }))?;

                let mut batch = WriteBatch::new();
                batch.create(DocRef::new(collections::CUSTOMERS, id.as_str()), data);
                let receipt = self.store.commit(batch).await?;

                tracing::info!(customer_id = %id, email = %new_customer.email.as_str(), "Customer created");
                Ok::<_, CustomerError>(Customer {
                    id,
                    name: new_customer.name,
                    email: new_customer.email,
                    phone: new_customer.phone,
                    total_orders: 0,
                    total_spent: 0.0,
                    join_date: Some(receipt.committed_at),
                    last_order: None,
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{NewOrder, OrderItem, OrderRepository};
    use crate::store::InMemoryStore;

    fn setup() -> (Arc<InMemoryStore>, Arc<Metrics>, CustomerRepository) {
        let store = Arc::new(InMemoryStore::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let repo = CustomerRepository::new(store.clone(), metrics.clone());
        (store, metrics, repo)
    }

    #[tokio::test]
    async fn test_create_and_search_by_email_prefix() {
        let (_store, _metrics, repo) = setup();
        for (name, email) in [("Ann", "ann@example.com"), ("Andy", "andy@example.com"), ("Bo", "bo@example.com")] {
            repo.create_customer(NewCustomer::new(name, email, "555-0100"))
                .await
                .unwrap();
        }

        assert_eq!(repo.fetch_customers("").await.unwrap().len(), 3);

        let hits = repo.fetch_customers("an").await.unwrap();
        let mut names: Vec<String> = hits.into_iter().map(|c| c.name).collect();
        names.sort();
        assert_eq!(names, vec!["Andy", "Ann"]);
    }

    #[tokio::test]
    async fn test_invalid_customer_not_written() {
        let (store, _metrics, repo) = setup();
        let err = repo
            .create_customer(NewCustomer::new("Ann", "ann-at-example", "555"))
            .await
            .unwrap_err();
        assert!(matches!(err, CustomerError::InvalidEmail(_)));
        assert_eq!(store.commit_attempts(), 0);
    }

    #[tokio::test]
    async fn test_customer_orders() {
        let (store, metrics, repo) = setup();
        let orders = OrderRepository::new(store.clone(), metrics);
        let customer = repo
            .create_customer(NewCustomer::new("Ann", "ann@example.com", "555"))
            .await
            .unwrap();

        let items = vec![OrderItem::new("p1", "Widget", 3.0, 1)];
        orders.create_order(NewOrder::new(customer.id.as_str(), items.clone())).await.unwrap();
        orders.create_order(NewOrder::new("someone-else", items)).await.unwrap();

        let mine = repo.fetch_customer_orders(&customer.id).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].user_id, customer.id);
    }
}
