use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::metrics::Metrics;
use crate::store::{
    collections, encode, timestamp_value, DocRef, DocumentStore, FieldUpdates, Query, StoreError,
    WriteBatch, SERVER_TIMESTAMP,
};

use super::aggregate::{validate_items, NewOrder, Order, StatusUpdate, UpdatedOrderSummary};
use super::errors::OrderError;
use super::filters::OrderFilters;
use super::value_objects::{OrderItem, OrderStatus};

// ============================================================================
// Order Repository
// ============================================================================
//
// Reads and writes order documents. Acceptance is one atomic batch:
//
//   guard   orders/{id}.status is placed
//   update  orders/{id}      status, discount, notes, updatedAt
//   update  products/{pid}   stock -= quantity, updatedAt   (per line item)
//   guard   products/{pid}.stock >= 0                       (per product)
//
// Either every document changes or none does, and a second accept of the
// same order fails its status guard instead of decrementing stock twice.
//
// ============================================================================

/// What deleting an accepted order does to the stock it consumed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Stock stays decremented
    #[default]
    WriteOff,
    /// Quantities of an accepted order go back to their products
    RestoreStock,
}

pub struct OrderRepository {
    store: Arc<dyn DocumentStore>,
    metrics: Arc<Metrics>,
    delete_policy: DeletePolicy,
}

impl OrderRepository {
    pub fn new(store: Arc<dyn DocumentStore>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            metrics,
            delete_policy: DeletePolicy::default(),
        }
    }

    pub fn with_delete_policy(mut self, delete_policy: DeletePolicy) -> Self {
        self.delete_policy = delete_policy;
        self
    }

    pub fn delete_policy(&self) -> DeletePolicy {
        self.delete_policy
    }

    pub async fn fetch_orders(&self, filters: &OrderFilters) -> Result<Vec<Order>, OrderError> {
        self.fetch_orders_at(filters, Utc::now()).await
    }

    /// List orders matching `filters`, with date boundaries relative to `now`.
    /// Newest first.
    pub async fn fetch_orders_at(
        &self,
        filters: &OrderFilters,
        now: DateTime<Utc>,
    ) -> Result<Vec<Order>, OrderError> {
        self.metrics
            .observe("fetch_orders", async move {
                let documents = self.store.query(&listing_query(filters, now)).await?;
                let mut orders = documents
                    .iter()
                    .map(|doc| doc.decode::<Order>())
                    .collect::<Result<Vec<_>, _>>()?;
                orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

                tracing::debug!(
                    count = orders.len(),
                    status = ?filters.status,
                    date_filter = ?filters.date_filter,
                    "Fetched orders"
                );
                Ok::<_, OrderError>(orders)
            })
            .await
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Order, OrderError> {
        self.metrics.observe("get_order", self.load(order_id)).await
    }

    /// Store a checkout order in the `placed` state
    pub async fn create_order(&self, new_order: NewOrder) -> Result<Order, OrderError> {
        validate_items(&new_order.items)?;

        self.metrics
            .observe("create_order", async move {
                let id = self.store.new_id();
                let total_amount = new_order.total_amount();
                let placeholder = Utc::now();
                let mut order = Order {
                    id: id.clone(),
                    user_id: new_order.user_id,
                    items: new_order.items,
                    total_amount,
                    customer: new_order.customer,
                    shipping_address: new_order.shipping_address,
                    payment_method: new_order.payment_method,
                    discount: 0.0,
                    notes: String::new(),
                    status: OrderStatus::Placed,
                    created_at: placeholder,
                    updated_at: placeholder,
                };

                let mut data = encode(&order)?;
                data.insert("createdAt".to_string(), Value::from(SERVER_TIMESTAMP));
                data.insert("updatedAt".to_string(), Value::from(SERVER_TIMESTAMP));

                let mut batch = WriteBatch::new();
                batch.create(order_ref(&id), data);
                let receipt = self.store.commit(batch).await?;

                order.created_at = receipt.committed_at;
                order.updated_at = receipt.committed_at;

                tracing::info!(
                    order_id = %id,
                    item_count = order.items.len(),
                    total_amount = order.total_amount,
                    "Order placed"
                );
                Ok::<_, OrderError>(order)
            })
            .await
    }

    /// Move an order along the status table without touching stock.
    /// Acceptance goes through `confirm_order`; discount and notes are only
    /// writable there.
    pub async fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        update: StatusUpdate,
    ) -> Result<UpdatedOrderSummary, OrderError> {
        if status == OrderStatus::Accepted {
            return Err(OrderError::Validation(
                "orders are accepted through confirm_order so stock is decremented".to_string(),
            ));
        }
        if !update.is_empty() {
            return Err(OrderError::Validation(
                "discount and notes can only be set when an order is accepted".to_string(),
            ));
        }

        self.metrics
            .observe("update_status", async move {
                let order = self.load(order_id).await?;
                let next = order.status.transition(status)?;

                if next == order.status {
                    tracing::debug!(order_id, status = %next, "Status unchanged, nothing to write");
                    return Ok(summary(&order, next));
                }

                let doc = order_ref(order_id);
                let mut batch = WriteBatch::new();
                batch
                    .require_one_of(doc.clone(), "status", stored_values(order.status))
                    .update(
                        doc,
                        FieldUpdates::new()
                            .set("status", next.as_str())
                            .server_timestamp("updatedAt"),
                    );
                self.store
                    .commit(batch)
                    .await
                    .map_err(|e| commit_error(e, next))?;

                self.metrics.record_transition(order.status.as_str(), next.as_str());
                tracing::info!(order_id, from = %order.status, to = %next, "Order status updated");
                Ok::<_, OrderError>(summary(&order, next))
            })
            .await
    }

    /// Accept a placed order and decrement stock for every line item, as one
    /// atomic batch. Input is validated before the store is touched.
    pub async fn confirm_order(
        &self,
        order_id: &str,
        update: StatusUpdate,
        items: &[OrderItem],
    ) -> Result<UpdatedOrderSummary, OrderError> {
        validate_items(items)?;
        let discount = update.discount_percentage()?;
        let notes = update.notes_text();

        self.metrics
            .observe("confirm_order", async move {
                let order_doc = order_ref(order_id);
                let mut batch = WriteBatch::new();
                batch
                    .require_one_of(
                        order_doc.clone(),
                        "status",
                        stored_values(OrderStatus::Placed),
                    )
                    .update(
                        order_doc,
                        FieldUpdates::new()
                            .set("status", OrderStatus::Accepted.as_str())
                            .set("discount", discount)
                            .set("notes", notes.clone())
                            .server_timestamp("updatedAt"),
                    );

                let mut products = BTreeSet::new();
                let mut units = 0u64;
                for item in items {
                    let product = product_ref(&item.product_id);
                    batch.update(
                        product.clone(),
                        FieldUpdates::new()
                            .increment("stock", -item.quantity)
                            .server_timestamp("updatedAt"),
                    );
                    products.insert(product);
                    units += item.quantity.unsigned_abs();
                }
                for product in products {
                    batch.require_at_least(product, "stock", 0.0);
                }

                let receipt = self
                    .store
                    .commit(batch)
                    .await
                    .map_err(|e| commit_error(e, OrderStatus::Accepted))?;

                self.metrics.record_confirmation(units);
                self.metrics.record_transition(
                    OrderStatus::Placed.as_str(),
                    OrderStatus::Accepted.as_str(),
                );
                tracing::info!(
                    order_id,
                    item_count = items.len(),
                    units,
                    writes = receipt.writes,
                    "Order accepted, stock decremented"
                );

                Ok::<_, OrderError>(UpdatedOrderSummary {
                    id: order_id.to_string(),
                    status: OrderStatus::Accepted,
                    discount,
                    notes,
                })
            })
            .await
    }

    /// placed -> cancelled. Nothing was deducted yet, so stock is untouched.
    pub async fn cancel_order(&self, order_id: &str) -> Result<UpdatedOrderSummary, OrderError> {
        self.update_status(order_id, OrderStatus::Cancelled, StatusUpdate::default())
            .await
    }

    /// Hard delete. Stock handling follows the repository's `DeletePolicy`.
    /// The delete only commits if the order still has the status it was read
    /// with; otherwise the caller gets `IllegalTransition` and may retry.
    pub async fn delete_order(&self, order_id: &str) -> Result<String, OrderError> {
        self.metrics
            .observe("delete_order", async move {
                let order = self.load(order_id).await?;
                let doc = order_ref(order_id);
                let restore = self.delete_policy == DeletePolicy::RestoreStock
                    && order.status == OrderStatus::Accepted;

                let mut batch = WriteBatch::new();
                batch.require_one_of(doc.clone(), "status", stored_values(order.status));
                if restore {
                    for item in &order.items {
                        batch.update(
                            product_ref(&item.product_id),
                            FieldUpdates::new()
                                .increment("stock", item.quantity)
                                .server_timestamp("updatedAt"),
                        );
                    }
                }
                batch.delete(doc);
                self.store
                    .commit(batch)
                    .await
                    .map_err(|e| commit_error(e, order.status))?;

                tracing::info!(order_id, status = %order.status, restored_stock = restore, "Order deleted");
                Ok::<_, OrderError>(order_id.to_string())
            })
            .await
    }

    async fn load(&self, order_id: &str) -> Result<Order, OrderError> {
        let document = self
            .store
            .get(&order_ref(order_id))
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("order {}", order_id)))?;
        Ok(document.decode::<Order>()?)
    }
}

fn order_ref(order_id: &str) -> DocRef {
    DocRef::new(collections::ORDERS, order_id)
}

fn product_ref(product_id: &str) -> DocRef {
    DocRef::new(collections::PRODUCTS, product_id)
}

fn stored_values(status: OrderStatus) -> Vec<Value> {
    status.stored_forms().iter().map(|s| Value::from(*s)).collect()
}

fn listing_query(filters: &OrderFilters, now: DateTime<Utc>) -> Query {
    let mut query = Query::collection(collections::ORDERS);

    if let Some(status) = filters.status {
        query = query.where_in("status", stored_values(status));
    }
    if let Some(start) = filters.date_filter.start_boundary(now) {
        query = query.where_gte("createdAt", timestamp_value(start));
    }
    let term = filters.search_term.trim();
    if !term.is_empty() {
        query = query.starts_with("customer.name", term);
    }

    query
}

fn summary(order: &Order, status: OrderStatus) -> UpdatedOrderSummary {
    UpdatedOrderSummary {
        id: order.id.clone(),
        status,
        discount: order.discount,
        notes: order.notes.clone(),
    }
}

/// A failed status guard means someone else moved the order first
fn commit_error(err: StoreError, target: OrderStatus) -> OrderError {
    if let StoreError::FailedPrecondition {
        doc, field, actual, ..
    } = &err
    {
        if field == "status" {
            if let Some(from) = actual
                .as_ref()
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<OrderStatus>().ok())
            {
                return OrderError::IllegalTransition { from, to: target };
            }
        } else if field == "stock" {
            return OrderError::Transaction(format!("insufficient stock for {}", doc));
        }
    }
    err.into()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::DateFilter;
    use crate::store::InMemoryStore;
    use chrono::TimeZone;
    use serde_json::json;

    struct Fixture {
        store: Arc<InMemoryStore>,
        repo: OrderRepository,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        seed_product(&store, "p1", 20).await;
        seed_product(&store, "p2", 5).await;
        let metrics = Arc::new(Metrics::new().unwrap());
        let repo = OrderRepository::new(store.clone(), metrics);
        Fixture { store, repo }
    }

    async fn seed_product(store: &InMemoryStore, id: &str, stock: i64) {
        let data = encode(&json!({
            "name": format!("Product {}", id),
            "category": "Tools",
            "price": 9.99,
            "stock": stock,
            "status": "published",
        }))
        .unwrap();
        store.insert(product_ref(id), data).await;
    }

    async fn stock(store: &InMemoryStore, id: &str) -> i64 {
        let doc = store.get(&product_ref(id)).await.unwrap().unwrap();
        doc.field("stock").and_then(Value::as_i64).unwrap()
    }

    fn widget(quantity: i64) -> Vec<OrderItem> {
        vec![OrderItem::new("p1", "Widget", 9.99, quantity)]
    }

    async fn place(repo: &OrderRepository, items: Vec<OrderItem>) -> Order {
        repo.create_order(NewOrder::new("u1", items).with_customer("Alice", None))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_accept_decrements_stock() {
        let f = fixture().await;
        let first = place(&f.repo, widget(5)).await;

        let summary = f
            .repo
            .confirm_order(&first.id, StatusUpdate::new(Some(10.0), "rush"), &first.items)
            .await
            .unwrap();
        assert_eq!(summary.status, OrderStatus::Accepted);
        assert_eq!(stock(&f.store, "p1").await, 15);

        let second = place(&f.repo, widget(5)).await;
        f.repo
            .confirm_order(&second.id, StatusUpdate::default(), &second.items)
            .await
            .unwrap();
        assert_eq!(stock(&f.store, "p1").await, 10);

        let stored = f.repo.get_order(&first.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Accepted);
        assert_eq!(stored.discount, 10.0);
        assert_eq!(stored.notes, "rush");
    }

    #[tokio::test]
    async fn test_failed_commit_changes_nothing() {
        let f = fixture().await;
        let order = place(&f.repo, widget(5)).await;

        f.store.fail_next_commit(StoreError::Aborted("connection reset".to_string()));
        let err = f
            .repo
            .confirm_order(&order.id, StatusUpdate::default(), &order.items)
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::Transaction(_)));
        assert_eq!(f.repo.get_order(&order.id).await.unwrap().status, OrderStatus::Placed);
        assert_eq!(stock(&f.store, "p1").await, 20);
    }

    #[tokio::test]
    async fn test_empty_items_never_reach_store() {
        let f = fixture().await;
        let order = place(&f.repo, widget(1)).await;
        let attempts = f.store.commit_attempts();

        let err = f
            .repo
            .confirm_order(&order.id, StatusUpdate::new(Some(10.0), ""), &[])
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::Validation(_)));
        assert_eq!(f.store.commit_attempts(), attempts);
    }

    #[tokio::test]
    async fn test_invalid_discount_rejected_before_io() {
        let f = fixture().await;
        let attempts = f.store.commit_attempts();
        let err = f
            .repo
            .confirm_order("o1", StatusUpdate::new(Some(150.0), ""), &widget(1))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
        assert_eq!(f.store.commit_attempts(), attempts);
    }

    #[tokio::test]
    async fn test_second_accept_is_rejected() {
        let f = fixture().await;
        let order = place(&f.repo, widget(5)).await;

        f.repo
            .confirm_order(&order.id, StatusUpdate::default(), &order.items)
            .await
            .unwrap();
        let err = f
            .repo
            .confirm_order(&order.id, StatusUpdate::default(), &order.items)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            OrderError::IllegalTransition {
                from: OrderStatus::Accepted,
                to: OrderStatus::Accepted
            }
        );
        assert_eq!(stock(&f.store, "p1").await, 15);
    }

    #[tokio::test]
    async fn test_concurrent_accepts_decrement_once() {
        let f = fixture().await;
        let order = place(&f.repo, widget(5)).await;

        let (a, b) = tokio::join!(
            f.repo.confirm_order(&order.id, StatusUpdate::default(), &order.items),
            f.repo.confirm_order(&order.id, StatusUpdate::default(), &order.items),
        );

        assert!(a.is_ok() != b.is_ok());
        assert_eq!(stock(&f.store, "p1").await, 15);
    }

    #[tokio::test]
    async fn test_insufficient_stock_aborts_whole_batch() {
        let f = fixture().await;
        let order = place(
            &f.repo,
            vec![
                OrderItem::new("p1", "Widget", 9.99, 2),
                OrderItem::new("p2", "Gadget", 4.5, 6),
            ],
        )
        .await;

        let err = f
            .repo
            .confirm_order(&order.id, StatusUpdate::default(), &order.items)
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::Transaction(msg) if msg.contains("products/p2")));
        assert_eq!(stock(&f.store, "p1").await, 20);
        assert_eq!(stock(&f.store, "p2").await, 5);
        assert_eq!(f.repo.get_order(&order.id).await.unwrap().status, OrderStatus::Placed);
    }

    #[tokio::test]
    async fn test_missing_product_is_not_found() {
        let f = fixture().await;
        let order = place(&f.repo, vec![OrderItem::new("p9", "Ghost", 1.0, 1)]).await;

        let err = f
            .repo
            .confirm_order(&order.id, StatusUpdate::default(), &order.items)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::NotFound(path) if path == "products/p9"));
    }

    #[tokio::test]
    async fn test_missing_order_is_not_found() {
        let f = fixture().await;
        let err = f
            .repo
            .confirm_order("nope", StatusUpdate::default(), &widget(1))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::NotFound(_)));
        assert_eq!(stock(&f.store, "p1").await, 20);
    }

    #[tokio::test]
    async fn test_delivered_again_is_noop() {
        let f = fixture().await;
        let order = place(&f.repo, widget(1)).await;
        f.repo
            .confirm_order(&order.id, StatusUpdate::default(), &order.items)
            .await
            .unwrap();
        f.repo
            .update_status(&order.id, OrderStatus::Delivered, StatusUpdate::default())
            .await
            .unwrap();

        let writes = f.store.writes_committed();
        let summary = f
            .repo
            .update_status(&order.id, OrderStatus::Delivered, StatusUpdate::default())
            .await
            .unwrap();

        assert_eq!(summary.status, OrderStatus::Delivered);
        assert_eq!(f.store.writes_committed(), writes);
        assert_eq!(OrderStatus::Delivered.next_action(), None);
    }

    #[tokio::test]
    async fn test_update_status_guards() {
        let f = fixture().await;
        let order = place(&f.repo, widget(1)).await;

        let accept = f
            .repo
            .update_status(&order.id, OrderStatus::Accepted, StatusUpdate::default())
            .await;
        assert!(matches!(accept, Err(OrderError::Validation(_))));

        let skip = f
            .repo
            .update_status(&order.id, OrderStatus::Delivered, StatusUpdate::default())
            .await;
        assert_eq!(
            skip.unwrap_err(),
            OrderError::IllegalTransition {
                from: OrderStatus::Placed,
                to: OrderStatus::Delivered
            }
        );

        let with_notes = f
            .repo
            .update_status(&order.id, OrderStatus::Cancelled, StatusUpdate::new(None, "late"))
            .await;
        assert!(matches!(with_notes, Err(OrderError::Validation(_))));
    }

    #[tokio::test]
    async fn test_cancel_then_accept_fails() {
        let f = fixture().await;
        let order = place(&f.repo, widget(2)).await;

        let cancelled = f.repo.cancel_order(&order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let err = f
            .repo
            .confirm_order(&order.id, StatusUpdate::default(), &order.items)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::IllegalTransition {
                from: OrderStatus::Cancelled,
                ..
            }
        ));
        assert_eq!(stock(&f.store, "p1").await, 20);
    }

    #[tokio::test]
    async fn test_fetch_by_status() {
        let f = fixture().await;
        let accepted = place(&f.repo, widget(1)).await;
        place(&f.repo, widget(1)).await;
        let delivered = place(&f.repo, widget(1)).await;
        for order in [&accepted, &delivered] {
            f.repo
                .confirm_order(&order.id, StatusUpdate::default(), &order.items)
                .await
                .unwrap();
        }
        f.repo
            .update_status(&delivered.id, OrderStatus::Delivered, StatusUpdate::default())
            .await
            .unwrap();

        let orders = f
            .repo
            .fetch_orders(&OrderFilters::status(OrderStatus::Accepted))
            .await
            .unwrap();

        assert_eq!(orders.len(), 1);
        assert!(orders.iter().all(|o| o.status == OrderStatus::Accepted));
        assert_eq!(orders[0].id, accepted.id);

        let all = f.repo.fetch_orders(&OrderFilters::default()).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_items_round_trip() {
        let f = fixture().await;
        let items = widget(3);
        let order = place(&f.repo, items.clone()).await;

        let fetched = f.repo.get_order(&order.id).await.unwrap();
        assert_eq!(fetched.items, items);
        assert_eq!(fetched.status, OrderStatus::Placed);
        assert!((fetched.total_amount - 29.97).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_date_and_search_filters() {
        let f = fixture().await;
        let now = Utc.with_ymd_and_hms(2024, 3, 13, 12, 0, 0).unwrap();
        let seed = |id: &str, name: &str, created: &str| {
            let data = encode(&json!({
                "userId": "u1",
                "items": [{"productId": "p1", "name": "Widget", "price": 1.0, "quantity": 1}],
                "totalAmount": 1.0,
                "status": "placed",
                "customer": {"name": name},
                "createdAt": created,
                "updatedAt": created,
            }))
            .unwrap();
            (order_ref(id), data)
        };
        for (doc, data) in [
            seed("today", "Alice", "2024-03-13T09:00:00Z"),
            seed("sunday", "Albert", "2024-03-10T09:00:00Z"),
            seed("february", "Bob", "2024-02-20T09:00:00Z"),
            seed("last-year", "Alina", "2023-12-31T23:59:59Z"),
        ] {
            f.store.insert(doc, data).await;
        }

        let ids = |orders: Vec<Order>| orders.into_iter().map(|o| o.id).collect::<Vec<_>>();
        let with = |date_filter: DateFilter, search: &str| OrderFilters {
            status: None,
            date_filter,
            search_term: search.to_string(),
        };

        let today = f.repo.fetch_orders_at(&with(DateFilter::Today, ""), now).await.unwrap();
        assert_eq!(ids(today), vec!["today"]);

        let week = f.repo.fetch_orders_at(&with(DateFilter::Week, ""), now).await.unwrap();
        assert_eq!(ids(week), vec!["today", "sunday"]);

        let year = f.repo.fetch_orders_at(&with(DateFilter::Year, ""), now).await.unwrap();
        assert_eq!(year.len(), 3);

        let al = f.repo.fetch_orders_at(&with(DateFilter::All, "Al"), now).await.unwrap();
        assert_eq!(ids(al), vec!["today", "sunday", "last-year"]);
    }

    #[tokio::test]
    async fn test_legacy_pending_order_can_be_accepted() {
        let f = fixture().await;
        let data = encode(&json!({
            "userId": "u1",
            "items": [{"productId": "p1", "name": "Widget", "price": 2.0, "quantity": 4}],
            "totalAmount": 8.0,
            "status": "pending",
            "createdAt": "2024-03-01T10:00:00Z",
            "updatedAt": "2024-03-01T10:00:00Z",
        }))
        .unwrap();
        f.store.insert(order_ref("legacy"), data).await;

        let placed = f
            .repo
            .fetch_orders(&OrderFilters::status(OrderStatus::Placed))
            .await
            .unwrap();
        assert_eq!(placed.len(), 1);

        f.repo
            .confirm_order("legacy", StatusUpdate::default(), &placed[0].items)
            .await
            .unwrap();
        assert_eq!(stock(&f.store, "p1").await, 16);
    }

    #[tokio::test]
    async fn test_delete_write_off_keeps_stock() {
        let f = fixture().await;
        let order = place(&f.repo, widget(5)).await;
        f.repo
            .confirm_order(&order.id, StatusUpdate::default(), &order.items)
            .await
            .unwrap();

        assert_eq!(f.repo.delete_order(&order.id).await.unwrap(), order.id);
        assert!(matches!(
            f.repo.get_order(&order.id).await,
            Err(OrderError::NotFound(_))
        ));
        assert_eq!(stock(&f.store, "p1").await, 15);
    }

    #[tokio::test]
    async fn test_delete_restore_stock_policy() {
        let store = Arc::new(InMemoryStore::new());
        seed_product(&store, "p1", 20).await;
        let repo = OrderRepository::new(store.clone(), Arc::new(Metrics::new().unwrap()))
            .with_delete_policy(DeletePolicy::RestoreStock);

        let order = place(&repo, widget(5)).await;
        repo.confirm_order(&order.id, StatusUpdate::default(), &order.items)
            .await
            .unwrap();
        assert_eq!(stock(&store, "p1").await, 15);

        repo.delete_order(&order.id).await.unwrap();
        assert_eq!(stock(&store, "p1").await, 20);
    }

    /// Commits a queued batch from another admin just before the next commit
    struct InterleavedStore {
        inner: Arc<InMemoryStore>,
        queued: std::sync::Mutex<Option<WriteBatch>>,
    }

    #[async_trait::async_trait]
    impl DocumentStore for InterleavedStore {
        async fn get(&self, doc: &DocRef) -> Result<Option<crate::store::Document>, StoreError> {
            self.inner.get(doc).await
        }

        async fn query(&self, query: &Query) -> Result<Vec<crate::store::Document>, StoreError> {
            self.inner.query(query).await
        }

        async fn commit(&self, batch: WriteBatch) -> Result<crate::store::CommitReceipt, StoreError> {
            let queued = self.queued.lock().unwrap().take();
            if let Some(other) = queued {
                self.inner.commit(other).await?;
            }
            self.inner.commit(batch).await
        }
    }

    #[tokio::test]
    async fn test_delete_refused_when_order_accepted_meanwhile() {
        let inner = Arc::new(InMemoryStore::new());
        seed_product(&inner, "p1", 20).await;
        let store = Arc::new(InterleavedStore {
            inner: inner.clone(),
            queued: std::sync::Mutex::new(None),
        });
        let repo = OrderRepository::new(store.clone(), Arc::new(Metrics::new().unwrap()))
            .with_delete_policy(DeletePolicy::RestoreStock);
        let order = place(&repo, widget(5)).await;

        let doc = order_ref(&order.id);
        let mut accept = WriteBatch::new();
        accept
            .require_one_of(doc.clone(), "status", stored_values(OrderStatus::Placed))
            .update(doc, FieldUpdates::new().set("status", "accepted"))
            .update(product_ref("p1"), FieldUpdates::new().increment("stock", -5));
        *store.queued.lock().unwrap() = Some(accept);

        let err = repo.delete_order(&order.id).await.unwrap_err();
        assert!(matches!(
            err,
            OrderError::IllegalTransition {
                from: OrderStatus::Accepted,
                ..
            }
        ));
        assert_eq!(repo.get_order(&order.id).await.unwrap().status, OrderStatus::Accepted);
        assert_eq!(stock(&inner, "p1").await, 15);

        // A retry sees the accepted order and gives the stock back
        repo.delete_order(&order.id).await.unwrap();
        assert_eq!(stock(&inner, "p1").await, 20);
    }

    #[tokio::test]
    async fn test_delete_missing_order() {
        let f = fixture().await;
        assert!(matches!(
            f.repo.delete_order("missing").await,
            Err(OrderError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_items() {
        let f = fixture().await;
        let err = f
            .repo
            .create_order(NewOrder::new("u1", widget(0)))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
        assert_eq!(f.store.commit_attempts(), 0);
    }
}
