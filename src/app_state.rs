use std::sync::Arc;

use anyhow::Context;

use crate::config::AppConfig;
use crate::domain::auth::{
    AdminAuthService, AdminUser, AuthError, AuthProvider, AuthState, FileSession, MemorySession,
    SessionPersistence,
};
use crate::domain::category::{CategoryRepository, CategoryState};
use crate::domain::customer::{CustomerRepository, CustomerState};
use crate::domain::messaging::{MessageState, MessagingRepository};
use crate::domain::order::{OrderRepository, OrderState};
use crate::domain::product::{ProductRepository, ProductState};
use crate::metrics::Metrics;
use crate::store::{DocumentStore, InMemoryStore, PgDocumentStore, StoreError};
use crate::utils::{retry_on_transient, RetryConfig};

// ============================================================================
// Admin Application State
// ============================================================================
//
// One explicit value owns every repository and every state container. The
// presentation layer holds an `AdminApp` and calls into the containers with
// the matching repository, e.g. `app.orders.get_orders(&app.order_repo)`.
//
// ============================================================================

pub struct AdminApp {
    pub store: Arc<dyn DocumentStore>,
    pub metrics: Arc<Metrics>,

    pub order_repo: OrderRepository,
    pub product_repo: ProductRepository,
    pub category_repo: CategoryRepository,
    pub customer_repo: CustomerRepository,
    pub messaging_repo: MessagingRepository,
    pub auth_service: AdminAuthService,

    pub orders: OrderState,
    pub products: ProductState,
    pub categories: CategoryState,
    pub customers: CustomerState,
    pub messages: MessageState,
    pub auth: AuthState,
}

impl AdminApp {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn DocumentStore>,
        metrics: Arc<Metrics>,
        provider: Arc<dyn AuthProvider>,
        session: Arc<dyn SessionPersistence>,
    ) -> Self {
        Self {
            order_repo: OrderRepository::new(store.clone(), metrics.clone())
                .with_delete_policy(config.order_delete_policy),
            product_repo: ProductRepository::new(store.clone(), metrics.clone())
                .with_low_stock_threshold(config.low_stock_threshold),
            category_repo: CategoryRepository::new(store.clone(), metrics.clone()),
            customer_repo: CustomerRepository::new(store.clone(), metrics.clone()),
            messaging_repo: MessagingRepository::new(store.clone(), metrics.clone()),
            auth_service: AdminAuthService::new(provider, store.clone(), session, metrics.clone()),

            orders: OrderState::new(config.orders_per_page),
            products: ProductState::new(config.products_per_page),
            categories: CategoryState::new(),
            customers: CustomerState::new(),
            messages: MessageState::new(),
            auth: AuthState::new(),

            store,
            metrics,
        }
    }

    /// The signed-in admin, or an error when nobody is signed in
    pub fn require_admin(&self) -> Result<&AdminUser, AuthError> {
        match (&self.auth.user, self.auth.is_authenticated) {
            (Some(user), true) => Ok(user),
            _ => Err(AuthError::NotAdmin),
        }
    }
}

/// Session persistence selected by `session_file`
pub fn session_persistence(config: &AppConfig) -> Arc<dyn SessionPersistence> {
    match &config.session_file {
        Some(path) => Arc::new(FileSession::new(path.clone())),
        None => Arc::new(MemorySession::new()),
    }
}

/// Postgres when `database_url` is set (retrying while the database comes
/// up), the in-memory store otherwise
pub async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::info!("No database_url configured, using the in-memory store");
        return Ok(Arc::new(InMemoryStore::new()));
    };

    let max_connections = config.max_connections;
    let store = retry_on_transient(RetryConfig::startup(config.connect_retries), |attempt| async move {
        tracing::info!(attempt, "Connecting to Postgres");
        let store = PgDocumentStore::connect(url, max_connections).await?;
        store.migrate().await?;
        Ok::<_, StoreError>(store)
    })
    .await
    .into_result()
    .context("failed to connect to the document database")?;

    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::auth::InMemoryAuthProvider;
    use crate::domain::order::{NewOrder, OrderItem, OrderStatus, StatusUpdate};
    use crate::domain::product::ProductDraft;
    use crate::store::{collections, encode, DocRef};
    use serde_json::json;

    async fn app() -> (AdminApp, Arc<InMemoryStore>) {
        let config = AppConfig::default();
        let store = Arc::new(InMemoryStore::new());
        let provider = Arc::new(InMemoryAuthProvider::new());
        let uid = provider.register("admin@shop.test", "s3cret").await;
        store
            .insert(
                DocRef::new(collections::ADMINS, uid),
                encode(&json!({"role": "admin"})).unwrap(),
            )
            .await;

        let app = AdminApp::new(
            &config,
            store.clone(),
            Arc::new(Metrics::new().unwrap()),
            provider,
            session_persistence(&config),
        );
        (app, store)
    }

    #[tokio::test]
    async fn test_in_memory_store_without_database_url() {
        let store = open_store(&AppConfig::default()).await.unwrap();
        assert!(store.get(&DocRef::new("orders", "none")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_admin_workflow() {
        let (mut app, store) = app().await;
        assert!(app.require_admin().is_err());

        app.auth
            .login(&app.auth_service, "admin@shop.test", "s3cret", false)
            .await
            .unwrap();
        assert_eq!(app.require_admin().unwrap().email, "admin@shop.test");

        app.products
            .create_product(&app.product_repo, ProductDraft::new("Widget", "Tools", 9.99, 20))
            .await
            .unwrap();
        let product_id = app.products.items[0].id.clone();

        let order = NewOrder::new("u1", vec![OrderItem::new(&product_id, "Widget", 9.99, 5)]);
        app.orders.add_order(&app.order_repo, order).await.unwrap();
        let order_id = app.orders.orders[0].id.clone();

        app.orders
            .accept_order(&app.order_repo, &order_id, StatusUpdate::new(Some(10.0), "rush"))
            .await
            .unwrap();
        assert_eq!(app.orders.find(&order_id).unwrap().status, OrderStatus::Accepted);

        let product = store
            .get(&DocRef::new(collections::PRODUCTS, &product_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.field("stock"), Some(&json!(15)));

        app.auth.logout(&app.auth_service).await.unwrap();
        assert!(app.require_admin().is_err());
    }
}
