use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shop_admin::app_state::{open_store, session_persistence};
use shop_admin::domain::auth::InMemoryAuthProvider;
use shop_admin::domain::order::{format_currency, NewOrder, OrderItem, OrderStatus, StatusUpdate};
use shop_admin::domain::customer::NewCustomer;
use shop_admin::domain::product::ProductDraft;
use shop_admin::metrics::{self, Metrics};
use shop_admin::store::{collections, encode, DocRef, DocumentStore, WriteBatch};
use shop_admin::{AdminApp, AppConfig};

const DEMO_ADMIN_EMAIL: &str = "admin@shop.test";
const DEMO_ADMIN_PASSWORD: &str = "change-me";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let loaded = AppConfig::load().context("failed to load configuration")?;

    // RUST_LOG wins over the configured filter
    // Example: RUST_LOG=shop_admin=trace cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&loaded.config.log_filter)))
        .init();

    tracing::info!("🚀 Starting shop admin core");
    loaded.report();
    let config = loaded.config;

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metric families", metrics.registry().gather().len());

    if config.metrics_enabled {
        let registry = Arc::new(metrics.registry().clone());
        let port = config.metrics_port;
        // actix-web gets its own runtime so it never competes with the store
        std::thread::spawn(move || match tokio::runtime::Runtime::new() {
            Ok(rt) => rt.block_on(async {
                if let Err(e) = metrics::start_metrics_server(registry, port).await {
                    tracing::error!("Metrics server error: {}", e);
                }
            }),
            Err(e) => tracing::error!("Failed to start metrics runtime: {}", e),
        });
    }

    // === 2. Document store ===
    let store = open_store(&config).await?;

    // === 3. Admin identity (demo account) ===
    let provider = Arc::new(InMemoryAuthProvider::new());
    let admin_uid = provider.register(DEMO_ADMIN_EMAIL, DEMO_ADMIN_PASSWORD).await;
    seed_admin(store.as_ref(), &admin_uid).await?;

    let mut app = AdminApp::new(
        &config,
        store,
        metrics.clone(),
        provider,
        session_persistence(&config),
    );

    app.auth.check_persisted(&app.auth_service).await?;
    if !app.auth.is_authenticated {
        app.auth
            .login(&app.auth_service, DEMO_ADMIN_EMAIL, DEMO_ADMIN_PASSWORD, true)
            .await?;
    }
    tracing::info!("✅ Signed in as {}", app.require_admin()?.email);

    // === 4. Catalogue ===
    if let Err(e) = app.categories.create_category(&app.category_repo, "Tools").await {
        tracing::warn!("Category not created: {}", e);
    }
    app.products
        .create_product(&app.product_repo, ProductDraft::new("Claw Hammer", "Tools", 24.5, 20))
        .await?;
    app.products
        .create_product(&app.product_repo, ProductDraft::new("Socket Set", "Tools", 89.0, 6))
        .await?;
    app.categories.fetch_categories(&app.category_repo).await?;
    for category in &app.categories.items {
        tracing::info!("📦 Category {} holds {} products", category.name, category.product_count);
    }

    // === 5. Customer places an order ===
    app.customers
        .add_customer(
            &app.customer_repo,
            NewCustomer::new("Ann Example", "ann@example.com", "+1 555 0100"),
        )
        .await?;
    let customer = app
        .customers
        .customers
        .last()
        .cloned()
        .context("customer was not cached after creation")?;

    let hammer = app.products.items[0].clone();
    let sockets = app.products.items[1].clone();
    let order = NewOrder::new(
        customer.id.clone(),
        vec![
            OrderItem::new(hammer.id.clone(), hammer.name.clone(), hammer.price, 5),
            OrderItem::new(sockets.id.clone(), sockets.name.clone(), sockets.price, 2),
        ],
    )
    .with_customer(customer.name.clone(), Some(customer.email.0.clone()));
    app.orders.add_order(&app.order_repo, order).await?;
    let order_id = app.orders.orders[0].id.clone();

    // === 6. Order lifecycle ===
    tracing::info!("📝 Accepting order {}", order_id);
    app.orders
        .accept_order(&app.order_repo, &order_id, StatusUpdate::new(Some(10.0), "Gift wrap"))
        .await?;

    if let Err(e) = app
        .orders
        .accept_order(&app.order_repo, &order_id, StatusUpdate::default())
        .await
    {
        tracing::info!("🛡️ Second acceptance refused: {}", e);
    }

    app.orders
        .change_order_status(&app.order_repo, &order_id, OrderStatus::Delivered, StatusUpdate::default())
        .await?;

    if let Some(order) = app.orders.find(&order_id) {
        let pricing = order.pricing();
        tracing::info!(
            "✅ Order {} is {}: {} items, total {} (discount {})",
            order.id,
            order.status,
            order.item_count(),
            format_currency(pricing.final_total),
            format_currency(pricing.discount_amount)
        );
    }

    app.products.fetch_products(&app.product_repo).await?;
    for product in &app.products.items {
        tracing::info!(
            "📉 {}: {} in stock ({})",
            product.name,
            product.stock,
            product.stock_status(app.product_repo.low_stock_threshold()).label()
        );
    }

    // === 7. Messaging ===
    let admin_uid = app.require_admin()?.uid.clone();
    app.messages
        .open_conversation(&app.messaging_repo, &admin_uid, &customer.id)
        .await?;
    app.messages
        .send(&app.messaging_repo, &admin_uid, "Your order has been delivered. Thanks for shopping!")
        .await?;
    tracing::info!("💬 Conversation holds {} message(s)", app.messages.messages.len());

    app.auth.logout(&app.auth_service).await?;
    tracing::info!("🎉 Demo complete!");

    Ok(())
}

/// Give the demo account its `admins/{uid}` role document
async fn seed_admin(store: &dyn DocumentStore, uid: &str) -> anyhow::Result<()> {
    let mut batch = WriteBatch::new();
    batch.set(
        DocRef::new(collections::ADMINS, uid),
        encode(&json!({"email": DEMO_ADMIN_EMAIL, "role": "admin"}))?,
    );
    store.commit(batch).await?;
    Ok(())
}
