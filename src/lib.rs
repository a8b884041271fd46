// ============================================================================
// shop_admin - E-commerce admin core
// ============================================================================
//
// Headless core of a shop admin dashboard: order lifecycle with atomic
// acceptance (status transition + stock decrement in one batch), product,
// category and customer management, admin messaging and admin sign-in,
// all backed by a transactional document store.
//
// ============================================================================

pub mod app_state;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod state;
pub mod store;
pub mod utils;

pub use crate::app_state::AdminApp;
pub use crate::config::AppConfig;
pub use crate::metrics::Metrics;
