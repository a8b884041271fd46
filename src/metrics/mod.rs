// Private module declaration
mod server;

use std::future::Future;
use std::time::Instant;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Repository operations (throughput, outcome, latency)
// - Order acceptance and status transitions
// - Inventory decrements caused by accepted orders
// - Messaging volume
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the admin application
pub struct Metrics {
    registry: Registry,

    // Repository Metrics
    pub repository_operations: IntCounterVec,
    pub repository_duration: HistogramVec,

    // Order Metrics
    pub orders_confirmed: IntCounter,
    pub order_transitions: IntCounterVec,
    pub stock_units_decremented: IntCounter,

    // Messaging Metrics
    pub messages_sent: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let repository_operations = IntCounterVec::new(
            Opts::new("repository_operations_total", "Repository operations by outcome"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(repository_operations.clone()))?;

        let repository_duration = HistogramVec::new(
            HistogramOpts::new(
                "repository_operation_duration_seconds",
                "Repository operation duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(repository_duration.clone()))?;

        let orders_confirmed = IntCounter::new(
            "orders_confirmed_total",
            "Orders accepted with their stock decremented",
        )?;
        registry.register(Box::new(orders_confirmed.clone()))?;

        let order_transitions = IntCounterVec::new(
            Opts::new("order_status_transitions_total", "Order status transitions"),
            &["from", "to"],
        )?;
        registry.register(Box::new(order_transitions.clone()))?;

        let stock_units_decremented = IntCounter::new(
            "stock_units_decremented_total",
            "Product units removed from stock by accepted orders",
        )?;
        registry.register(Box::new(stock_units_decremented.clone()))?;

        let messages_sent = IntCounter::new("messages_sent_total", "Messages sent by admins")?;
        registry.register(Box::new(messages_sent.clone()))?;

        Ok(Self {
            registry,
            repository_operations,
            repository_duration,
            orders_confirmed,
            order_transitions,
            stock_units_decremented,
            messages_sent,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record a repository call
    pub fn record_operation(&self, operation: &str, duration_secs: f64, success: bool) {
        let outcome = if success { "ok" } else { "error" };
        self.repository_operations
            .with_label_values(&[operation, outcome])
            .inc();
        self.repository_duration
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    /// Time an async repository call and record its outcome
    pub async fn observe<T, E, F>(&self, operation: &str, call: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let result = call.await;
        self.record_operation(operation, start.elapsed().as_secs_f64(), result.is_ok());
        result
    }

    /// Helper to record an order status transition
    pub fn record_transition(&self, from: &str, to: &str) {
        self.order_transitions.with_label_values(&[from, to]).inc();
    }

    /// Helper to record a committed order acceptance
    pub fn record_confirmation(&self, units: u64) {
        self.orders_confirmed.inc();
        self.stock_units_decremented.inc_by(units);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        // Vec metrics only show up once a label set is used
        assert!(!metrics.registry.gather().is_empty());
    }

    #[test]
    fn test_record_operation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_operation("confirm_order", 0.02, true);
        metrics.record_operation("confirm_order", 0.03, false);

        let gathered = metrics.registry.gather();
        let ops = gathered
            .iter()
            .find(|m| m.name() == "repository_operations_total")
            .unwrap();
        assert_eq!(ops.metric.len(), 2); // ok + error label sets
    }

    #[tokio::test]
    async fn test_observe_records_failures() {
        let metrics = Metrics::new().unwrap();
        let result: Result<(), &str> = metrics.observe("delete_order", async { Err("gone") }).await;
        assert!(result.is_err());
        assert_eq!(
            metrics
                .repository_operations
                .with_label_values(&["delete_order", "error"])
                .get(),
            1
        );
    }

    #[test]
    fn test_record_confirmation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_confirmation(5);
        metrics.record_confirmation(3);

        assert_eq!(metrics.orders_confirmed.get(), 2);
        assert_eq!(metrics.stock_units_decremented.get(), 8);
    }

    #[test]
    fn test_record_transition() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transition("accepted", "delivered");

        assert_eq!(
            metrics
                .order_transitions
                .with_label_values(&["accepted", "delivered"])
                .get(),
            1
        );
    }
}
