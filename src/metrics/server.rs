use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use prometheus::{Encoder, Registry, TextEncoder};
use std::sync::Arc;

/// Serve `/metrics` and `/health` until the server stops.
/// Run it on its own thread and runtime; the admin core keeps the main one.
pub async fn start_metrics_server(registry: Arc<Registry>, port: u16) -> std::io::Result<()> {
    tracing::info!("📊 Starting metrics server on http://0.0.0.0:{}/metrics", port);

    HttpServer::new(move || App::new().configure(routes(registry.clone())))
        .bind(("0.0.0.0", port))?
        .run()
        .await
}

fn routes(registry: Arc<Registry>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(registry))
            .route("/metrics", web::get().to(metrics_handler))
            .route("/health", web::get().to(health_handler));
    }
}

async fn metrics_handler(registry: web::Data<Arc<Registry>>) -> impl Responder {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&registry.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type(TextEncoder::new().format_type())
        .body(buffer)
}

async fn health_handler(registry: web::Data<Arc<Registry>>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "shop-admin",
        "version": env!("CARGO_PKG_VERSION"),
        "metric_families": registry.gather().len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;

    fn registry() -> Arc<Registry> {
        let metrics = crate::metrics::Metrics::new().unwrap();
        metrics.record_confirmation(2);
        Arc::new(metrics.registry().clone())
    }

    #[actix_web::test]
    async fn test_metrics_endpoint_serves_text_format() {
        let app = test::init_service(App::new().configure(routes(registry()))).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
        assert!(resp.status().is_success());

        let body = test::read_body(resp).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("orders_confirmed_total 1"));
        assert!(text.contains("stock_units_decremented_total 2"));
    }

    #[actix_web::test]
    async fn test_health_endpoint() {
        let app = test::init_service(App::new().configure(routes(registry()))).await;
        let body: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "shop-admin");
    }
}
