// ============================================================================
// HTTP Surface
// ============================================================================
//
// Routes:
//   POST /api/orders                  create an order for the caller
//   GET  /api/orders/{id}             fetch one order by order id
//   GET  /api/orders/user/{user_id}   list the caller's own orders
//   PUT  /api/orders/{id}/status      change an order's status
//   GET  /health                      store connectivity, no auth
//   GET  /metrics                     Prometheus exposition, no auth
//
// ============================================================================

mod errors;
mod handlers;
mod middleware;
mod server;

use actix_web::web;
use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::domain::order::OrderCommandHandler;
use crate::metrics::Metrics;

pub use errors::ApiError;
pub use server::start_server;

const JSON_BODY_LIMIT: usize = 64 * 1024;

/// Shared, read-only state handed to every worker.
#[derive(Clone)]
pub struct AppState {
    pub orders: web::Data<OrderCommandHandler>,
    pub verifier: web::Data<TokenVerifier>,
    pub metrics: web::Data<Metrics>,
}

impl AppState {
    pub fn new(
        orders: OrderCommandHandler,
        verifier: TokenVerifier,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            orders: web::Data::new(orders),
            verifier: web::Data::new(verifier),
            metrics: web::Data::from(metrics),
        }
    }
}

/// Register application data and routes.
pub fn configure(state: AppState) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let json = web::JsonConfig::default()
            .limit(JSON_BODY_LIMIT)
            .error_handler(handlers::reject_body);

        cfg.app_data(state.orders)
            .app_data(state.verifier)
            .app_data(state.metrics)
            .app_data(json)
            .route("/health", web::get().to(handlers::health))
            .route("/metrics", web::get().to(handlers::metrics_handler))
            .service(
                web::scope("/api/orders")
                    .route("", web::post().to(handlers::create_order))
                    .route("/user/{user_id}", web::get().to(handlers::get_user_orders))
                    .route("/{id}", web::get().to(handlers::get_order))
                    .route("/{id}/status", web::put().to(handlers::update_order_status)),
            );
    }
}

// ============================================================================
// End-to-end Tests
// ============================================================================
