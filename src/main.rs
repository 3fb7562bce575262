use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod auth;
mod config;
mod domain;
mod health;
mod http;
mod metrics;
mod store;
mod utils;

use auth::TokenVerifier;
use config::{ServiceConfig, StoreBackend};
use domain::order::OrderCommandHandler;
use store::{InMemoryOrderRepository, OrderRepository, ScyllaOrderRepository};
use utils::{retry_with_backoff, RetryConfig};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging, default INFO, overridable with RUST_LOG
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_service=debug")),
        )
        .init();

    // === 1. Configuration: .env, then flags/env (fails fast without JWT_SECRET) ===
    let config = ServiceConfig::load();
    let verifier = TokenVerifier::new(&config.jwt_secret)?;

    tracing::info!(
        store = ?config.store_backend,
        read_policy = ?config.read_policy,
        transition_policy = ?config.transition_policy,
        "Loaded configuration"
    );

    // === 2. Order repository ===
    let repository: Arc<dyn OrderRepository> = match config.store_backend {
        StoreBackend::Scylla => {
            let retry = RetryConfig::default().with_max_attempts(config.store_connect_attempts);
            let repo = retry_with_backoff("connect_scylla", retry, |_attempt| {
                ScyllaOrderRepository::connect(&config.scylla_nodes, &config.scylla_keyspace)
            })
            .await?;
            Arc::new(repo)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory order store; orders are lost on restart");
            Arc::new(InMemoryOrderRepository::new())
        }
    };

    // === 3. Lifecycle engine ===
    let orders = OrderCommandHandler::new(repository)
        .with_timeouts(config.timeouts())
        .with_read_policy(config.read_policy)
        .with_transition_policy(config.transition_policy);

    // === 4. Prometheus metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!(
        "Metrics registry created with {} metric families",
        metrics.registry().gather().len()
    );

    // === 5. HTTP server ===
    let state = http::AppState::new(orders, verifier, metrics);
    http::start_server(state, config.bind_addr()).await?;

    tracing::info!("Order service stopped");
    Ok(())
}
