use actix_web::middleware::from_fn;
use actix_web::{App, HttpServer};
use std::net::SocketAddr;

use super::middleware::{cors_headers, observe_requests, preflight};
use super::{configure, AppState};

/// Start the HTTP server and run until it is shut down (SIGINT/SIGTERM).
pub async fn start_server(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    tracing::info!("Order service starting on http://{}", addr);

    HttpServer::new(move || {
        App::new()
            .wrap(from_fn(observe_requests))
            .wrap(from_fn(preflight))
            .wrap(cors_headers())
            .configure(configure(state.clone()))
    })
    .bind(addr)?
    .run()
    .await
}
