use clap::{Parser, ValueEnum};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::order::{ReadPolicy, TransitionPolicy};
use crate::store::RepositoryTimeouts;

/// Backing store for orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    Scylla,
    /// Process-local storage; contents are lost on restart.
    Memory,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "order-service", about = "Order lifecycle HTTP service")]
pub struct ServiceConfig {
    /// Port the HTTP server listens on.
    #[arg(long, env = "PORT", default_value_t = 3003)]
    pub port: u16,

    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: IpAddr,

    #[arg(long, env = "STORE_BACKEND", value_enum, default_value_t = StoreBackend::Scylla)]
    pub store_backend: StoreBackend,

    /// ScyllaDB contact points, comma separated.
    #[arg(long, env = "SCYLLA_NODES", value_delimiter = ',', default_value = "127.0.0.1:9042")]
    pub scylla_nodes: Vec<String>,

    #[arg(long, env = "SCYLLA_KEYSPACE", default_value = "orders_ks")]
    pub scylla_keyspace: String,

    /// Attempts made to reach the store at startup before giving up.
    #[arg(long, env = "STORE_CONNECT_ATTEMPTS", default_value_t = 5)]
    pub store_connect_attempts: u32,

    /// Shared HS256 secret for bearer tokens. There is no default.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true, value_parser = non_empty)]
    pub jwt_secret: String,

    /// Who may read a single order: any authenticated subject, or its owner.
    #[arg(long, env = "ORDER_READ_POLICY", value_enum, default_value_t = ReadPolicy::Open)]
    pub read_policy: ReadPolicy,

    #[arg(
        long,
        env = "ORDER_TRANSITION_POLICY",
        value_enum,
        default_value_t = TransitionPolicy::Strict
    )]
    pub transition_policy: TransitionPolicy,

    #[arg(long, env = "HEALTH_TIMEOUT_MS", default_value_t = 2_000)]
    pub health_timeout_ms: u64,

    #[arg(long, env = "POINT_TIMEOUT_MS", default_value_t = 5_000)]
    pub point_timeout_ms: u64,

    #[arg(long, env = "SCAN_TIMEOUT_MS", default_value_t = 10_000)]
    pub scan_timeout_ms: u64,
}

impl ServiceConfig {
    /// Parse flags and environment after loading `.env` from the working
    /// directory. Variables already present in the process win over the file.
    pub fn load() -> Self {
        load_env_file(None);
        Self::parse()
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn timeouts(&self) -> RepositoryTimeouts {
        RepositoryTimeouts {
            health: Duration::from_millis(self.health_timeout_ms),
            point: Duration::from_millis(self.point_timeout_ms),
            scan: Duration::from_millis(self.scan_timeout_ms),
        }
    }
}

/// Load `path`, or the nearest `.env` when `None`. A missing file is not an error.
fn load_env_file(path: Option<&Path>) -> Option<PathBuf> {
    let result = match path {
        Some(path) => dotenvy::from_path(path).map(|()| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };

    match result {
        Ok(loaded) => {
            tracing::info!(path = %loaded.display(), "Loaded environment file");
            Some(loaded)
        }
        Err(e) if e.not_found() => None,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable environment file");
            None
        }
    }
}

fn non_empty(value: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        Err("must not be empty".to_string())
    } else {
        Ok(value.to_string())
    }
}
