// ============================================================================
// Order Repository - Persistence abstraction
// ============================================================================
//
// The lifecycle engine only sees the `OrderRepository` trait. Two backends:
// - scylla  - ScyllaDB document table, the production store
// - memory  - process-local map, used by tests and local runs
//
// Every call is single-document. Deadlines are supplied by the caller through
// `with_deadline`, which turns an elapsed timer into `RepositoryError::Timeout`.
//
// ============================================================================

mod memory;
mod scylla_store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::order::{NewOrder, Order, OrderStatus};

pub use self::memory::InMemoryOrderRepository;
pub use self::scylla_store::ScyllaOrderRepository;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("{operation} failed: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("stored order {order_id} is corrupt: {reason}")]
    Corrupt { order_id: String, reason: String },
}

impl RepositoryError {
    pub fn backend(operation: &'static str, source: impl Into<anyhow::Error>) -> Self {
        RepositoryError::Backend {
            operation,
            source: source.into(),
        }
    }
}

/// Result of a compare-and-swap status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// No document matched the id (matched count of zero).
    NotFound,
    /// A document matched but its version had moved on.
    Conflict { current_version: i64 },
}

/// Column values written by a status transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
    pub expected_version: i64,
    pub new_version: i64,
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist a new order and return it with its storage id.
    async fn insert(&self, order: NewOrder) -> Result<Order, RepositoryError>;

    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<Order>, RepositoryError>;

    /// All orders of one owner. No ordering is guaranteed.
    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<Order>, RepositoryError>;

    async fn update_status(
        &self,
        order_id: Uuid,
        update: StatusUpdate,
    ) -> Result<UpdateOutcome, RepositoryError>;

    /// Round-trip to the store to prove connectivity.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Bound a repository call by `timeout`. Dropping the inner future cancels it.
pub async fn with_deadline<T, F>(
    operation: &'static str,
    timeout: Duration,
    call: F,
) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(RepositoryError::Timeout { operation, timeout }),
    }
}

/// Per-call deadlines handed to the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryTimeouts {
    pub health: Duration,
    pub point: Duration,
    pub scan: Duration,
}

impl Default for RepositoryTimeouts {
    fn default() -> Self {
        Self {
            health: Duration::from_secs(2),
            point: Duration::from_secs(5),
            scan: Duration::from_secs(10),
        }
    }
}
