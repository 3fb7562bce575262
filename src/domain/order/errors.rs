use uuid::Uuid;

use super::value_objects::OrderStatus;
use crate::store::RepositoryError;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("{0}")]
    Validation(String),

    #[error("Subject {subject} may not access orders of {owner}")]
    Forbidden { subject: String, owner: String },

    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error(
        "Order {order_id} was modified concurrently (expected version {expected}, found {actual})"
    )]
    Conflict {
        order_id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error("Repository unavailable during {operation}: {source}")]
    RepositoryUnavailable {
        operation: &'static str,
        #[source]
        source: RepositoryError,
    },
}

impl OrderError {
    /// Stable label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "validation",
            OrderError::Forbidden { .. } => "forbidden",
            OrderError::NotFound(_) => "not_found",
            OrderError::InvalidTransition { .. } => "invalid_transition",
            OrderError::Conflict { .. } => "conflict",
            OrderError::RepositoryUnavailable { .. } => "repository_unavailable",
        }
    }
}
