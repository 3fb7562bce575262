use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::OrderError;

// ============================================================================
// Order Value Objects
// ============================================================================

/// A single line of an order. Names and prices come from the caller; they are
/// not checked against a product catalog.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    #[serde(rename = "price", alias = "unit_price")]
    pub unit_price: f64,
    pub quantity: i64,
}

impl OrderItem {
    pub fn line_total(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }
}

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Outgoing edges of the fulfillment state machine.
    pub fn successors(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Confirmed, OrderStatus::Cancelled],
            OrderStatus::Confirmed => &[OrderStatus::Shipped, OrderStatus::Cancelled],
            OrderStatus::Shipped => &[OrderStatus::Delivered],
            OrderStatus::Delivered | OrderStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.successors().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| OrderError::Validation("Invalid status".to_string()))
    }
}

/// How strictly status changes are checked against the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TransitionPolicy {
    /// Only edges returned by [`OrderStatus::successors`] are accepted.
    #[default]
    Strict,
    /// Any enumerated status is accepted, whatever the current one is.
    Permissive,
}

impl TransitionPolicy {
    pub fn permits(&self, from: OrderStatus, to: OrderStatus) -> bool {
        match self {
            TransitionPolicy::Strict => from.can_transition_to(to),
            TransitionPolicy::Permissive => true,
        }
    }
}

/// Who may fetch a single order by its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReadPolicy {
    /// Any authenticated subject that knows the order id.
    #[default]
    Open,
    /// Only the subject that created the order.
    Owner,
}

// ============================================================================
// Unit Tests
// ============================================================================
