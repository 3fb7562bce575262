use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;
use super::value_objects::{OrderItem, OrderStatus, TransitionPolicy};

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================

/// An order that has been validated but not yet given a storage id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub order_id: Uuid,
    pub owner_id: String,
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewOrder {
    /// Validate the items and derive everything else. The total is computed
    /// here once and never again.
    pub fn create(owner_id: impl Into<String>, items: Vec<OrderItem>) -> Result<Self, OrderError> {
        let owner_id = owner_id.into();
        if owner_id.is_empty() {
            return Err(OrderError::Validation("Owner identity is required".to_string()));
        }

        validate_items(&items)?;

        let total_amount = calculate_total(&items);
        if !total_amount.is_finite() {
            return Err(OrderError::Validation("Order total is out of range".to_string()));
        }

        // Store timestamps at millisecond precision, matching what the
        // document store keeps.
        let now = Utc::now().trunc_subsecs(3);

        Ok(Self {
            order_id: Uuid::new_v4(),
            owner_id,
            total_amount,
            items,
            status: OrderStatus::Pending,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_storage_id(self, id: Uuid) -> Order {
        Order {
            id,
            order_id: self.order_id,
            owner_id: self.owner_id,
            items: self.items,
            total_amount: self.total_amount,
            status: self.status,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_id: Uuid,
    #[serde(rename = "user_id")]
    pub owner_id: String,
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A status change that passed the business rules and is ready to be written
/// with a compare-and-swap on `expected_version`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub order_id: Uuid,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub expected_version: i64,
    pub new_version: i64,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_owned_by(&self, subject: &str) -> bool {
        self.owner_id == subject
    }

    pub fn plan_transition(
        &self,
        target: OrderStatus,
        policy: TransitionPolicy,
    ) -> Result<StatusChange, OrderError> {
        if !policy.permits(self.status, target) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }

        // updated_at never moves backwards, even at millisecond precision.
        let now = Utc::now().trunc_subsecs(3);
        let updated_at = now.max(self.updated_at + Duration::milliseconds(1));

        Ok(StatusChange {
            order_id: self.order_id,
            from: self.status,
            to: target,
            expected_version: self.version,
            new_version: self.version + 1,
            updated_at,
        })
    }
}

pub fn calculate_total(items: &[OrderItem]) -> f64 {
    items.iter().map(OrderItem::line_total).sum()
}

fn validate_items(items: &[OrderItem]) -> Result<(), OrderError> {
    if items.is_empty() {
        return Err(OrderError::Validation("Order items cannot be empty".to_string()));
    }

    for item in items {
        if item.quantity <= 0 {
            return Err(OrderError::Validation(format!(
                "Invalid quantity {} for product {}",
                item.quantity, item.product_id
            )));
        }
        if !item.unit_price.is_finite() || item.unit_price < 0.0 {
            return Err(OrderError::Validation(format!(
                "Invalid price {} for product {}",
                item.unit_price, item.product_id
            )));
        }
    }

    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================
