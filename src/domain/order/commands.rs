use uuid::Uuid;

use super::value_objects::OrderItem;

// ============================================================================
// Order Commands - Represent caller intent
// ============================================================================

/// Place a new order on behalf of the authenticated subject.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub owner_id: String,
    pub items: Vec<OrderItem>,
}

/// Move an order to another lifecycle status.
///
/// `status` stays a raw string until the handler validates it, so unknown
/// values surface as validation failures instead of decode failures.
#[derive(Debug, Clone)]
pub struct ChangeStatus {
    pub order_id: Uuid,
    pub status: String,
    pub expected_version: Option<i64>,
}
