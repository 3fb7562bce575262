use std::sync::Arc;
use uuid::Uuid;

use crate::store::{
    with_deadline, OrderRepository, RepositoryError, RepositoryTimeouts, StatusUpdate,
    UpdateOutcome,
};

use super::aggregate::{NewOrder, Order, StatusChange};
use super::commands::{ChangeStatus, CreateOrder};
use super::errors::OrderError;
use super::value_objects::{OrderStatus, ReadPolicy, TransitionPolicy};

// ============================================================================
// Order Command Handler - Lifecycle and authorization engine
// ============================================================================
//
// Orchestrates: Identity → Business rules → Repository
//
// Validation and authorization run before any repository call. Repository
// failures are logged here with operation and identifier, then returned as
// `OrderError::RepositoryUnavailable`.
//
// ============================================================================

pub struct OrderCommandHandler {
    repository: Arc<dyn OrderRepository>,
    timeouts: RepositoryTimeouts,
    read_policy: ReadPolicy,
    transition_policy: TransitionPolicy,
}

impl OrderCommandHandler {
    pub fn new(repository: Arc<dyn OrderRepository>) -> Self {
        Self {
            repository,
            timeouts: RepositoryTimeouts::default(),
            read_policy: ReadPolicy::default(),
            transition_policy: TransitionPolicy::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: RepositoryTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_read_policy(mut self, policy: ReadPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    pub fn with_transition_policy(mut self, policy: TransitionPolicy) -> Self {
        self.transition_policy = policy;
        self
    }

    /// Validate, price and persist a new order.
    pub async fn create(&self, command: CreateOrder) -> Result<Order, OrderError> {
        let draft = NewOrder::create(command.owner_id, command.items)?;
        let order_id = draft.order_id;

        let order = with_deadline("insert", self.timeouts.point, self.repository.insert(draft))
            .await
            .map_err(|e| unavailable("create order", &order_id, e))?;

        tracing::info!(
            order_id = %order.order_id,
            user_id = %order.owner_id,
            total_amount = order.total_amount,
            item_count = order.items.len(),
            "Order created successfully"
        );

        Ok(order)
    }

    /// Fetch one order. Under `ReadPolicy::Open` any authenticated subject
    /// may read it.
    pub async fn get(&self, subject: &str, order_id: Uuid) -> Result<Order, OrderError> {
        let lookup = self.repository.find_by_id(order_id);
        let order = with_deadline("find_by_id", self.timeouts.point, lookup)
            .await
            .map_err(|e| unavailable("get order", &order_id, e))?
            .ok_or(OrderError::NotFound(order_id))?;

        if self.read_policy == ReadPolicy::Owner && !order.is_owned_by(subject) {
            tracing::warn!(
                order_id = %order_id,
                subject = %subject,
                "Rejected read of another subject's order"
            );
            return Err(OrderError::Forbidden {
                subject: subject.to_string(),
                owner: order.owner_id,
            });
        }

        Ok(order)
    }

    /// All orders of `owner_id`, only for that same subject.
    pub async fn list_for_owner(
        &self,
        subject: &str,
        owner_id: &str,
    ) -> Result<Vec<Order>, OrderError> {
        if subject != owner_id {
            tracing::warn!(
                subject = %subject,
                owner_id = %owner_id,
                "Rejected listing of another subject's orders"
            );
            return Err(OrderError::Forbidden {
                subject: subject.to_string(),
                owner: owner_id.to_string(),
            });
        }

        let scan = self.repository.find_by_owner(owner_id);
        with_deadline("find_by_owner", self.timeouts.scan, scan)
            .await
            .map_err(|e| unavailable("get orders", &owner_id, e))
    }

    /// Move an order to a new status with a compare-and-swap on its version.
    pub async fn change_status(&self, command: ChangeStatus) -> Result<StatusChange, OrderError> {
        let ChangeStatus {
            order_id,
            status,
            expected_version,
        } = command;

        let target: OrderStatus = status.parse()?;

        let lookup = self.repository.find_by_id(order_id);
        let order = with_deadline("find_by_id", self.timeouts.point, lookup)
            .await
            .map_err(|e| unavailable("update order", &order_id, e))?
            .ok_or(OrderError::NotFound(order_id))?;

        if let Some(expected) = expected_version {
            if expected != order.version {
                return Err(OrderError::Conflict {
                    order_id,
                    expected,
                    actual: order.version,
                });
            }
        }

        let change = order.plan_transition(target, self.transition_policy)?;

        let update = StatusUpdate {
            status: change.to,
            updated_at: change.updated_at,
            expected_version: change.expected_version,
            new_version: change.new_version,
        };

        let outcome = with_deadline(
            "update_status",
            self.timeouts.point,
            self.repository.update_status(order_id, update),
        )
        .await
        .map_err(|e| unavailable("update order", &order_id, e))?;

        match outcome {
            UpdateOutcome::Applied => {
                tracing::info!(
                    order_id = %change.order_id,
                    old_status = %change.from,
                    new_status = %change.to,
                    version = change.new_version,
                    terminal = change.to.is_terminal(),
                    "Order status updated successfully"
                );
                Ok(change)
            }
            UpdateOutcome::NotFound => Err(OrderError::NotFound(order_id)),
            UpdateOutcome::Conflict { current_version } => {
                tracing::warn!(
                    order_id = %order_id,
                    expected = change.expected_version,
                    actual = current_version,
                    "Concurrent status update detected"
                );
                Err(OrderError::Conflict {
                    order_id,
                    expected: change.expected_version,
                    actual: current_version,
                })
            }
        }
    }

    /// Connectivity probe used by the health endpoint.
    pub async fn check_store(&self) -> Result<(), RepositoryError> {
        with_deadline("ping", self.timeouts.health, self.repository.ping()).await
    }
}

fn unavailable(
    operation: &'static str,
    identifier: &dyn std::fmt::Display,
    error: RepositoryError,
) -> OrderError {
    tracing::error!(
        operation = operation,
        identifier = %identifier,
        error = %error,
        "Repository call failed"
    );
    OrderError::RepositoryUnavailable {
        operation,
        source: error,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderItem;
    use crate::store::InMemoryOrderRepository;
    use async_trait::async_trait;
    use std::time::Duration;

    fn items(price: f64, quantity: i64) -> Vec<OrderItem> {
        vec![OrderItem {
            product_id: "prod-1".to_string(),
            name: "Laptop".to_string(),
            unit_price: price,
            quantity,
        }]
    }

    fn handler() -> (OrderCommandHandler, Arc<InMemoryOrderRepository>) {
        let repo = Arc::new(InMemoryOrderRepository::new());
        (OrderCommandHandler::new(repo.clone()), repo)
    }

    fn change(order_id: Uuid, status: &str) -> ChangeStatus {
        ChangeStatus {
            order_id,
            status: status.to_string(),
            expected_version: None,
        }
    }

    async fn place(handler: &OrderCommandHandler, owner: &str) -> Order {
        handler
            .create(CreateOrder {
                owner_id: owner.to_string(),
                items: items(999.99, 1),
            })
            .await
            .unwrap()
    }

    /// Repository whose calls never finish and whose writes must never happen.
    struct StalledRepository;

    #[async_trait]
    impl OrderRepository for StalledRepository {
        async fn insert(&self, _order: NewOrder) -> Result<Order, RepositoryError> {
            std::future::pending().await
        }
        async fn find_by_id(&self, _order_id: Uuid) -> Result<Option<Order>, RepositoryError> {
            std::future::pending().await
        }
        async fn find_by_owner(&self, _owner_id: &str) -> Result<Vec<Order>, RepositoryError> {
            panic!("owner scan must not run for a forbidden request")
        }
        async fn update_status(
            &self,
            _order_id: Uuid,
            _update: StatusUpdate,
        ) -> Result<UpdateOutcome, RepositoryError> {
            panic!("status write must not run for an invalid status")
        }
        async fn ping(&self) -> Result<(), RepositoryError> {
            std::future::pending().await
        }
    }

    fn stalled() -> OrderCommandHandler {
        OrderCommandHandler::new(Arc::new(StalledRepository)).with_timeouts(RepositoryTimeouts {
            health: Duration::from_millis(20),
            point: Duration::from_millis(20),
            scan: Duration::from_millis(20),
        })
    }

    #[tokio::test]
    async fn test_create_persists_pending_order() {
        let (handler, repo) = handler();
        let order = place(&handler, "alice").await;

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, 999.99);
        assert_eq!(order.owner_id, "alice");
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_create_validation_skips_repository() {
        let (handler, repo) = handler();

        let err = handler
            .create(CreateOrder {
                owner_id: "alice".to_string(),
                items: items(10.0, 0),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::Validation(_)));
        assert_eq!(repo.len().await, 0);
    }

    #[tokio::test]
    async fn test_created_order_ids_are_unique() {
        let (handler, _) = handler();
        let mut seen = std::collections::HashSet::new();

        for _ in 0..50 {
            assert!(seen.insert(place(&handler, "alice").await.order_id));
        }
    }

    #[tokio::test]
    async fn test_get_is_open_to_other_subjects_by_default() {
        let (handler, _) = handler();
        let order = place(&handler, "alice").await;

        let fetched = handler.get("mallory", order.order_id).await.unwrap();
        assert_eq!(fetched.order_id, order.order_id);
    }

    #[tokio::test]
    async fn test_get_owner_policy_forbids_other_subjects() {
        let (handler, _) = handler();
        let handler = handler.with_read_policy(ReadPolicy::Owner);
        let order = place(&handler, "alice").await;

        assert!(handler.get("alice", order.order_id).await.is_ok());
        assert!(matches!(
            handler.get("mallory", order.order_id).await,
            Err(OrderError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_unknown_order() {
        let (handler, _) = handler();
        let id = Uuid::new_v4();
        assert!(matches!(
            handler.get("alice", id).await,
            Err(OrderError::NotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_list_returns_only_owner_orders() {
        let (handler, _) = handler();
        place(&handler, "alice").await;
        place(&handler, "alice").await;
        place(&handler, "bob").await;

        let orders = handler.list_for_owner("alice", "alice").await.unwrap();
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|o| o.owner_id == "alice"));
    }

    #[tokio::test]
    async fn test_list_for_other_subject_is_forbidden_before_io() {
        let handler = stalled();

        // The stalled repository panics on scan, so this proves no I/O happened.
        let err = handler.list_for_owner("mallory", "alice").await.unwrap_err();
        assert!(matches!(err, OrderError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_list_forbidden_even_when_caller_has_no_orders() {
        let (handler, _) = handler();
        place(&handler, "alice").await;

        assert!(matches!(
            handler.list_for_owner("bob", "alice").await,
            Err(OrderError::Forbidden { .. })
        ));
        assert!(handler.list_for_owner("bob", "bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_change_status_follows_state_machine() {
        let (handler, repo) = handler();
        let order = place(&handler, "alice").await;

        for next in ["confirmed", "shipped", "delivered"] {
            handler.change_status(change(order.order_id, next)).await.unwrap();
        }

        let stored = repo.find_by_id(order.order_id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Delivered);
        assert_eq!(stored.version, 4);
        assert!(stored.updated_at > order.updated_at);
        assert_eq!(stored.total_amount, order.total_amount);
    }

    #[tokio::test]
    async fn test_change_status_rejects_unreachable_edge() {
        let (handler, repo) = handler();
        let order = place(&handler, "alice").await;

        let err = handler
            .change_status(change(order.order_id, "delivered"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));

        let stored = repo.find_by_id(order.order_id).await.unwrap().unwrap();
        assert_eq!(stored, order);
    }

    #[tokio::test]
    async fn test_permissive_policy_allows_any_enumerated_status() {
        let (handler, _) = handler();
        let handler = handler.with_transition_policy(TransitionPolicy::Permissive);
        let order = place(&handler, "alice").await;

        handler.change_status(change(order.order_id, "delivered")).await.unwrap();
        let back = handler.change_status(change(order.order_id, "pending")).await.unwrap();
        assert_eq!(back.from, OrderStatus::Delivered);
        assert_eq!(back.to, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_invalid_status_leaves_order_unmodified() {
        let (handler, repo) = handler();
        let order = place(&handler, "alice").await;

        for bogus in ["refunded", "CONFIRMED", "", "pending "] {
            let err = handler.change_status(change(order.order_id, bogus)).await.unwrap_err();
            assert!(matches!(err, OrderError::Validation(_)));
        }

        assert_eq!(repo.find_by_id(order.order_id).await.unwrap().unwrap(), order);
    }

    #[tokio::test]
    async fn test_invalid_status_checked_before_io() {
        let handler = stalled();
        let err = handler
            .change_status(change(Uuid::new_v4(), "teleported"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_change_status_unknown_order() {
        let (handler, _) = handler();
        let err = handler
            .change_status(change(Uuid::new_v4(), "confirmed"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stale_expected_version_conflicts() {
        let (handler, _) = handler();
        let order = place(&handler, "alice").await;

        let err = handler
            .change_status(ChangeStatus {
                order_id: order.order_id,
                status: "confirmed".to_string(),
                expected_version: Some(7),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::Conflict { expected: 7, actual: 1, .. }));
    }

    #[tokio::test]
    async fn test_concurrent_transitions_do_not_overwrite_silently() {
        let (handler, repo) = handler();
        let handler = Arc::new(handler);
        let order = place(&handler, "alice").await;

        let tasks: Vec<_> = ["confirmed", "cancelled", "confirmed", "cancelled"]
            .into_iter()
            .map(|status| {
                let handler = handler.clone();
                let cmd = change(order.order_id, status);
                tokio::spawn(async move { handler.change_status(cmd).await })
            })
            .collect();

        let mut applied = Vec::new();
        for task in futures_util::future::join_all(tasks).await {
            match task.unwrap() {
                Ok(change) => applied.push(change),
                Err(OrderError::Conflict { .. }) | Err(OrderError::InvalidTransition { .. }) => {}
                Err(other) => panic!("unexpected error: {}", other),
            }
        }

        // Every applied change bumped the version by one, so nothing was lost.
        let stored = repo.find_by_id(order.order_id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1 + applied.len() as i64);
        assert!(!applied.is_empty());
    }

    #[tokio::test]
    async fn test_repository_timeout_surfaces_as_unavailable() {
        let handler = stalled();

        let err = handler
            .create(CreateOrder {
                owner_id: "alice".to_string(),
                items: items(1.0, 1),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::RepositoryUnavailable {
                operation: "create order",
                source: RepositoryError::Timeout { .. }
            }
        ));

        assert!(matches!(
            handler.get("alice", Uuid::new_v4()).await,
            Err(OrderError::RepositoryUnavailable { .. })
        ));
        assert!(handler.check_store().await.is_err());
    }
}
