use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{OrderRepository, RepositoryError, StatusUpdate, UpdateOutcome};
use crate::domain::order::{NewOrder, Order};

/// Process-local order store keyed by order id.
///
/// Each call takes the lock once, so every operation is atomic with respect
/// to the others, like a single-document write in the real store.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.write().await;

        if orders.contains_key(&order.order_id) {
            return Err(RepositoryError::backend(
                "insert",
                anyhow::anyhow!("duplicate order id {}", order.order_id),
            ));
        }

        let persisted = order.with_storage_id(Uuid::now_v7());
        orders.insert(persisted.order_id, persisted.clone());

        Ok(persisted)
    }

    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<Order>, RepositoryError> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .filter(|order| order.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        order_id: Uuid,
        update: StatusUpdate,
    ) -> Result<UpdateOutcome, RepositoryError> {
        let mut orders = self.orders.write().await;

        let Some(order) = orders.get_mut(&order_id) else {
            return Ok(UpdateOutcome::NotFound);
        };

        if order.version != update.expected_version {
            return Ok(UpdateOutcome::Conflict {
                current_version: order.version,
            });
        }

        order.status = update.status;
        order.updated_at = update.updated_at;
        order.version = update.new_version;

        Ok(UpdateOutcome::Applied)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderItem, OrderStatus};
    use chrono::Utc;

    fn new_order(owner: &str) -> NewOrder {
        NewOrder::create(
            owner,
            vec![OrderItem {
                product_id: "p-1".to_string(),
                name: "Mouse".to_string(),
                unit_price: 19.99,
                quantity: 2,
            }],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_storage_id() {
        let repo = InMemoryOrderRepository::new();
        let draft = new_order("alice");
        let order_id = draft.order_id;

        let order = repo.insert(draft).await.unwrap();

        assert_eq!(order.order_id, order_id);
        assert_ne!(order.id, order.order_id);
        assert!(!order.id.is_nil());
        assert_eq!(repo.find_by_id(order_id).await.unwrap(), Some(order));
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_order_id() {
        let repo = InMemoryOrderRepository::new();
        let draft = new_order("alice");

        repo.insert(draft.clone()).await.unwrap();
        assert!(repo.insert(draft).await.is_err());
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_find_by_owner_filters() {
        let repo = InMemoryOrderRepository::new();
        repo.insert(new_order("alice")).await.unwrap();
        repo.insert(new_order("alice")).await.unwrap();
        repo.insert(new_order("bob")).await.unwrap();

        let alice = repo.find_by_owner("alice").await.unwrap();
        assert_eq!(alice.len(), 2);
        assert!(alice.iter().all(|o| o.owner_id == "alice"));
        assert!(repo.find_by_owner("carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_status_compare_and_swap() {
        let repo = InMemoryOrderRepository::new();
        let order = repo.insert(new_order("alice")).await.unwrap();

        let update = StatusUpdate {
            status: OrderStatus::Confirmed,
            updated_at: Utc::now(),
            expected_version: 1,
            new_version: 2,
        };

        assert_eq!(
            repo.update_status(order.order_id, update).await.unwrap(),
            UpdateOutcome::Applied
        );
        // Same expected version again loses the race.
        assert_eq!(
            repo.update_status(order.order_id, update).await.unwrap(),
            UpdateOutcome::Conflict { current_version: 2 }
        );

        let stored = repo.find_by_id(order.order_id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Confirmed);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_update_status_unknown_id() {
        let repo = InMemoryOrderRepository::new();
        let update = StatusUpdate {
            status: OrderStatus::Shipped,
            updated_at: Utc::now(),
            expected_version: 1,
            new_version: 2,
        };

        assert_eq!(
            repo.update_status(Uuid::new_v4(), update).await.unwrap(),
            UpdateOutcome::NotFound
        );
    }
}
