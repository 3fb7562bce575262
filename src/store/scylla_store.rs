use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::value::{CqlValue, Row};
use std::sync::Arc;
use uuid::Uuid;

use super::{OrderRepository, RepositoryError, StatusUpdate, UpdateOutcome};
use crate::domain::order::{NewOrder, Order, OrderItem};

// ============================================================================
// ScyllaDB Order Repository
// ============================================================================
//
// One row per order in `orders`, partitioned by order_id. Items are kept as a
// JSON document in a text column. A secondary index on owner_id serves the
// per-owner scan.
//
// Writes that must not clobber each other use lightweight transactions:
// - insert          INSERT ... IF NOT EXISTS
// - update_status   UPDATE ... IF version = ?
//
// ============================================================================

const SELECT_COLUMNS: &str =
    "id, order_id, owner_id, items, total_amount, status, version, created_at, updated_at";

type OrderRow = (
    Uuid,
    Uuid,
    String,
    String,
    f64,
    String,
    i64,
    DateTime<Utc>,
    DateTime<Utc>,
);

pub struct ScyllaOrderRepository {
    session: Arc<Session>,
}

impl ScyllaOrderRepository {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Open a session against `nodes` and make sure the schema exists.
    pub async fn connect(nodes: &[String], keyspace: &str) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !keyspace.is_empty()
                && keyspace.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
            "invalid keyspace name: {:?}",
            keyspace
        );

        tracing::info!(nodes = ?nodes, keyspace = %keyspace, "Connecting to ScyllaDB");

        let session: Session = SessionBuilder::new().known_nodes(nodes).build().await?;

        session
            .query_unpaged(
                format!(
                    "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                     {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                    keyspace
                ),
                &[],
            )
            .await?;

        session.use_keyspace(keyspace, false).await?;

        session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS orders (
                    order_id uuid PRIMARY KEY,
                    id uuid,
                    owner_id text,
                    items text,
                    total_amount double,
                    status text,
                    version bigint,
                    created_at timestamp,
                    updated_at timestamp
                )",
                &[],
            )
            .await?;

        session
            .query_unpaged(
                "CREATE INDEX IF NOT EXISTS orders_owner_idx ON orders (owner_id)",
                &[],
            )
            .await?;

        tracing::info!(keyspace = %keyspace, "ScyllaDB schema ready");

        Ok(Self::new(Arc::new(session)))
    }
}

fn decode_order(row: OrderRow) -> Result<Order, RepositoryError> {
    let (
        id,
        order_id,
        owner_id,
        items_json,
        total_amount,
        status,
        version,
        created_at,
        updated_at,
    ) = row;

    let corrupt = |reason: String| RepositoryError::Corrupt {
        order_id: order_id.to_string(),
        reason,
    };

    let items: Vec<OrderItem> =
        serde_json::from_str(&items_json).map_err(|e| corrupt(format!("items: {}", e)))?;
    let status = status.parse().map_err(|_| corrupt(format!("status {:?}", status)))?;

    Ok(Order {
        id,
        order_id,
        owner_id,
        items,
        total_amount,
        status,
        version,
        created_at,
        updated_at,
    })
}

/// Read the `[applied]` flag and, when present, the `version` column that an
/// unapplied conditional write echoes back.
fn lwt_outcome(row: Option<Row>) -> (bool, Option<i64>) {
    let Some(row) = row else {
        return (false, None);
    };

    let applied = matches!(row.columns.first(), Some(Some(CqlValue::Boolean(true))));
    let version = row.columns.iter().skip(1).find_map(|column| match column {
        Some(CqlValue::BigInt(v)) => Some(*v),
        _ => None,
    });

    (applied, version)
}

#[async_trait]
impl OrderRepository for ScyllaOrderRepository {
    async fn insert(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        const OP: &str = "insert";

        let persisted = order.with_storage_id(Uuid::now_v7());
        let items_json =
            serde_json::to_string(&persisted.items).map_err(|e| RepositoryError::backend(OP, e))?;

        let result = self
            .session
            .query_unpaged(
                "INSERT INTO orders (order_id, id, owner_id, items, total_amount, status,
                                     version, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) IF NOT EXISTS",
                (
                    persisted.order_id,
                    persisted.id,
                    persisted.owner_id.as_str(),
                    items_json,
                    persisted.total_amount,
                    persisted.status.as_str(),
                    persisted.version,
                    persisted.created_at,
                    persisted.updated_at,
                ),
            )
            .await
            .map_err(|e| RepositoryError::backend(OP, e))?;

        let row = result
            .into_rows_result()
            .map_err(|e| RepositoryError::backend(OP, e))?
            .maybe_first_row::<Row>()
            .map_err(|e| RepositoryError::backend(OP, e))?;

        let (applied, _) = lwt_outcome(row);
        if !applied {
            return Err(RepositoryError::backend(
                OP,
                anyhow::anyhow!("order id {} already exists", persisted.order_id),
            ));
        }

        tracing::debug!(
            order_id = %persisted.order_id,
            storage_id = %persisted.id,
            "Inserted order row"
        );

        Ok(persisted)
    }

    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<Order>, RepositoryError> {
        const OP: &str = "find_by_id";

        let result = self
            .session
            .query_unpaged(
                format!("SELECT {} FROM orders WHERE order_id = ?", SELECT_COLUMNS),
                (order_id,),
            )
            .await
            .map_err(|e| RepositoryError::backend(OP, e))?;

        let rows_result = result
            .into_rows_result()
            .map_err(|e| RepositoryError::backend(OP, e))?;

        match rows_result
            .maybe_first_row::<OrderRow>()
            .map_err(|e| RepositoryError::backend(OP, e))?
        {
            Some(row) => decode_order(row).map(Some),
            None => Ok(None),
        }
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<Order>, RepositoryError> {
        const OP: &str = "find_by_owner";

        let rows: Vec<OrderRow> = self
            .session
            .query_iter(
                format!("SELECT {} FROM orders WHERE owner_id = ?", SELECT_COLUMNS),
                (owner_id,),
            )
            .await
            .map_err(|e| RepositoryError::backend(OP, e))?
            .rows_stream::<OrderRow>()
            .map_err(|e| RepositoryError::backend(OP, e))?
            .try_collect()
            .await
            .map_err(|e| RepositoryError::backend(OP, e))?;

        tracing::debug!(owner_id = %owner_id, count = rows.len(), "Loaded orders for owner");

        rows.into_iter().map(decode_order).collect()
    }

    async fn update_status(
        &self,
        order_id: Uuid,
        update: StatusUpdate,
    ) -> Result<UpdateOutcome, RepositoryError> {
        const OP: &str = "update_status";

        let result = self
            .session
            .query_unpaged(
                "UPDATE orders SET status = ?, updated_at = ?, version = ?
                 WHERE order_id = ? IF version = ?",
                (
                    update.status.as_str(),
                    update.updated_at,
                    update.new_version,
                    order_id,
                    update.expected_version,
                ),
            )
            .await
            .map_err(|e| RepositoryError::backend(OP, e))?;

        let row = result
            .into_rows_result()
            .map_err(|e| RepositoryError::backend(OP, e))?
            .maybe_first_row::<Row>()
            .map_err(|e| RepositoryError::backend(OP, e))?;

        Ok(match lwt_outcome(row) {
            (true, _) => UpdateOutcome::Applied,
            (false, Some(current_version)) => UpdateOutcome::Conflict { current_version },
            (false, None) => UpdateOutcome::NotFound,
        })
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.session
            .query_unpaged("SELECT now() FROM system.local", &[])
            .await
            .map_err(|e| RepositoryError::backend("ping", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;

    fn row(items: &str, status: &str) -> OrderRow {
        let now = Utc::now();
        (
            Uuid::now_v7(),
            Uuid::new_v4(),
            "alice".to_string(),
            items.to_string(),
            10.0,
            status.to_string(),
            3,
            now,
            now,
        )
    }

    #[test]
    fn test_decode_order() {
        let order = decode_order(row(
            r#"[{"product_id":"p-1","name":"Pen","price":2.5,"quantity":4}]"#,
            "shipped",
        ))
        .unwrap();

        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].unit_price, 2.5);
        assert_eq!(order.version, 3);
    }

    #[test]
    fn test_decode_rejects_unknown_status() {
        let err = decode_order(row("[]", "lost")).unwrap_err();
        assert!(matches!(err, RepositoryError::Corrupt { .. }));
    }

    #[test]
    fn test_decode_rejects_bad_items_document() {
        let err = decode_order(row("not json", "pending")).unwrap_err();
        assert!(matches!(err, RepositoryError::Corrupt { .. }));
    }

    #[test]
    fn test_lwt_outcome() {
        let applied = Row {
            columns: vec![Some(CqlValue::Boolean(true))],
        };
        assert_eq!(lwt_outcome(Some(applied)), (true, None));

        let stale = Row {
            columns: vec![Some(CqlValue::Boolean(false)), Some(CqlValue::BigInt(4))],
        };
        assert_eq!(lwt_outcome(Some(stale)), (false, Some(4)));

        let missing = Row {
            columns: vec![Some(CqlValue::Boolean(false)), None],
        };
        assert_eq!(lwt_outcome(Some(missing)), (false, None));
        assert_eq!(lwt_outcome(None), (false, None));
    }
}
