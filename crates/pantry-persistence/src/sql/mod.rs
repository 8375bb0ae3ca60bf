//! SQL-based persistence backend (MySQL/PostgreSQL via SeaORM)
//!
//! Every process in the cluster shares one `workers` table. Rows are keyed by
//! a surrogate id and carry the unique `hostname:sync_port` identity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{prelude::Expr, *};
use tracing::{debug, warn};

use crate::entity::workers;
use crate::model::Worker;
use crate::traits::MembershipPersistence;

/// Membership store backed by a SeaORM `DatabaseConnection`
#[derive(Clone)]
pub struct SqlMembershipStore {
    db: DatabaseConnection,
}

impl SqlMembershipStore {
    /// Create a new store with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Get a reference to the underlying database connection
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl MembershipPersistence for SqlMembershipStore {
    async fn worker_exists(&self, identity: &str) -> anyhow::Result<bool> {
        let count = workers::Entity::find()
            .filter(workers::Column::Worker.eq(identity))
            .count(&self.db)
            .await?;

        Ok(count > 0)
    }

    async fn worker_find_by_identity(&self, identity: &str) -> anyhow::Result<Option<Worker>> {
        let row = workers::Entity::find()
            .filter(workers::Column::Worker.eq(identity))
            .one(&self.db)
            .await?;

        Ok(row.and_then(Worker::from_row))
    }

    async fn worker_insert(&self, worker: &Worker) -> anyhow::Result<Worker> {
        let now = Utc::now();
        let entity = workers::ActiveModel {
            worker: Set(worker.identity()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let row = entity.insert(&self.db).await?;
        debug!(id = row.id, worker = %row.worker, "Inserted worker row");

        Ok(Worker {
            id: row.id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            ..worker.clone()
        })
    }

    async fn worker_update(&self, worker: &Worker) -> anyhow::Result<bool> {
        let result = workers::Entity::update_many()
            .col_expr(workers::Column::UpdatedAt, Expr::value(worker.updated_at))
            .filter(workers::Column::Id.eq(worker.id))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn worker_heartbeat(&self, identity: &str, at: DateTime<Utc>) -> anyhow::Result<bool> {
        let result = workers::Entity::update_many()
            .col_expr(workers::Column::UpdatedAt, Expr::value(at))
            .filter(workers::Column::Worker.eq(identity))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn worker_list_others(&self, exclude_identity: &str) -> anyhow::Result<Vec<Worker>> {
        let rows = workers::Entity::find()
            .filter(workers::Column::Worker.ne(exclude_identity))
            .order_by_asc(workers::Column::Id)
            .all(&self.db)
            .await?;

        let workers = rows
            .into_iter()
            .filter_map(|row| {
                let identity = row.worker.clone();
                let worker = Worker::from_row(row);
                if worker.is_none() {
                    warn!(worker = %identity, "Skipping worker row with malformed identity");
                }
                worker
            })
            .collect();

        Ok(workers)
    }

    async fn worker_delete_stale(&self, threshold: DateTime<Utc>) -> anyhow::Result<u64> {
        let result = workers::Entity::delete_many()
            .filter(workers::Column::UpdatedAt.lt(threshold))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected)
    }

    async fn ensure_schema(&self) -> anyhow::Result<()> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);
        let mut statement = schema.create_table_from_entity(workers::Entity);
        statement.if_not_exists();

        self.db.execute(backend.build(&statement)).await?;
        Ok(())
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        self.db.ping().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    async fn setup_store() -> SqlMembershipStore {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1).sqlx_logging(false);
        let db = Database::connect(options).await.unwrap();

        let store = SqlMembershipStore::new(db);
        store.ensure_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let store = setup_store().await;
        store.ensure_schema().await.unwrap();
        store.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_and_exists() {
        let store = setup_store().await;
        assert!(!store.worker_exists("host-a:9001").await.unwrap());

        let inserted = store
            .worker_insert(&Worker::new("host-a", 8080, 9001))
            .await
            .unwrap();
        assert!(inserted.id > 0);
        assert_eq!(inserted.port, 8080);
        assert!(store.worker_exists("host-a:9001").await.unwrap());

        let found = store
            .worker_find_by_identity("host-a:9001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, inserted.id);
        assert_eq!(found.hostname, "host-a");
        assert_eq!(found.sync_port, 9001);
    }

    #[tokio::test]
    async fn test_duplicate_identity_rejected() {
        let store = setup_store().await;
        let worker = Worker::new("host-a", 8080, 9001);
        store.worker_insert(&worker).await.unwrap();
        assert!(store.worker_insert(&worker).await.is_err());
    }

    #[tokio::test]
    async fn test_update_by_id() {
        let store = setup_store().await;
        let mut worker = store
            .worker_insert(&Worker::new("host-a", 8080, 9001))
            .await
            .unwrap();

        worker.updated_at = Utc::now() + Duration::minutes(1);
        assert!(store.worker_update(&worker).await.unwrap());

        let found = store
            .worker_find_by_identity("host-a:9001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, worker.id);
        assert!(found.updated_at > found.created_at);

        let missing = Worker {
            id: worker.id + 100,
            ..worker
        };
        assert!(!store.worker_update(&missing).await.unwrap());
    }

    #[tokio::test]
    async fn test_heartbeat_by_identity() {
        let store = setup_store().await;
        store
            .worker_insert(&Worker::new("host-a", 8080, 9001))
            .await
            .unwrap();

        assert!(
            store
                .worker_heartbeat("host-a:9001", Utc::now())
                .await
                .unwrap()
        );
        assert!(
            !store
                .worker_heartbeat("host-z:9001", Utc::now())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_list_others_excludes_self() {
        let store = setup_store().await;
        store
            .worker_insert(&Worker::new("host-a", 8080, 9001))
            .await
            .unwrap();
        store
            .worker_insert(&Worker::new("host-b", 8080, 9001))
            .await
            .unwrap();

        let others = store.worker_list_others("host-a:9001").await.unwrap();
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].identity(), "host-b:9001");
        assert_eq!(others[0].sync_port, 9001);
    }

    #[tokio::test]
    async fn test_list_others_skips_malformed_rows() {
        let store = setup_store().await;
        let now = Utc::now();
        workers::ActiveModel {
            worker: Set("not-an-identity".to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(store.db())
        .await
        .unwrap();
        store
            .worker_insert(&Worker::new("host-b", 8080, 9002))
            .await
            .unwrap();

        let others = store.worker_list_others("host-a:9001").await.unwrap();
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].identity(), "host-b:9002");
    }

    #[tokio::test]
    async fn test_delete_stale() {
        let store = setup_store().await;
        store
            .worker_insert(&Worker::new("old", 8080, 9001))
            .await
            .unwrap();
        store
            .worker_insert(&Worker::new("fresh", 8080, 9001))
            .await
            .unwrap();

        let now = Utc::now();
        store
            .worker_heartbeat("old:9001", now - Duration::minutes(5))
            .await
            .unwrap();

        let removed = store
            .worker_delete_stale(now - Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(!store.worker_exists("old:9001").await.unwrap());
        assert!(store.worker_exists("fresh:9001").await.unwrap());
    }
}
