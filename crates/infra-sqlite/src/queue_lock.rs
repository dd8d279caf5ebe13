// SQLite QueueLock Implementation
// Lease rows in the `locks` table; an expired lease can be taken over

use crate::escape::escape_str;
use crate::queue_repository::map_sqlx_error;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tenantq_core::error::Result;
use tenantq_core::port::{QueueLock, TimeProvider};
use tracing::debug;

pub struct SqliteQueueLock {
    pool: SqlitePool,
    owner: String,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteQueueLock {
    pub fn new(
        pool: SqlitePool,
        owner: impl Into<String>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            pool,
            owner: owner.into(),
            time_provider,
        }
    }

    /// Owner name for this host: `owned-by-<hostname>`
    pub fn host_owner(hostname: &str) -> String {
        format!("owned-by-{hostname}")
    }
}

#[async_trait]
impl QueueLock for SqliteQueueLock {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = self.time_provider.now_millis();
        let expires_at = now + ttl.as_millis() as i64;

        // Insert, or take over an expired lease, or refresh our own
        let result = sqlx::query(
            r#"
            INSERT INTO locks (key, owner, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE
                SET owner = excluded.owner, expires_at = excluded.expires_at
                WHERE locks.expires_at <= ? OR locks.owner = excluded.owner
            "#,
        )
        .bind(escape_str(key))
        .bind(&self.owner)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let acquired = result.rows_affected() == 1;
        debug!(key, owner = %self.owner, acquired, "Lock acquire attempt");
        Ok(acquired)
    }

    async fn release(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM locks WHERE key = ? AND owner = ?")
            .bind(escape_str(key))
            .bind(&self.owner)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use tenantq_core::port::time_provider::mocks::MockTimeProvider;

    const TTL: Duration = Duration::from_secs(30);
    const KEY: &str = "orid:1:orid:::1000:qs:orders-lock";

    async fn setup() -> (SqlitePool, Arc<MockTimeProvider>) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        (pool, Arc::new(MockTimeProvider::new(1_000)))
    }

    #[tokio::test]
    async fn test_lease_is_exclusive() {
        let (pool, clock) = setup().await;
        let a = SqliteQueueLock::new(pool.clone(), "owned-by-a", clock.clone());
        let b = SqliteQueueLock::new(pool, "owned-by-b", clock);

        assert!(a.try_acquire(KEY, TTL).await.unwrap());
        assert!(!b.try_acquire(KEY, TTL).await.unwrap());
        // Re-acquiring our own lease refreshes it
        assert!(a.try_acquire(KEY, TTL).await.unwrap());

        a.release(KEY).await.unwrap();
        assert!(b.try_acquire(KEY, TTL).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_lease_is_taken_over() {
        let (pool, clock) = setup().await;
        let a = SqliteQueueLock::new(pool.clone(), "owned-by-a", clock.clone());
        let b = SqliteQueueLock::new(pool, "owned-by-b", clock.clone());

        assert!(a.try_acquire(KEY, TTL).await.unwrap());
        clock.advance_millis(29_999);
        assert!(!b.try_acquire(KEY, TTL).await.unwrap());
        clock.advance_millis(1);
        assert!(b.try_acquire(KEY, TTL).await.unwrap());
    }

    #[tokio::test]
    async fn test_foreign_release_is_noop() {
        let (pool, clock) = setup().await;
        let a = SqliteQueueLock::new(pool.clone(), "owned-by-a", clock.clone());
        let b = SqliteQueueLock::new(pool.clone(), "owned-by-b", clock);

        assert!(a.try_acquire(KEY, TTL).await.unwrap());
        b.release(KEY).await.unwrap();
        assert!(!b.try_acquire(KEY, TTL).await.unwrap());

        let stored: String = sqlx::query_scalar("SELECT key FROM locks")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(stored, "orid_1_orid___1000_qs_orders-lock");
    }

    #[test]
    fn test_host_owner() {
        assert_eq!(SqliteQueueLock::host_owner("worker-1"), "owned-by-worker-1");
    }
}
