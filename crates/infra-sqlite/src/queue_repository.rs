// SQLite QueueRepository Implementation

use crate::escape::{escape, meta_key, unescape};
use crate::{create_pool, run_migrations};
use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tenantq_core::domain::{
    CreateQueueSpec, HealthReport, HealthStatus, Message, Orid, Patch, QueueDetails, QueueMeta,
};
use tenantq_core::error::{AppError, Result};
use tenantq_core::port::{IdProvider, QueueRepository, TimeProvider};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Queue primitive defaults and limits
pub const DEFAULT_VISIBILITY_TIMEOUT: u32 = 30;
pub const DEFAULT_DELAY: u32 = 0;
pub const DEFAULT_MAX_SIZE: i64 = 65536;
pub const UNLIMITED_MAX_SIZE: i64 = -1;
const MAX_SECONDS: u32 = 9_999_999;
const MIN_MAX_SIZE: i64 = 1024;

// Helper to convert sqlx::Error to AppError with structured information
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" => AppError::Storage(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "787" | "3850" => AppError::Storage(format!(
                        "Foreign key constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "5" => AppError::Storage(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => AppError::Storage(format!("Database full: {}", db_err.message())),
                    _ => AppError::Storage(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Storage(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::Storage("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => AppError::Storage(format!("Column not found: {col}")),
        _ => AppError::Storage(err.to_string()),
    }
}

fn queue_not_found(queue: &Orid) -> AppError {
    AppError::Storage(format!("Queue not found: {queue}"))
}

fn check_seconds(name: &str, value: u32) -> Result<u32> {
    if value > MAX_SECONDS {
        return Err(AppError::Storage(format!(
            "{name} must be between 0 and {MAX_SECONDS}"
        )));
    }
    Ok(value)
}

fn check_max_size(value: i64) -> Result<i64> {
    if value == UNLIMITED_MAX_SIZE || (MIN_MAX_SIZE..=DEFAULT_MAX_SIZE).contains(&value) {
        Ok(value)
    } else {
        Err(AppError::Storage(format!(
            "maxsize must be between {MIN_MAX_SIZE} and {DEFAULT_MAX_SIZE} or {UNLIMITED_MAX_SIZE}"
        )))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct QueueRow {
    visibility_timeout: i64,
    delay: i64,
    max_size: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: String,
    body: String,
    receive_count: i64,
}

impl MessageRow {
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            body: self.body,
            receive_count: u32::try_from(self.receive_count).unwrap_or(u32::MAX),
        }
    }
}

/// QueueRepository on SQLite
///
/// The pool is opened (and migrated) on first use and reused afterwards.
pub struct SqliteQueueRepository {
    database_url: String,
    pool: OnceCell<SqlitePool>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteQueueRepository {
    /// Lazily connecting repository
    pub fn new(
        database_url: impl Into<String>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            database_url: database_url.into(),
            pool: OnceCell::new(),
            id_provider,
            time_provider,
        }
    }

    /// Repository over an already migrated pool
    pub fn with_pool(
        pool: SqlitePool,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            database_url: String::new(),
            pool: OnceCell::new_with(Some(pool)),
            id_provider,
            time_provider,
        }
    }

    /// Shared pool, connecting on the first call
    pub async fn pool(&self) -> Result<&SqlitePool> {
        self.pool
            .get_or_try_init(|| async {
                info!(database_url = %self.database_url, "Connecting to storage");
                let pool = create_pool(&self.database_url).await?;
                run_migrations(&pool).await?;
                Ok::<_, AppError>(pool)
            })
            .await
    }

    /// Wait `grace` for in-flight operations, then close the pool
    pub async fn close(&self, grace: Duration) {
        tokio::time::sleep(grace).await;
        if let Some(pool) = self.pool.get() {
            pool.close().await;
            info!("Storage connection closed");
        }
    }

    async fn find_queue(&self, pool: &SqlitePool, name: &str) -> Result<Option<QueueRow>> {
        sqlx::query_as::<_, QueueRow>(
            "SELECT visibility_timeout, delay, max_size FROM queues WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn read_meta(tx: &mut Transaction<'_, Sqlite>, key: &str) -> Result<QueueMeta> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        match value {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(QueueMeta::default()),
        }
    }

    /// Upsert the metadata record while its queue primitive exists
    ///
    /// Returns false, writing nothing, when the queue is gone.
    async fn write_meta(
        tx: &mut Transaction<'_, Sqlite>,
        queue_name: &str,
        key: &str,
        meta: &QueueMeta,
    ) -> Result<bool> {
        let written = sqlx::query(
            "INSERT INTO kv (key, value)
             SELECT ?, ? WHERE EXISTS (SELECT 1 FROM queues WHERE name = ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(serde_json::to_string(meta)?)
        .bind(queue_name)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected();
        Ok(written > 0)
    }
}

#[async_trait]
impl QueueRepository for SqliteQueueRepository {
    async fn create_queue(&self, spec: &CreateQueueSpec) -> Result<()> {
        let visibility_timeout = check_seconds(
            "vt",
            spec.visibility_timeout.unwrap_or(DEFAULT_VISIBILITY_TIMEOUT),
        )?;
        let delay = check_seconds("delay", spec.delay.unwrap_or(DEFAULT_DELAY))?;
        let max_size = check_max_size(spec.max_size.unwrap_or(DEFAULT_MAX_SIZE))?;

        let pool = self.pool().await?;
        let name = escape(&spec.orid);
        let mut tx = pool.begin().await.map_err(map_sqlx_error)?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM queues WHERE name = ?")
            .bind(&name)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if exists.is_some() {
            return Err(AppError::Storage(format!("Queue exists: {}", spec.orid)));
        }

        sqlx::query(
            "INSERT INTO queues (name, visibility_timeout, delay, max_size, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&name)
        .bind(i64::from(visibility_timeout))
        .bind(i64::from(delay))
        .bind(max_size)
        .bind(self.time_provider.now_millis())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        Self::write_meta(&mut tx, &name, &meta_key(&spec.orid), &spec.meta).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        debug!(queue = %spec.orid, visibility_timeout, delay, max_size, "Queue primitive created");
        Ok(())
    }

    async fn list_queues(&self, account_id: Option<&str>) -> Result<Vec<Orid>> {
        let pool = self.pool().await?;
        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM queues ORDER BY created_at ASC, name ASC")
                .fetch_all(pool)
                .await
                .map_err(map_sqlx_error)?;

        let mut queues = Vec::with_capacity(names.len());
        for name in names {
            match Orid::parse(&unescape(&name)) {
                Ok(orid) => {
                    if account_id.map_or(true, |account| orid.account_id == account) {
                        queues.push(orid);
                    }
                }
                Err(e) => warn!(name = %name, error = %e, "Skipping queue with unreadable name"),
            }
        }
        Ok(queues)
    }

    async fn update_queue(
        &self,
        queue: &Orid,
        dlq: Patch<Orid>,
        resource: Patch<Orid>,
    ) -> Result<()> {
        let pool = self.pool().await?;
        let key = meta_key(queue);
        let mut tx = pool.begin().await.map_err(map_sqlx_error)?;
        let meta = Self::read_meta(&mut tx, &key).await?.merge(resource, dlq);
        if !Self::write_meta(&mut tx, &escape(queue), &key, &meta).await? {
            // Dropping the transaction rolls it back
            return Err(queue_not_found(queue));
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        debug!(queue = %queue, "Queue metadata updated");
        Ok(())
    }

    async fn remove_queue(&self, queue: &Orid) -> Result<()> {
        let pool = self.pool().await?;
        let name = escape(queue);
        let mut tx = pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM messages WHERE queue_name = ?")
            .bind(&name)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        let removed = sqlx::query("DELETE FROM queues WHERE name = ?")
            .bind(&name)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();
        if removed == 0 {
            // Dropping the transaction rolls it back
            return Err(queue_not_found(queue));
        }
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(meta_key(queue))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get_queue_details(&self, queue: &Orid) -> Result<QueueDetails> {
        let pool = self.pool().await?;
        let name = escape(queue);
        let row = self
            .find_queue(pool, &name)
            .await?
            .ok_or_else(|| queue_not_found(queue))?;

        let mut tx = pool.begin().await.map_err(map_sqlx_error)?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE queue_name = ?")
            .bind(&name)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        let meta = Self::read_meta(&mut tx, &meta_key(queue)).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(QueueDetails {
            orid: queue.clone(),
            meta,
            max_size: Some(row.max_size),
            delay: u32::try_from(row.delay).ok(),
            visibility_timeout: u32::try_from(row.visibility_timeout).ok(),
            current_messages: u64::try_from(count).unwrap_or(0),
        })
    }

    async fn create_message(&self, queue: &Orid, body: &str, delay: Option<u32>) -> Result<()> {
        let pool = self.pool().await?;
        let name = escape(queue);
        let row = self
            .find_queue(pool, &name)
            .await?
            .ok_or_else(|| queue_not_found(queue))?;

        if row.max_size != UNLIMITED_MAX_SIZE && body.len() as i64 > row.max_size {
            return Err(AppError::Storage(format!(
                "Message too long: {} bytes exceeds {}",
                body.len(),
                row.max_size
            )));
        }

        let delay_secs = match delay {
            Some(d) => i64::from(check_seconds("delay", d)?),
            None => row.delay,
        };
        let now = self.time_provider.now_millis();
        let id = self.id_provider.generate_id();

        sqlx::query(
            "INSERT INTO messages (id, queue_name, body, sent_at, visible_at, receive_count)
             VALUES (?, ?, ?, ?, ?, 0)",
        )
        .bind(&id)
        .bind(&name)
        .bind(body)
        .bind(now)
        .bind(now + delay_secs * 1000)
        .execute(pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(queue = %queue, message_id = %id, "Message created");
        Ok(())
    }

    async fn get_message(
        &self,
        queue: &Orid,
        visibility_timeout: Option<u32>,
    ) -> Result<Option<Message>> {
        let pool = self.pool().await?;
        let name = escape(queue);
        let row = self
            .find_queue(pool, &name)
            .await?
            .ok_or_else(|| queue_not_found(queue))?;

        let vt_secs = match visibility_timeout {
            Some(vt) => i64::from(check_seconds("vt", vt)?),
            None => row.visibility_timeout,
        };
        let now = self.time_provider.now_millis();

        // Receive and hide in one statement
        let message = sqlx::query_as::<_, MessageRow>(
            r#"
            UPDATE messages
            SET visible_at = ?, receive_count = receive_count + 1
            WHERE seq = (
                SELECT seq FROM messages
                WHERE queue_name = ? AND visible_at <= ?
                ORDER BY visible_at ASC, seq ASC
                LIMIT 1
            )
            RETURNING id, body, receive_count
            "#,
        )
        .bind(now + vt_secs * 1000)
        .bind(&name)
        .bind(now)
        .fetch_optional(pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(message.map(MessageRow::into_message))
    }

    async fn remove_message(&self, queue: &Orid, message_id: &str) -> Result<u64> {
        let pool = self.pool().await?;
        let result = sqlx::query("DELETE FROM messages WHERE queue_name = ? AND id = ?")
            .bind(escape(queue))
            .bind(message_id)
            .execute(pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn health_checks(&self, timeout: Duration) -> Result<HealthReport> {
        let storage_check = async {
            let pool = self.pool().await?;
            sqlx::query("SELECT 1")
                .execute(pool)
                .await
                .map_err(map_sqlx_error)?;
            Ok::<(), AppError>(())
        };
        let queue_check = async { self.list_queues(None).await.map(|_| ()) };

        let (storage_status, queue_status) = tokio::join!(
            timed_check("storage", timeout, storage_check),
            timed_check("queue", timeout, queue_check),
        );

        Ok(HealthReport {
            storage_status,
            queue_status,
        })
    }
}

/// Race one health check against `timeout`
async fn timed_check<F>(name: &'static str, timeout: Duration, check: F) -> HealthStatus
where
    F: Future<Output = Result<()>>,
{
    match tokio::time::timeout(timeout, check).await {
        Ok(Ok(())) => HealthStatus::Ok,
        Ok(Err(e)) => {
            warn!(check = name, error = %e, "Health check failed");
            HealthStatus::Error
        }
        Err(_) => {
            warn!(check = name, timeout_ms = timeout.as_millis() as u64, "Health check timed out");
            HealthStatus::Indeterminate
        }
    }
}
