// Migration Runner
// Versioned SQL scripts applied in order, each inside its own transaction

use sqlx::SqlitePool;
use tenantq_core::error::{AppError, Result};
use tracing::{debug, info};

/// (version, description, script), ascending by version
const MIGRATIONS: &[(i64, &str, &str)] = &[(
    1,
    "Queue primitives, metadata and leases",
    include_str!("../migrations/001_initial_schema.sql"),
)];

fn migration_error(err: sqlx::Error) -> AppError {
    AppError::Storage(format!("Migration failed: {err}"))
}

/// Bring the schema up to the latest version
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current = schema_version(pool).await?;
    let pending: Vec<_> = MIGRATIONS
        .iter()
        .filter(|(version, _, _)| *version > current)
        .collect();

    if pending.is_empty() {
        debug!(version = current, "Schema up to date");
        return Ok(());
    }

    for (version, description, script) in pending {
        info!(version, description, "Applying migration");
        apply_migration(pool, script).await?;
    }
    Ok(())
}

/// Highest applied version, 0 on a fresh database
async fn schema_version(pool: &SqlitePool) -> Result<i64> {
    let tracked: i64 = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version')",
    )
    .fetch_one(pool)
    .await
    .map_err(migration_error)?;

    if tracked == 0 {
        return Ok(0);
    }

    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .map_err(migration_error)?;
    Ok(version.unwrap_or(0))
}

async fn apply_migration(pool: &SqlitePool, script: &str) -> Result<()> {
    let mut tx = pool.begin().await.map_err(migration_error)?;

    for statement in statements(script) {
        sqlx::query(&statement)
            .execute(&mut *tx)
            .await
            .map_err(migration_error)?;
    }

    tx.commit().await.map_err(migration_error)?;
    Ok(())
}

/// Split a script on `;`, dropping `--` comment lines and empty statements
fn statements(script: &str) -> impl Iterator<Item = String> + '_ {
    script
        .split(';')
        .map(|chunk| {
            chunk
                .lines()
                .filter(|line| !line.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .filter(|statement| !statement.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_pool;

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        for table in ["queues", "messages", "kv", "locks"] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(count, 0, "{table} should start empty");
        }
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let version: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_statements_skip_comments() {
        let script = "-- header\nCREATE TABLE a (x INTEGER);\n\n-- note\nCREATE TABLE b (y INTEGER);\n";
        let parsed: Vec<String> = statements(script).collect();
        assert_eq!(
            parsed,
            vec!["CREATE TABLE a (x INTEGER)", "CREATE TABLE b (y INTEGER)"]
        );
    }
}
