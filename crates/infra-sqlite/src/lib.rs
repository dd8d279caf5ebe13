// Tenantq Infrastructure - SQLite Adapter
// Implements: QueueRepository, QueueLock

mod connection;
pub mod escape;
mod migration;
mod queue_lock;
mod queue_repository;

pub use connection::create_pool;
pub use migration::run_migrations;
pub use queue_lock::SqliteQueueLock;
pub use queue_repository::{
    SqliteQueueRepository, DEFAULT_DELAY, DEFAULT_MAX_SIZE, DEFAULT_VISIBILITY_TIMEOUT,
    UNLIMITED_MAX_SIZE,
};

// Note: sqlx::Error conversion is handled by wrapping in helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
