// Central Error Type for the Application

use crate::domain::Orid;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Queue already exists: {0}")]
    QueueExists(Orid),

    #[error("Queue does not exist: {0}")]
    QueueNotFound(String),

    #[error("Queue update condition failed: {0}")]
    QueueUpdateCondition(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx::Error conversion is handled in infra-sqlite crate
// by converting to AppError::Storage(String)
