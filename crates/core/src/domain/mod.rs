// Domain Layer - Pure business logic and entities

pub mod error;
pub mod health;
pub mod message;
pub mod orid;
pub mod queue;
pub mod resource;

// Re-exports
pub use error::DomainError;
pub use health::{HealthReport, HealthStatus};
pub use message::{Message, MessageId};
pub use orid::Orid;
pub use queue::{
    CreateQueueSpec, Patch, QueueBinding, QueueDetails, QueueLength, QueueMeta, QUEUE_SERVICE,
};
pub use resource::{ResourceKind, FUNCTION_SERVICE, STATE_MACHINE_SERVICE};
