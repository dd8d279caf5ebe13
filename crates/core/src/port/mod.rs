// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod queue_lock;
pub mod queue_repository;
pub mod resource_invoker;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use queue_lock::QueueLock;
pub use queue_repository::QueueRepository;
pub use resource_invoker::{InvocationError, ResourceInvoker};
pub use time_provider::TimeProvider;
