// Application Layer - Use Cases and Business Logic

pub mod constants;
pub mod interval_invoker;
pub mod queue_service;
pub mod resource_engine;
pub mod shutdown;

// Re-exports
pub use interval_invoker::{IntervalInvoker, PeriodicTask};
pub use queue_service::{CreateQueueRequest, QueueService, UpdateQueueRequest};
pub use resource_engine::{QueueOutcome, ResourceHandlers, ResourceInvocationEngine, TickSummary};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
