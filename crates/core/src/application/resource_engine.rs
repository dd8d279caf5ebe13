//! Resource Invocation Engine
//!
//! One tick walks every queue in listing order and delivers at most one
//! message per bound queue to its resource. A failed invocation moves the
//! message to the queue's DLQ; the source copy is removed after exactly one
//! attempt either way.

use crate::application::interval_invoker::PeriodicTask;
use crate::domain::{Orid, QueueBinding, ResourceKind};
use crate::error::Result;
use crate::port::{QueueLock, QueueRepository, ResourceInvoker};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Invoker per supported resource kind
#[derive(Clone)]
pub struct ResourceHandlers {
    pub serverless_function: Arc<dyn ResourceInvoker>,
    pub state_machine: Arc<dyn ResourceInvoker>,
}

impl ResourceHandlers {
    fn for_kind(&self, kind: &ResourceKind) -> Option<&Arc<dyn ResourceInvoker>> {
        match kind {
            ResourceKind::ServerlessFunction => Some(&self.serverless_function),
            ResourceKind::StateMachine => Some(&self.state_machine),
            ResourceKind::Unsupported(_) => None,
        }
    }
}

/// What a tick did with one queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueOutcome {
    /// No resource/DLQ binding, or no messages
    Idle,
    /// Bound to a resource type nothing can invoke
    Unsupported,
    /// Message count was stale, nothing visible to receive
    NoVisibleMessage,
    /// Another instance holds the queue lock
    Locked,
    Delivered,
    DeadLettered,
}

/// Tally of one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub queues: usize,
    pub delivered: usize,
    pub dead_lettered: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl TickSummary {
    fn record(&mut self, outcome: &QueueOutcome) {
        match outcome {
            QueueOutcome::Delivered => self.delivered += 1,
            QueueOutcome::DeadLettered => self.dead_lettered += 1,
            _ => self.skipped += 1,
        }
    }
}

pub struct ResourceInvocationEngine {
    queue_repo: Arc<dyn QueueRepository>,
    handlers: ResourceHandlers,
    lock: Option<(Arc<dyn QueueLock>, Duration)>,
}

impl ResourceInvocationEngine {
    pub fn new(queue_repo: Arc<dyn QueueRepository>, handlers: ResourceHandlers) -> Self {
        Self {
            queue_repo,
            handlers,
            lock: None,
        }
    }

    /// Guard each queue with a lease so several instances can share storage
    pub fn with_queue_lock(mut self, lock: Arc<dyn QueueLock>, ttl: Duration) -> Self {
        self.lock = Some((lock, ttl));
        self
    }

    /// Run one pass over all queues
    ///
    /// Fails only if the queue listing fails; errors on a single queue are
    /// logged and the pass moves on.
    pub async fn invoke_queue_resources(&self) -> Result<TickSummary> {
        let queues = self.queue_repo.list_queues(None).await?;

        let mut summary = TickSummary {
            queues: queues.len(),
            ..TickSummary::default()
        };

        for queue in &queues {
            match self.process_queue_guarded(queue).await {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    error!(queue = %queue, error = %e, "Queue processing failed");
                    summary.failed += 1;
                }
            }
        }

        debug!(
            queues = summary.queues,
            delivered = summary.delivered,
            dead_lettered = summary.dead_lettered,
            failed = summary.failed,
            "Invocation pass completed"
        );
        Ok(summary)
    }

    async fn process_queue_guarded(&self, queue: &Orid) -> Result<QueueOutcome> {
        let Some((lock, ttl)) = &self.lock else {
            return self.process_queue(queue).await;
        };

        let key = lock_key(queue);
        if !lock.try_acquire(&key, *ttl).await? {
            debug!(queue = %queue, "Queue locked by another instance");
            return Ok(QueueOutcome::Locked);
        }

        let outcome = self.process_queue(queue).await;
        if let Err(e) = lock.release(&key).await {
            warn!(queue = %queue, error = %e, "Failed to release queue lock");
        }
        outcome
    }

    /// Deliver at most one message from `queue`
    pub async fn process_queue(&self, queue: &Orid) -> Result<QueueOutcome> {
        let details = self.queue_repo.get_queue_details(queue).await?;
        if !details.is_dispatchable() {
            return Ok(QueueOutcome::Idle);
        }
        let Some(QueueBinding { resource, dlq }) = details.meta.binding() else {
            return Ok(QueueOutcome::Idle);
        };

        let kind = ResourceKind::of(&resource);
        let Some(handler) = self.handlers.for_kind(&kind) else {
            warn!(
                queue = %queue,
                resource = %resource,
                dlq = %dlq,
                "Unknown resource type"
            );
            return Ok(QueueOutcome::Unsupported);
        };

        let Some(message) = self.queue_repo.get_message(queue, None).await? else {
            return Ok(QueueOutcome::NoVisibleMessage);
        };

        match handler.invoke(&resource, &message.body).await {
            Ok(()) => {
                info!(
                    queue = %queue,
                    message_id = %message.id,
                    resource = %resource,
                    "Resource invoked"
                );
                self.queue_repo.remove_message(queue, &message.id).await?;
                Ok(QueueOutcome::Delivered)
            }
            Err(e) => {
                error!(
                    queue = %queue,
                    message_id = %message.id,
                    resource = %resource,
                    error = %e,
                    "Resource invocation failed, moving message to DLQ"
                );
                // Copy first: a crash in between duplicates rather than loses
                self.queue_repo
                    .create_message(&dlq, &message.body, None)
                    .await?;
                self.queue_repo.remove_message(queue, &message.id).await?;
                Ok(QueueOutcome::DeadLettered)
            }
        }
    }
}

/// Lock key for a queue: `<queue>-lock`
pub fn lock_key(queue: &Orid) -> String {
    format!("{queue}-lock")
}

#[async_trait]
impl PeriodicTask for ResourceInvocationEngine {
    async fn run_once(&self) -> Result<()> {
        self.invoke_queue_resources().await.map(|_| ())
    }

    fn name(&self) -> &'static str {
        "resource-invocation"
    }
}
