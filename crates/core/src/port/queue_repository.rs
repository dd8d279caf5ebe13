// Queue Repository Port (Interface)

use crate::domain::{CreateQueueSpec, HealthReport, Message, Orid, Patch, QueueDetails};
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Storage interface for queues, their messages and their metadata
///
/// Every failure of the underlying storage surfaces as `AppError::Storage`.
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Create the queue primitive and its metadata record
    async fn create_queue(&self, spec: &CreateQueueSpec) -> Result<()>;

    /// List queue identifiers, optionally restricted to one account
    ///
    /// `None` is the unscoped system listing.
    async fn list_queues(&self, account_id: Option<&str>) -> Result<Vec<Orid>>;

    /// Merge metadata: `Unset` keeps, `Clear` removes, `Set` replaces
    async fn update_queue(&self, queue: &Orid, dlq: Patch<Orid>, resource: Patch<Orid>)
        -> Result<()>;

    /// Remove the queue primitive, its messages and its metadata together
    async fn remove_queue(&self, queue: &Orid) -> Result<()>;

    async fn get_queue_details(&self, queue: &Orid) -> Result<QueueDetails>;

    /// Enqueue a body; `delay` overrides the queue default
    async fn create_message(&self, queue: &Orid, body: &str, delay: Option<u32>) -> Result<()>;

    /// Receive the next visible message without waiting for one
    ///
    /// The message stays hidden for the visibility timeout (call override or
    /// queue default) until it is removed.
    async fn get_message(&self, queue: &Orid, visibility_timeout: Option<u32>)
        -> Result<Option<Message>>;

    /// Returns the number of messages removed (0 or 1)
    async fn remove_message(&self, queue: &Orid, message_id: &str) -> Result<u64>;

    /// Check storage connectivity and queue listing, each bounded by `timeout`
    async fn health_checks(&self, timeout: Duration) -> Result<HealthReport>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::{HealthStatus, QueueMeta};
    use crate::error::AppError;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Repository call, recorded in order
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum RepoCall {
        CreateQueue(Orid),
        ListQueues(Option<String>),
        UpdateQueue {
            queue: Orid,
            dlq: Patch<Orid>,
            resource: Patch<Orid>,
        },
        RemoveQueue(Orid),
        GetQueueDetails(Orid),
        CreateMessage {
            queue: Orid,
            body: String,
        },
        GetMessage(Orid),
        RemoveMessage {
            queue: Orid,
            message_id: String,
        },
        HealthChecks,
    }

    #[derive(Default)]
    struct State {
        queues: Vec<QueueDetails>,
        messages: HashMap<Orid, VecDeque<Message>>,
        calls: Vec<RepoCall>,
        next_id: u64,
        fail_list_queues: bool,
        broken_queues: Vec<Orid>,
    }

    /// In-memory repository that records every call
    #[derive(Default)]
    pub struct MockQueueRepository {
        state: Mutex<State>,
    }

    impl MockQueueRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed a queue; `current_messages` is kept as given until messages change
        pub fn with_queue(self, details: QueueDetails) -> Self {
            self.state.lock().unwrap().queues.push(details);
            self
        }

        pub fn with_bare_queue(self, orid: Orid) -> Self {
            self.with_queue(QueueDetails {
                orid,
                meta: QueueMeta::default(),
                max_size: None,
                delay: None,
                visibility_timeout: None,
                current_messages: 0,
            })
        }

        /// Seed a message and bump the queue's count
        pub fn with_message(self, queue: &Orid, id: &str, body: &str) -> Self {
            {
                let mut state = self.state.lock().unwrap();
                state
                    .messages
                    .entry(queue.clone())
                    .or_default()
                    .push_back(Message {
                        id: id.to_string(),
                        body: body.to_string(),
                        receive_count: 0,
                    });
                if let Some(details) = state.queues.iter_mut().find(|q| &q.orid == queue) {
                    details.current_messages += 1;
                }
            }
            self
        }

        pub fn fail_list_queues(&self, fail: bool) {
            self.state.lock().unwrap().fail_list_queues = fail;
        }

        /// Keep listing `queue` but fail every details lookup for it
        pub fn break_queue(self, queue: Orid) -> Self {
            self.state.lock().unwrap().broken_queues.push(queue.clone());
            self.with_bare_queue(queue)
        }

        pub fn calls(&self) -> Vec<RepoCall> {
            self.state.lock().unwrap().calls.clone()
        }

        pub fn count_calls(&self, predicate: impl Fn(&RepoCall) -> bool) -> usize {
            self.state
                .lock()
                .unwrap()
                .calls
                .iter()
                .filter(|c| predicate(c))
                .count()
        }

        pub fn messages(&self, queue: &Orid) -> Vec<Message> {
            self.state
                .lock()
                .unwrap()
                .messages
                .get(queue)
                .map(|m| m.iter().cloned().collect())
                .unwrap_or_default()
        }

        fn record(&self, call: RepoCall) {
            self.state.lock().unwrap().calls.push(call);
        }
    }

    #[async_trait]
    impl QueueRepository for MockQueueRepository {
        async fn create_queue(&self, spec: &CreateQueueSpec) -> Result<()> {
            self.record(RepoCall::CreateQueue(spec.orid.clone()));
            let mut state = self.state.lock().unwrap();
            state.queues.push(QueueDetails {
                orid: spec.orid.clone(),
                meta: spec.meta.clone(),
                max_size: spec.max_size,
                delay: spec.delay,
                visibility_timeout: spec.visibility_timeout,
                current_messages: 0,
            });
            Ok(())
        }

        async fn list_queues(&self, account_id: Option<&str>) -> Result<Vec<Orid>> {
            self.record(RepoCall::ListQueues(account_id.map(str::to_string)));
            let state = self.state.lock().unwrap();
            if state.fail_list_queues {
                return Err(AppError::Storage("list queues failed".to_string()));
            }
            Ok(state
                .queues
                .iter()
                .map(|q| q.orid.clone())
                .filter(|orid| account_id.map_or(true, |a| orid.account_id == a))
                .collect())
        }

        async fn update_queue(
            &self,
            queue: &Orid,
            dlq: Patch<Orid>,
            resource: Patch<Orid>,
        ) -> Result<()> {
            self.record(RepoCall::UpdateQueue {
                queue: queue.clone(),
                dlq: dlq.clone(),
                resource: resource.clone(),
            });
            let mut state = self.state.lock().unwrap();
            if let Some(details) = state.queues.iter_mut().find(|q| &q.orid == queue) {
                details.meta = std::mem::take(&mut details.meta).merge(resource, dlq);
            }
            Ok(())
        }

        async fn remove_queue(&self, queue: &Orid) -> Result<()> {
            self.record(RepoCall::RemoveQueue(queue.clone()));
            let mut state = self.state.lock().unwrap();
            state.queues.retain(|q| &q.orid != queue);
            state.messages.remove(queue);
            Ok(())
        }

        async fn get_queue_details(&self, queue: &Orid) -> Result<QueueDetails> {
            self.record(RepoCall::GetQueueDetails(queue.clone()));
            let state = self.state.lock().unwrap();
            if state.broken_queues.contains(queue) {
                return Err(AppError::Storage(format!("Queue unreadable: {queue}")));
            }
            state
                .queues
                .iter()
                .find(|q| &q.orid == queue)
                .cloned()
                .ok_or_else(|| AppError::Storage(format!("Queue not found: {queue}")))
        }

        async fn create_message(&self, queue: &Orid, body: &str, _delay: Option<u32>) -> Result<()> {
            self.record(RepoCall::CreateMessage {
                queue: queue.clone(),
                body: body.to_string(),
            });
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = format!("mock-{}", state.next_id);
            state
                .messages
                .entry(queue.clone())
                .or_default()
                .push_back(Message {
                    id,
                    body: body.to_string(),
                    receive_count: 0,
                });
            if let Some(details) = state.queues.iter_mut().find(|q| &q.orid == queue) {
                details.current_messages += 1;
            }
            Ok(())
        }

        async fn get_message(
            &self,
            queue: &Orid,
            _visibility_timeout: Option<u32>,
        ) -> Result<Option<Message>> {
            self.record(RepoCall::GetMessage(queue.clone()));
            let mut state = self.state.lock().unwrap();
            Ok(state
                .messages
                .get_mut(queue)
                .and_then(|m| m.front_mut())
                .map(|message| {
                    message.receive_count += 1;
                    message.clone()
                }))
        }

        async fn remove_message(&self, queue: &Orid, message_id: &str) -> Result<u64> {
            self.record(RepoCall::RemoveMessage {
                queue: queue.clone(),
                message_id: message_id.to_string(),
            });
            let mut state = self.state.lock().unwrap();
            let removed = match state.messages.get_mut(queue) {
                Some(messages) => {
                    let before = messages.len();
                    messages.retain(|m| m.id != message_id);
                    (before - messages.len()) as u64
                }
                None => 0,
            };
            if let Some(details) = state.queues.iter_mut().find(|q| &q.orid == queue) {
                details.current_messages = details.current_messages.saturating_sub(removed);
            }
            Ok(removed)
        }

        async fn health_checks(&self, _timeout: Duration) -> Result<HealthReport> {
            self.record(RepoCall::HealthChecks);
            Ok(HealthReport {
                storage_status: HealthStatus::Ok,
                queue_status: HealthStatus::Ok,
            })
        }
    }
}
