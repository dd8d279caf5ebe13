// Queue Lock Port
// Cross-instance mutual exclusion per queue (optional engine hardening)

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Lease-based lock keyed by string
///
/// A lease expires after `ttl` even if never released, so a crashed holder
/// cannot block a queue forever.
#[async_trait]
pub trait QueueLock: Send + Sync {
    /// Returns false when another owner holds a live lease
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Release a lease held by this owner; releasing a foreign or missing lease is a no-op
    async fn release(&self, key: &str) -> Result<()>;
}

pub mod mocks {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// In-memory lock; keys in `foreign` are held by someone else
    #[derive(Default)]
    pub struct MockQueueLock {
        held: Mutex<HashSet<String>>,
        foreign: Mutex<HashSet<String>>,
        released: Mutex<Vec<String>>,
    }

    impl MockQueueLock {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn hold_elsewhere(&self, key: impl Into<String>) {
            self.foreign.lock().unwrap().insert(key.into());
        }

        pub fn is_held(&self, key: &str) -> bool {
            self.held.lock().unwrap().contains(key)
        }

        pub fn released(&self) -> Vec<String> {
            self.released.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueueLock for MockQueueLock {
        async fn try_acquire(&self, key: &str, _ttl: Duration) -> Result<bool> {
            if self.foreign.lock().unwrap().contains(key) {
                return Ok(false);
            }
            Ok(self.held.lock().unwrap().insert(key.to_string()))
        }

        async fn release(&self, key: &str) -> Result<()> {
            if self.held.lock().unwrap().remove(key) {
                self.released.lock().unwrap().push(key.to_string());
            }
            Ok(())
        }
    }
}
