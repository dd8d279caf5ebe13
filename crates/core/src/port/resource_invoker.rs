// Resource Invoker Port
// Capability to hand a message body to an invocable resource

use crate::domain::Orid;
use async_trait::async_trait;
use thiserror::Error;

/// Invocation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    #[error("Resource rejected invocation ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invocation timeout after {0}ms")]
    Timeout(u64),

    #[error("Invoker not configured: {0}")]
    NotConfigured(String),
}

/// Resource Invoker trait
///
/// Implementations:
/// - HttpFunctionInvoker: serverless function service
/// - HttpStateMachineInvoker: state machine service
#[async_trait]
pub trait ResourceInvoker: Send + Sync {
    /// Invoke `resource` with the message body
    async fn invoke(&self, resource: &Orid, body: &str) -> Result<(), InvocationError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock invoker behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        Success,
        Fail(String),
    }

    /// Mock Resource Invoker for testing
    pub struct MockResourceInvoker {
        behavior: Arc<Mutex<MockBehavior>>,
        calls: Arc<Mutex<Vec<(Orid, String)>>>,
    }

    impl MockResourceInvoker {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(message.into()))
        }

        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls(&self) -> Vec<(Orid, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ResourceInvoker for MockResourceInvoker {
        async fn invoke(&self, resource: &Orid, body: &str) -> Result<(), InvocationError> {
            self.calls
                .lock()
                .unwrap()
                .push((resource.clone(), body.to_string()));

            let behavior = self.behavior.lock().unwrap().clone();
            match behavior {
                MockBehavior::Success => Ok(()),
                MockBehavior::Fail(msg) => Err(InvocationError::Transport(msg)),
            }
        }
    }
}
