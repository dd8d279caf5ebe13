// Message Domain Model

use serde::{Deserialize, Serialize};

/// Storage-assigned message id
pub type MessageId = String;

/// A message received from a queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    /// Opaque body, serialization is up to the caller
    pub body: String,
    /// Deliveries without removal, including this one
    pub receive_count: u32,
}
