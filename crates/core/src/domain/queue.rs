// Queue Domain Model

use super::orid::Orid;
use serde::{Deserialize, Serialize};

/// Service tag of queue identifiers
pub const QUEUE_SERVICE: &str = "qs";

/// Partial update of a single attribute
///
/// `Unset` leaves the stored value untouched, `Clear` removes it,
/// `Set` replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Unset,
    Clear,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Unset
    }
}

impl<T> Patch<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Patch::Unset)
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Patch::Set(value) => Some(value),
            _ => None,
        }
    }

    /// Apply onto the current value
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            Patch::Unset => current,
            Patch::Clear => None,
            Patch::Set(value) => Some(value),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Patch<U> {
        match self {
            Patch::Unset => Patch::Unset,
            Patch::Clear => Patch::Clear,
            Patch::Set(value) => Patch::Set(f(value)),
        }
    }
}

/// Wire form: an absent field is `Unset`, an explicit `null` is `Clear`.
/// Use with `#[serde(default)]` on the containing field.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Patch::Set(value),
            None => Patch::Clear,
        })
    }
}

/// Mutable queue metadata, stored apart from the queue primitive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMeta {
    #[serde(default)]
    pub resource: Option<Orid>,
    #[serde(default)]
    pub dlq: Option<Orid>,
}

impl QueueMeta {
    /// Resource and DLQ pair, when both are bound
    pub fn binding(&self) -> Option<QueueBinding> {
        match (&self.resource, &self.dlq) {
            (Some(resource), Some(dlq)) => Some(QueueBinding {
                resource: resource.clone(),
                dlq: dlq.clone(),
            }),
            _ => None,
        }
    }

    pub fn merge(self, resource: Patch<Orid>, dlq: Patch<Orid>) -> Self {
        Self {
            resource: resource.apply(self.resource),
            dlq: dlq.apply(self.dlq),
        }
    }
}

/// Downstream resource a queue dispatches to, with its dead-letter queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding {
    pub resource: Orid,
    pub dlq: Orid,
}

impl From<QueueBinding> for QueueMeta {
    fn from(binding: QueueBinding) -> Self {
        Self {
            resource: Some(binding.resource),
            dlq: Some(binding.dlq),
        }
    }
}

/// Arguments for creating the queue primitive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateQueueSpec {
    pub orid: Orid,
    pub meta: QueueMeta,
    /// Bytes, -1 for unlimited
    pub max_size: Option<i64>,
    /// Seconds before new messages become visible
    pub delay: Option<u32>,
    /// Seconds a received message stays hidden
    pub visibility_timeout: Option<u32>,
}

impl CreateQueueSpec {
    pub fn new(orid: Orid) -> Self {
        Self {
            orid,
            meta: QueueMeta::default(),
            max_size: None,
            delay: None,
            visibility_timeout: None,
        }
    }
}

/// Queue attributes as reported by storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueDetails {
    pub orid: Orid,
    pub meta: QueueMeta,
    pub max_size: Option<i64>,
    pub delay: Option<u32>,
    pub visibility_timeout: Option<u32>,
    pub current_messages: u64,
}

impl QueueDetails {
    /// A queue takes part in dispatch when it is bound and has messages
    pub fn is_dispatchable(&self) -> bool {
        self.meta.binding().is_some() && self.current_messages > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueLength {
    pub orid: Orid,
    pub size: u64,
}
