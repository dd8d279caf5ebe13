// Resource Kind - maps identifier service tags to invocable targets

use super::orid::Orid;
use std::fmt;

/// Service tag of serverless functions
pub const FUNCTION_SERVICE: &str = "sf";
/// Service tag of state machines
pub const STATE_MACHINE_SERVICE: &str = "sm";

/// Kind of resource a queue may be bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ServerlessFunction,
    StateMachine,
    Unsupported(String),
}

impl ResourceKind {
    /// Tags accepted as a queue resource
    pub const SUPPORTED_TAGS: [&'static str; 2] = [FUNCTION_SERVICE, STATE_MACHINE_SERVICE];

    pub fn from_service(tag: &str) -> Self {
        match tag {
            FUNCTION_SERVICE => ResourceKind::ServerlessFunction,
            STATE_MACHINE_SERVICE => ResourceKind::StateMachine,
            other => ResourceKind::Unsupported(other.to_string()),
        }
    }

    pub fn of(orid: &Orid) -> Self {
        Self::from_service(&orid.service)
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, ResourceKind::Unsupported(_))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::ServerlessFunction => write!(f, "{FUNCTION_SERVICE}"),
            ResourceKind::StateMachine => write!(f, "{STATE_MACHINE_SERVICE}"),
            ResourceKind::Unsupported(tag) => write!(f, "{tag}"),
        }
    }
}
