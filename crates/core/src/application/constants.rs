// Application constants (No magic values)
use std::time::Duration;

/// Default scheduler poll interval (1s)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Default deadline for each health check (5s)
pub const DEFAULT_HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Default lease for per-queue locks (30s)
pub const DEFAULT_QUEUE_LOCK_TTL: Duration = Duration::from_secs(30);

/// Maximum queue name length
pub const MAX_QUEUE_NAME_LEN: usize = 50;

/// Identifier provider segment used when none is configured
pub const DEFAULT_ORID_PROVIDER: &str = "orid";
