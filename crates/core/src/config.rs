//! Engine configuration
//!
//! Built once at startup and handed to each component by value or reference.

use std::time::Duration;

/// Default quiet interval before a batch is emitted
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(1000);

/// Default bound on a single remote update call
pub const DEFAULT_UPDATE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Settings for the aggregation and dispatch engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Quiet interval that closes a batch (default: 1000ms)
    pub quiet_window: Duration,

    /// Upper bound on how long a non-empty batch may stay open (default: unbounded)
    pub max_wait: Option<Duration>,

    /// Timeout applied to each remote update call (default: 5s)
    pub update_timeout: Duration,

    /// Dispatch only the last change per file within a batch (default: true)
    pub dedupe_changes: bool,

    /// Prefix stripped from remote script urls before matching (default: none)
    pub remote_root: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quiet_window: DEFAULT_QUIET_WINDOW,
            max_wait: None,
            update_timeout: DEFAULT_UPDATE_TIMEOUT,
            dedupe_changes: true,
            remote_root: None,
        }
    }
}
