use std::time::Duration;

use shared_types::Xid;

/// Configuration for the transaction engine.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Timeout applied by `begin` (default: 300s).
    pub default_timeout_secs: u64,

    /// Format id stamped on generated xids.
    pub format_id: i32,

    /// Period of the recovery sweep (default: 60s).
    pub recovery_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 300,
            format_id: Xid::DEFAULT_FORMAT_ID,
            recovery_interval: Duration::from_secs(60),
        }
    }
}

impl CoordinatorConfig {
    pub fn with_default_timeout(mut self, secs: u64) -> Self {
        self.default_timeout_secs = secs;
        self
    }

    pub fn with_format_id(mut self, format_id: i32) -> Self {
        self.format_id = format_id;
        self
    }

    pub fn with_recovery_interval(mut self, interval: Duration) -> Self {
        self.recovery_interval = interval;
        self
    }
}
