//! # Runtime Configuration
//!
//! Aggregates the journal and coordinator configuration. Every value has a
//! default and can be overridden from the environment:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `XA_DATA_DIR` | journal directory is `<dir>/journal` |
//! | `XA_TX_TIMEOUT_SECS` | default transaction timeout |
//! | `XA_RECOVERY_INTERVAL_SECS` | recovery sweep period |
//! | `XA_COMPACTION_INTERVAL_SECS` | journal compaction period |
//! | `XA_JOURNAL_SIZE` | initial size of each journal file, in bytes |

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use xa_01_journal::JournalConfig;
use xa_02_coordinator::CoordinatorConfig;

pub const ENV_DATA_DIR: &str = "XA_DATA_DIR";
pub const ENV_TX_TIMEOUT: &str = "XA_TX_TIMEOUT_SECS";
pub const ENV_RECOVERY_INTERVAL: &str = "XA_RECOVERY_INTERVAL_SECS";
pub const ENV_COMPACTION_INTERVAL: &str = "XA_COMPACTION_INTERVAL_SECS";
pub const ENV_JOURNAL_SIZE: &str = "XA_JOURNAL_SIZE";

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub journal: JournalConfig,
    pub coordinator: CoordinatorConfig,
}

impl RuntimeConfig {
    /// Defaults with the journal under `<data_dir>/journal`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            journal: JournalConfig::new(Self::journal_dir(data_dir.as_ref())),
            coordinator: CoordinatorConfig::default(),
        }
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Missing keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(ENV_DATA_DIR) {
            Some(dir) => Self::new(dir),
            None => Self::default(),
        };

        if let Some(secs) = parse::<u64>(&lookup, ENV_TX_TIMEOUT)? {
            config.coordinator.default_timeout_secs = secs;
        }
        if let Some(secs) = parse::<u64>(&lookup, ENV_RECOVERY_INTERVAL)? {
            config.coordinator.recovery_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&lookup, ENV_COMPACTION_INTERVAL)? {
            config.journal.compaction_interval = Duration::from_secs(secs);
        }
        if let Some(bytes) = parse::<u64>(&lookup, ENV_JOURNAL_SIZE)? {
            config.journal.initial_size = bytes;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject zero timeouts, intervals and sizes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.coordinator.default_timeout_secs == 0 {
            return Err(ConfigError::Zero(ENV_TX_TIMEOUT));
        }
        if self.coordinator.recovery_interval.is_zero() {
            return Err(ConfigError::Zero(ENV_RECOVERY_INTERVAL));
        }
        if self.journal.compaction_interval.is_zero() {
            return Err(ConfigError::Zero(ENV_COMPACTION_INTERVAL));
        }
        if self.journal.initial_size == 0 {
            return Err(ConfigError::Zero(ENV_JOURNAL_SIZE));
        }
        Ok(())
    }

    fn journal_dir(data_dir: &Path) -> PathBuf {
        data_dir.join("journal")
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}
