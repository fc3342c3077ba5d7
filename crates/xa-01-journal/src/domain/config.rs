//! # Journal Configuration
//!
//! All values have defaults suitable for production use.

use std::path::PathBuf;
use std::time::Duration;

/// Default allocated size of each journal file (1 MiB).
pub const DEFAULT_INITIAL_SIZE: u64 = 1024 * 1024;

/// Default growth step when a file runs out of space (1 MiB).
pub const INCREASE_SIZE: u64 = 1024 * 1024;

/// Configuration for the dual-file journal.
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Directory holding both journal files and the `LOCK` file.
    pub directory: PathBuf,

    /// File names of the two journal files.
    pub first_file: String,
    pub second_file: String,

    /// Allocated size of a freshly created file.
    pub initial_size: u64,

    /// Growth step applied when an append does not fit.
    pub increase_size: u64,

    /// Period of the background compaction task (default: 30s).
    pub compaction_interval: Duration,

    /// Compaction runs inline once used/capacity exceeds
    /// `threshold_numerator / threshold_denominator` (default: 2/3).
    pub threshold_numerator: u64,
    pub threshold_denominator: u64,

    /// How long to wait for the directory lock (default: 5s).
    pub lock_timeout: Duration,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./data/journal"),
            first_file: "journal-1.log".to_string(),
            second_file: "journal-2.log".to_string(),
            initial_size: DEFAULT_INITIAL_SIZE,
            increase_size: INCREASE_SIZE,
            compaction_interval: Duration::from_secs(30),
            threshold_numerator: 2,
            threshold_denominator: 3,
            lock_timeout: Duration::from_secs(5),
        }
    }
}

impl JournalConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    /// Small files and a short lock timeout, so tests hit growth and
    /// compaction quickly.
    pub fn for_testing(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            initial_size: 4 * 1024,
            increase_size: 4 * 1024,
            lock_timeout: Duration::from_millis(100),
            ..Self::default()
        }
    }

    pub fn with_initial_size(mut self, size: u64) -> Self {
        self.initial_size = size;
        self
    }

    pub fn with_increase_size(mut self, size: u64) -> Self {
        self.increase_size = size;
        self
    }

    pub fn with_compaction_interval(mut self, interval: Duration) -> Self {
        self.compaction_interval = interval;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn first_path(&self) -> PathBuf {
        self.directory.join(&self.first_file)
    }

    pub fn second_path(&self) -> PathBuf {
        self.directory.join(&self.second_file)
    }

    /// True if `used` bytes of `capacity` crosses the compaction threshold.
    pub fn exceeds_threshold(&self, used: u64, capacity: u64) -> bool {
        used.saturating_mul(self.threshold_denominator)
            > capacity.saturating_mul(self.threshold_numerator)
    }
}
