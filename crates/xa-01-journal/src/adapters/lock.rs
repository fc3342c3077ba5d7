//! # Directory Lock
//!
//! Uses `fs2` for cross-platform file locking (flock on Unix, LockFile on Windows).
//! The OS drops the lock when the holding process dies, so there is no
//! stale-lock cleanup. The `LOCK` file itself is never removed: every
//! process must contend on the same inode.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::debug;

use crate::domain::errors::JournalError;

/// Exclusive lock on a journal directory.
///
/// Acquired when the journal opens, released on drop (RAII).
#[derive(Debug)]
pub struct JournalLock {
    /// Kept open to hold the lock.
    file: File,
    path: PathBuf,
    pid: u32,
}

impl JournalLock {
    const LOCK_FILE: &'static str = "LOCK";

    /// Acquire an exclusive lock on `dir`, retrying with exponential
    /// backoff until `timeout` expires.
    pub fn acquire(dir: &Path, timeout: Duration) -> Result<Self, JournalError> {
        let deadline = Instant::now() + timeout;
        let lock_path = dir.join(Self::LOCK_FILE);
        let mut retry_delay = Duration::from_millis(10);

        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&lock_path)?;

            match file.try_lock_exclusive() {
                Ok(()) => {
                    let pid = std::process::id();
                    let mut locked = file;
                    locked.set_len(0)?;
                    writeln!(locked, "{pid}")?;
                    locked.sync_all()?;
                    debug!(path = %lock_path.display(), pid, "[xa-01] Journal directory locked");

                    return Ok(Self {
                        file: locked,
                        path: lock_path,
                        pid,
                    });
                }
                Err(_) => {
                    if Instant::now() >= deadline {
                        let holder = Self::read_existing_pid(&lock_path)
                            .map(|p| format!("held by process {p}"))
                            .unwrap_or_else(|| "held by another process".to_string());
                        return Err(JournalError::Locked {
                            message: format!("{} {}", lock_path.display(), holder),
                        });
                    }
                    drop(file);
                    std::thread::sleep(retry_delay);
                    retry_delay = (retry_delay * 2).min(Duration::from_millis(250));
                }
            }
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_existing_pid(path: &Path) -> Option<u32> {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }
}

impl Drop for JournalLock {
    fn drop(&mut self) {
        #[allow(clippy::incompatible_msrv)]
        let _ = FileExt::unlock(&self.file);
    }
}
