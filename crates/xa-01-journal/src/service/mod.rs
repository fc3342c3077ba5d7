//! # Archive Journal Service
//!
//! The dual-file write-ahead journal. One file is master and receives every
//! append; the other is the compaction target.
//!
//! ## Swap protocol
//!
//! ```text
//! 1. collect ids whose latest record is DELETE
//! 2. copy every other record, in order, into the (reset) slave
//! 3. slave.mark_as_master → master.switch_to_slave → slave.switch_to_master
//! 4. swap handles
//! ```
//!
//! Appends and swaps share one writer lock, so a swap never overlaps an
//! append. A crash at any step leaves headers that `open` resolves to
//! exactly one master.

pub(crate) mod helpers;

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use shared_types::{ResourceArchive, TransactionArchive};
use tracing::{debug, info, warn};

use crate::adapters::file::JournalFile;
use crate::adapters::lock::JournalLock;
use crate::adapters::serializer::BincodeArchiveSerializer;
use crate::adapters::time::SystemTimeSource;
use crate::domain::config::JournalConfig;
use crate::domain::errors::JournalError;
use crate::domain::record::{JournalOperator, JournalRecord};
use crate::domain::replay::{deleted_ids, replay_records};
use crate::ports::inbound::{RecoveryCallback, TransactionLogger};
use crate::ports::outbound::{ArchiveSerializer, TimeSource};
use helpers::{resource_record, transaction_record};

/// Dependencies injected into the journal.
pub struct JournalDependencies<S, T> {
    pub serializer: S,
    pub time_source: T,
}

impl Default for JournalDependencies<BincodeArchiveSerializer, SystemTimeSource> {
    fn default() -> Self {
        Self {
            serializer: BincodeArchiveSerializer,
            time_source: SystemTimeSource,
        }
    }
}

/// Outcome of one compaction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionReport {
    /// False when there was nothing to drop and the files were left alone.
    pub swapped: bool,
    pub records_before: usize,
    pub records_after: usize,
    /// Resolved transactions dropped by this pass.
    pub transactions_dropped: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Point-in-time view of the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalStats {
    pub master_path: PathBuf,
    pub used_bytes: u64,
    pub capacity_bytes: u64,
    pub swap_count: u64,
}

struct JournalFiles {
    master: JournalFile,
    slave: JournalFile,
}

/// Production journal: two files in one locked directory.
pub struct ArchiveJournal<S = BincodeArchiveSerializer, T = SystemTimeSource>
where
    S: ArchiveSerializer,
    T: TimeSource,
{
    config: JournalConfig,
    files: Mutex<JournalFiles>,
    serializer: S,
    time_source: T,
    swap_count: AtomicU64,
    _lock: JournalLock,
}

impl ArchiveJournal {
    /// Open with the bincode serializer and the system clock.
    pub fn open_default(config: JournalConfig) -> Result<Self, JournalError> {
        Self::open(JournalDependencies::default(), config)
    }
}

impl<S, T> ArchiveJournal<S, T>
where
    S: ArchiveSerializer,
    T: TimeSource,
{
    /// Open (or create) the journal in `config.directory`.
    ///
    /// Fails with `Locked` if another process holds the directory and with
    /// `Corrupt` if the two headers cannot be resolved to one master.
    pub fn open(deps: JournalDependencies<S, T>, config: JournalConfig) -> Result<Self, JournalError> {
        std::fs::create_dir_all(&config.directory)?;
        let lock = JournalLock::acquire(&config.directory, config.lock_timeout)?;
        let now = deps.time_source.now_millis();

        let files = Self::resolve_files(&config, now)?;
        info!(
            master = %files.master.path().display(),
            used = files.master.used(),
            capacity = files.master.capacity(),
            "[xa-01] Journal opened"
        );

        Ok(Self {
            config,
            files: Mutex::new(files),
            serializer: deps.serializer,
            time_source: deps.time_source,
            swap_count: AtomicU64::new(0),
            _lock: lock,
        })
    }

    fn resolve_files(config: &JournalConfig, now: u64) -> Result<JournalFiles, JournalError> {
        let first_path = config.first_path();
        let second_path = config.second_path();

        match (first_path.exists(), second_path.exists()) {
            (false, false) => Ok(JournalFiles {
                master: JournalFile::create(&first_path, config.initial_size, now, true)?,
                slave: JournalFile::create(&second_path, config.initial_size, now, false)?,
            }),
            (true, false) => {
                let existing = JournalFile::open(&first_path)?;
                let slave = JournalFile::create(&second_path, config.initial_size, now, false)?;
                Self::single_survivor(existing, slave, now)
            }
            (false, true) => {
                let existing = JournalFile::open(&second_path)?;
                let slave = JournalFile::create(&first_path, config.initial_size, now, false)?;
                Self::single_survivor(existing, slave, now)
            }
            (true, true) => {
                let first = JournalFile::open(&first_path)?;
                let second = JournalFile::open(&second_path)?;
                Self::resolve_roles(first, second, now)
            }
        }
    }

    /// One file lost before it was ever written; the other must be usable.
    fn single_survivor(
        mut existing: JournalFile,
        slave: JournalFile,
        now: u64,
    ) -> Result<JournalFiles, JournalError> {
        if existing.is_marked() {
            existing.switch_to_master(now)?;
        } else if !existing.is_master() {
            return Err(JournalError::corrupt(
                existing.path(),
                "only journal file is neither master nor marked",
            ));
        }
        Ok(JournalFiles {
            master: existing,
            slave,
        })
    }

    fn resolve_roles(
        first: JournalFile,
        second: JournalFile,
        now: u64,
    ) -> Result<JournalFiles, JournalError> {
        match (first.is_marked(), second.is_marked()) {
            (true, true) => Err(JournalError::corrupt(
                first.path(),
                "both journal files are marked",
            )),
            (true, false) => Self::finish_swap(first, second, now),
            (false, true) => Self::finish_swap(second, first, now),
            (false, false) => match (first.is_master(), second.is_master()) {
                (true, false) => Ok(JournalFiles {
                    master: first,
                    slave: second,
                }),
                (false, true) => Ok(JournalFiles {
                    master: second,
                    slave: first,
                }),
                (true, true) => Err(JournalError::corrupt(
                    first.path(),
                    "both journal files are master",
                )),
                (false, false) => Err(JournalError::corrupt(
                    first.path(),
                    "neither journal file is master",
                )),
            },
        }
    }

    /// Roll an interrupted swap forward: the marked file holds a complete copy.
    fn finish_swap(
        mut marked: JournalFile,
        mut other: JournalFile,
        now: u64,
    ) -> Result<JournalFiles, JournalError> {
        warn!(
            promoted = %marked.path().display(),
            demoted = %other.path().display(),
            "[xa-01] Completing interrupted journal swap"
        );
        other.switch_to_slave(now)?;
        marked.switch_to_master(now)?;
        Ok(JournalFiles {
            master: marked,
            slave: other,
        })
    }

    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    /// Append records to the master, compacting inline past the threshold.
    ///
    /// The records are durable once the append returns. A failed inline
    /// compaction is logged and left to the next scheduled one.
    fn write(&self, records: &[JournalRecord]) -> Result<(), JournalError> {
        let mut files = self.files.lock();
        let now = self.time_source.now_millis();
        files
            .master
            .append_batch(records, now, self.config.increase_size)?;

        if self
            .config
            .exceeds_threshold(files.master.used(), files.master.record_capacity())
        {
            debug!(
                used = files.master.used(),
                capacity = files.master.record_capacity(),
                "[xa-01] Journal over threshold, compacting"
            );
            if let Err(e) = self.compact_locked(&mut files) {
                warn!(error = %e, "[xa-01] Inline compaction failed, records kept in master");
            }
        }
        Ok(())
    }

    /// Drop resolved transactions by copying live records into the slave
    /// and swapping roles.
    pub fn compact(&self) -> Result<CompactionReport, JournalError> {
        let mut files = self.files.lock();
        self.compact_locked(&mut files)
    }

    fn compact_locked(&self, files: &mut JournalFiles) -> Result<CompactionReport, JournalError> {
        let now = self.time_source.now_millis();
        let records = files.master.read_records()?;
        let deleted = deleted_ids(&records);

        let mut report = CompactionReport {
            records_before: records.len(),
            bytes_before: files.master.used(),
            ..CompactionReport::default()
        };

        if deleted.is_empty() {
            report.records_after = report.records_before;
            report.bytes_after = report.bytes_before;
        } else {
            let live: Vec<JournalRecord> = records
                .into_iter()
                .filter(|r| !deleted.contains(&r.global_id))
                .collect();

            files.slave.reset(now)?;
            files
                .slave
                .append_batch(&live, now, self.config.increase_size)?;
            files.slave.mark_as_master(now)?;
            files.master.switch_to_slave(now)?;
            files.slave.switch_to_master(now)?;
            std::mem::swap(&mut files.master, &mut files.slave);

            let swaps = self.swap_count.fetch_add(1, Ordering::Relaxed) + 1;
            report.swapped = true;
            report.records_after = live.len();
            report.transactions_dropped = deleted.len();
            report.bytes_after = files.master.used();

            info!(
                master = %files.master.path().display(),
                records_before = report.records_before,
                records_after = report.records_after,
                dropped = report.transactions_dropped,
                swaps,
                "[xa-01] Journal compacted"
            );
        }

        if self
            .config
            .exceeds_threshold(files.master.used(), files.master.record_capacity())
        {
            files.master.grow(self.config.increase_size)?;
            debug!(
                capacity = files.master.capacity(),
                "[xa-01] Journal still over threshold after compaction, grew master"
            );
        }

        Ok(report)
    }

    /// Rebuild the surviving archives from the master.
    pub fn replay(&self) -> Result<Vec<TransactionArchive>, JournalError> {
        let records = self.files.lock().master.read_records()?;
        let archives = replay_records(&records, |bytes| self.serializer.deserialize(bytes))?;
        Ok(archives)
    }

    pub fn stats(&self) -> JournalStats {
        let files = self.files.lock();
        JournalStats {
            master_path: files.master.path().to_path_buf(),
            used_bytes: files.master.used(),
            capacity_bytes: files.master.capacity(),
            swap_count: self.swap_count.load(Ordering::Relaxed),
        }
    }

    /// Flush both files. Best effort: failures are logged, not returned.
    pub fn close(&self) {
        let files = self.files.lock();
        for file in [&files.master, &files.slave] {
            if let Err(e) = file.sync() {
                warn!(path = %file.path().display(), error = %e, "[xa-01] Journal sync on close failed");
            }
        }
        debug!("[xa-01] Journal closed");
    }
}

impl<S, T> TransactionLogger for ArchiveJournal<S, T>
where
    S: ArchiveSerializer,
    T: TimeSource,
{
    fn create_transaction(&self, archive: &TransactionArchive) -> Result<(), JournalError> {
        let record = transaction_record(&self.serializer, JournalOperator::Create, archive)?;
        self.write(std::slice::from_ref(&record))
    }

    fn update_transaction(&self, archive: &TransactionArchive) -> Result<(), JournalError> {
        let record = transaction_record(&self.serializer, JournalOperator::Modify, archive)?;
        self.write(std::slice::from_ref(&record))
    }

    fn delete_transaction(&self, archive: &TransactionArchive) -> Result<(), JournalError> {
        let record = transaction_record(&self.serializer, JournalOperator::Delete, archive)?;
        self.write(std::slice::from_ref(&record))
    }

    fn update_resource(&self, archive: &ResourceArchive) -> Result<(), JournalError> {
        let record = resource_record(&self.serializer, archive)?;
        self.write(std::slice::from_ref(&record))
    }

    fn recover(&self, callback: &mut dyn RecoveryCallback) -> Result<usize, JournalError> {
        // The callback may write back to this journal; the lock is not held here.
        let archives = self.replay()?;
        let count = archives.len();
        for archive in archives {
            callback.recover(archive);
        }
        info!(count, "[xa-01] Journal replay complete");
        Ok(count)
    }
}
