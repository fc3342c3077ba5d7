//! # In-Memory Logger
//!
//! Keeps the exact record stream a file journal would write and replays it
//! with the same two-pass algorithm. For unit tests.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use shared_types::{ResourceArchive, TransactionArchive};

use crate::adapters::serializer::BincodeArchiveSerializer;
use crate::domain::errors::JournalError;
use crate::domain::record::{JournalOperator, JournalRecord};
use crate::domain::replay::replay_records;
use crate::ports::inbound::{RecoveryCallback, TransactionLogger};
use crate::ports::outbound::ArchiveSerializer;
use crate::service::helpers::{resource_record, transaction_record};

/// Journal kept in a `Vec`.
#[derive(Debug, Default)]
pub struct InMemoryTransactionLogger {
    serializer: BincodeArchiveSerializer,
    records: Mutex<Vec<JournalRecord>>,
    fail_writes: AtomicBool,
}

impl InMemoryTransactionLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record written so far.
    pub fn records(&self) -> Vec<JournalRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Operators written for one global transaction, in order.
    pub fn operators_for(&self, archive_xid: &shared_types::Xid) -> Vec<JournalOperator> {
        let id = archive_xid.global_transaction_id();
        self.records
            .lock()
            .iter()
            .filter(|r| &r.global_id == id)
            .map(|r| r.operator)
            .collect()
    }

    /// Make every subsequent write fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn push(&self, record: JournalRecord) -> Result<(), JournalError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(JournalError::Io(std::io::Error::other("injected write failure")));
        }
        self.records.lock().push(record);
        Ok(())
    }
}

impl TransactionLogger for InMemoryTransactionLogger {
    fn create_transaction(&self, archive: &TransactionArchive) -> Result<(), JournalError> {
        self.push(transaction_record(&self.serializer, JournalOperator::Create, archive)?)
    }

    fn update_transaction(&self, archive: &TransactionArchive) -> Result<(), JournalError> {
        self.push(transaction_record(&self.serializer, JournalOperator::Modify, archive)?)
    }

    fn delete_transaction(&self, archive: &TransactionArchive) -> Result<(), JournalError> {
        self.push(transaction_record(&self.serializer, JournalOperator::Delete, archive)?)
    }

    fn update_resource(&self, archive: &ResourceArchive) -> Result<(), JournalError> {
        self.push(resource_record(&self.serializer, archive)?)
    }

    fn recover(&self, callback: &mut dyn RecoveryCallback) -> Result<usize, JournalError> {
        let records = self.records();
        let archives = replay_records(&records, |bytes| self.serializer.deserialize(bytes))?;
        let count = archives.len();
        for archive in archives {
            callback.recover(archive);
        }
        Ok(count)
    }
}
