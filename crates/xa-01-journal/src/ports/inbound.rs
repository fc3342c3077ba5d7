//! # Inbound Ports (Driving Ports)
//!
//! What the journal offers to the transaction engine.

use shared_types::{ResourceArchive, TransactionArchive};

use crate::domain::errors::JournalError;

/// Durable log of archive mutations.
///
/// Production: `ArchiveJournal` (dual-file, compacting).
/// Testing: `InMemoryTransactionLogger`.
///
/// No call returns before its record is durable.
pub trait TransactionLogger: Send + Sync {
    /// Record the first durable snapshot of a transaction.
    fn create_transaction(&self, archive: &TransactionArchive) -> Result<(), JournalError>;

    /// Record a new snapshot after a state transition.
    fn update_transaction(&self, archive: &TransactionArchive) -> Result<(), JournalError>;

    /// Record that the transaction is fully resolved.
    fn delete_transaction(&self, archive: &TransactionArchive) -> Result<(), JournalError>;

    /// Record a single branch mutation.
    fn update_resource(&self, archive: &ResourceArchive) -> Result<(), JournalError>;

    /// Replay the log and hand every surviving transaction to `callback`.
    ///
    /// Returns the number of archives handed over.
    fn recover(&self, callback: &mut dyn RecoveryCallback) -> Result<usize, JournalError>;
}

/// Receives each transaction reconstructed from the log.
pub trait RecoveryCallback {
    fn recover(&mut self, archive: TransactionArchive);
}

impl<F> RecoveryCallback for F
where
    F: FnMut(TransactionArchive),
{
    fn recover(&mut self, archive: TransactionArchive) {
        self(archive)
    }
}
