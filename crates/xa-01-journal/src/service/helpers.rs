//! # Record Helpers
//!
//! Turn archives into journal records. Shared by the file journal and the
//! in-memory logger so both write the same stream.

use shared_types::{ResourceArchive, TransactionArchive};

use crate::domain::errors::JournalError;
use crate::domain::record::{ArchivePayload, JournalOperator, JournalRecord};
use crate::ports::outbound::ArchiveSerializer;

pub(crate) fn transaction_record<S: ArchiveSerializer + ?Sized>(
    serializer: &S,
    operator: JournalOperator,
    archive: &TransactionArchive,
) -> Result<JournalRecord, JournalError> {
    let payload = serializer.serialize(&ArchivePayload::Transaction(archive.clone()))?;
    Ok(JournalRecord::new(
        *archive.xid.global_transaction_id(),
        operator,
        payload,
    ))
}

/// Branch records are keyed by the global part of the branch xid.
pub(crate) fn resource_record<S: ArchiveSerializer + ?Sized>(
    serializer: &S,
    archive: &ResourceArchive,
) -> Result<JournalRecord, JournalError> {
    let payload = serializer.serialize(&ArchivePayload::Resource(archive.clone()))?;
    Ok(JournalRecord::new(
        *archive.xid.global_transaction_id(),
        JournalOperator::Modify,
        payload,
    ))
}
