//! # Domain Invariants
//!
//! Rules that must hold for every archive the coordinator persists.

use shared_types::{TransactionArchive, TransactionStatus};

use super::errors::TransactionError;

/// Invariant: status only moves along the state machine.
pub fn invariant_valid_transition(
    from: TransactionStatus,
    to: TransactionStatus,
) -> Result<(), TransactionError> {
    if from == to || from.can_transition_to(to) {
        Ok(())
    } else {
        Err(TransactionError::Protocol(format!(
            "invalid status transition {from:?} -> {to:?}"
        )))
    }
}

/// Invariant: a branch with both outcomes is flagged heuristic.
pub fn invariant_mixed_is_heuristic(archive: &TransactionArchive) -> Result<(), TransactionError> {
    match archive.resources().find(|r| r.is_mixed() && !r.heuristic) {
        Some(branch) => Err(TransactionError::Protocol(format!(
            "branch {} committed and rolled back without a heuristic flag",
            branch.xid
        ))),
        None => Ok(()),
    }
}

/// Invariant: `Unknown` is a reporting state and never reaches the journal.
pub fn invariant_persistable_status(archive: &TransactionArchive) -> Result<(), TransactionError> {
    if archive.status == TransactionStatus::Unknown {
        return Err(TransactionError::Protocol(format!(
            "transaction {} cannot be persisted with status Unknown",
            archive.xid
        )));
    }
    Ok(())
}
