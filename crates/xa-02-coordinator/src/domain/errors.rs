//! # Domain Errors
//!
//! Transaction-boundary error taxonomy. Per-branch XA failures are classified
//! inside the terminators and surface here as exactly one variant.

use shared_types::{CoordinatorErrorCode, TransactionStatus, Xid};
use thiserror::Error;
use xa_01_journal::JournalError;

/// Outcome of a coordinator operation that did not complete as requested.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Prepare failed; every branch has been (or must be) rolled back.
    #[error("Rollback required: {0}")]
    RollbackRequired(String),

    /// The commit decision is durable; rollback is refused.
    #[error("Commit required")]
    CommitRequired,

    /// A rollback was requested but branches committed.
    #[error("Heuristic commit")]
    HeuristicCommit,

    /// A commit was requested but branches rolled back.
    #[error("Heuristic rollback")]
    HeuristicRollback,

    /// Some branches committed and some rolled back.
    #[error("Heuristic mixed outcome")]
    HeuristicMixed,

    /// A branch's fate could not be determined; recovery retries it.
    #[error("Heuristic hazard: {0}")]
    HeuristicHazard(String),

    /// A resource manager reported an error.
    #[error("System error: {0}")]
    SystemError(String),

    /// Journal write failed on the primary path.
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    /// No such transaction.
    #[error("Transaction not found: {0}")]
    NotFound(Xid),

    /// Operation not valid in the current status.
    #[error("Illegal state: cannot {operation} in {status:?}")]
    IllegalState {
        /// Current status
        status: TransactionStatus,
        /// Attempted operation
        operation: &'static str,
    },

    /// Protocol misuse by the caller.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl TransactionError {
    /// Error code reported over the coordinator-facing protocol.
    pub fn code(&self) -> CoordinatorErrorCode {
        match self {
            TransactionError::HeuristicCommit => CoordinatorErrorCode::HeuristicCommit,
            TransactionError::HeuristicRollback => CoordinatorErrorCode::HeuristicRollback,
            TransactionError::HeuristicMixed => CoordinatorErrorCode::HeuristicMixed,
            TransactionError::HeuristicHazard(_) => CoordinatorErrorCode::HeuristicHazard,
            TransactionError::Journal(_) => CoordinatorErrorCode::ResourceManagerFail,
            TransactionError::RollbackRequired(_)
            | TransactionError::CommitRequired
            | TransactionError::SystemError(_)
            | TransactionError::NotFound(_)
            | TransactionError::IllegalState { .. }
            | TransactionError::Protocol(_) => CoordinatorErrorCode::ResourceManagerError,
        }
    }

    /// True for outcomes that need `forget` or recovery.
    pub fn is_heuristic(&self) -> bool {
        matches!(
            self,
            TransactionError::HeuristicCommit
                | TransactionError::HeuristicRollback
                | TransactionError::HeuristicMixed
                | TransactionError::HeuristicHazard(_)
        )
    }

    pub fn illegal_state(status: TransactionStatus, operation: &'static str) -> Self {
        TransactionError::IllegalState { status, operation }
    }
}
