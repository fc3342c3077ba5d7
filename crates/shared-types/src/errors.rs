//! # Error Types
//!
//! XA error codes raised by resource managers, and the coordinator-facing
//! error codes reported to peers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// XA return/error codes as defined by X/Open XA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum XaErrorCode {
    /// Branch was heuristically committed.
    HeuristicCommit,
    /// Branch was heuristically rolled back.
    HeuristicRollback,
    /// Branch was partly committed and partly rolled back.
    HeuristicMixed,
    /// Branch may have been heuristically completed.
    HeuristicHazard,
    /// Branch was read-only and has been committed.
    ReadOnly,
    /// Rollback code range (`XA_RB*`): the branch was rolled back.
    RolledBack(RollbackReason),
    /// `XAER_RMERR`: an error occurred in the resource manager.
    ResourceManagerError,
    /// `XAER_RMFAIL`: resource manager unavailable (transport/unknown).
    ResourceManagerFail,
    /// `XAER_NOTA`: the xid is not known by the resource manager.
    NotFound,
    /// `XAER_INVAL`: invalid arguments.
    Invalid,
    /// `XAER_PROTO`: routine invoked in an improper context.
    Protocol,
    /// `XAER_DUPID`: the xid already exists.
    DuplicateId,
    /// `XAER_OUTSIDE`: the resource manager is doing work outside the transaction.
    Outside,
}

/// Reasons carried by the `XA_RB*` code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RollbackReason {
    Unspecified,
    CommunicationFailure,
    Deadlock,
    Integrity,
    Other,
    Protocol,
    Timeout,
    Transient,
}

impl XaErrorCode {
    /// Numeric XA value of this code.
    pub fn as_i32(&self) -> i32 {
        match self {
            XaErrorCode::HeuristicHazard => 8,
            XaErrorCode::HeuristicCommit => 7,
            XaErrorCode::HeuristicRollback => 6,
            XaErrorCode::HeuristicMixed => 5,
            XaErrorCode::ReadOnly => 3,
            XaErrorCode::RolledBack(reason) => 100 + *reason as i32,
            XaErrorCode::ResourceManagerError => -3,
            XaErrorCode::NotFound => -4,
            XaErrorCode::Invalid => -5,
            XaErrorCode::Protocol => -6,
            XaErrorCode::ResourceManagerFail => -7,
            XaErrorCode::DuplicateId => -8,
            XaErrorCode::Outside => -9,
        }
    }

    /// True for the `XA_RB*` range.
    pub fn is_rollback(&self) -> bool {
        matches!(self, XaErrorCode::RolledBack(_))
    }
}

/// Error raised by a resource descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("XA error {code:?} ({}): {message}", code.as_i32())]
pub struct XaException {
    pub code: XaErrorCode,
    pub message: String,
}

impl XaException {
    pub fn new(code: XaErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Shorthand for an error carrying only a code.
    pub fn code(code: XaErrorCode) -> Self {
        Self::new(code, "")
    }
}

/// Error codes of the coordinator-facing protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinatorErrorCode {
    HeuristicCommit,
    HeuristicRollback,
    HeuristicMixed,
    HeuristicHazard,
    ReadOnly,
    ResourceManagerError,
    ResourceManagerFail,
}

/// Scan flags for `recover`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverFlags(pub u32);

impl RecoverFlags {
    pub const TMNOFLAGS: RecoverFlags = RecoverFlags(0);
    pub const TMENDRSCAN: RecoverFlags = RecoverFlags(0x0080_0000);
    pub const TMSTARTRSCAN: RecoverFlags = RecoverFlags(0x0100_0000);

    pub fn contains(&self, other: RecoverFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if this scan should return results (start of scan or no flags).
    pub fn returns_results(&self) -> bool {
        self.contains(Self::TMSTARTRSCAN) || *self == Self::TMNOFLAGS
    }
}

/// Flags passed to a resource when a branch association starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartFlag {
    /// New branch.
    NoFlags,
    /// Resume a suspended association.
    Resume,
}

/// Flags accepted by `delist`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelistFlag {
    /// Work completed normally.
    Success,
    /// Work failed; the transaction can only roll back.
    Fail,
    /// Association is suspended and will be resumed.
    Suspend,
}
