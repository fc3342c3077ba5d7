//! # Value Objects
//!
//! Branch outcome classification and the aggregation table that turns
//! branch outcomes into one transaction-level result.
//!
//! ## Aggregation
//!
//! | committed | rolledback | unfinished | error | commit path | rollback path |
//! |---|---|---|---|---|---|
//! | true | true | - | - | HeuristicMixed | HeuristicMixed |
//! | - | - | true | - | HeuristicHazard | HeuristicHazard |
//! | - | - | - | true | SystemError | SystemError |
//! | false | true | false | false | HeuristicRollback | Ok |
//! | true | false | false | false | Ok | HeuristicCommit |
//! | false | false | false | false | Ok | Ok |

use shared_types::{XaErrorCode, XaException};

use super::errors::TransactionError;

/// Outcome of completing one branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchOutcome {
    ReadOnly,
    Committed,
    RolledBack,
    Mixed,
    /// Transport failure or hazard; fate unknown.
    Unfinished,
    /// Resource manager error.
    Error,
}

impl BranchOutcome {
    /// Classify the result of a branch commit.
    pub fn of_commit(result: &Result<(), XaException>) -> Self {
        match result {
            Ok(()) => BranchOutcome::Committed,
            Err(e) => match e.code {
                XaErrorCode::HeuristicCommit | XaErrorCode::NotFound => BranchOutcome::Committed,
                XaErrorCode::ReadOnly => BranchOutcome::ReadOnly,
                XaErrorCode::HeuristicRollback | XaErrorCode::RolledBack(_) => {
                    BranchOutcome::RolledBack
                }
                XaErrorCode::HeuristicMixed => BranchOutcome::Mixed,
                XaErrorCode::HeuristicHazard | XaErrorCode::ResourceManagerFail => {
                    BranchOutcome::Unfinished
                }
                _ => BranchOutcome::Error,
            },
        }
    }

    /// Classify the result of a branch rollback.
    pub fn of_rollback(result: &Result<(), XaException>) -> Self {
        match result {
            Ok(()) => BranchOutcome::RolledBack,
            Err(e) => match e.code {
                XaErrorCode::HeuristicRollback
                | XaErrorCode::RolledBack(_)
                | XaErrorCode::NotFound => BranchOutcome::RolledBack,
                XaErrorCode::ReadOnly => BranchOutcome::ReadOnly,
                XaErrorCode::HeuristicCommit => BranchOutcome::Committed,
                XaErrorCode::HeuristicMixed => BranchOutcome::Mixed,
                XaErrorCode::HeuristicHazard | XaErrorCode::ResourceManagerFail => {
                    BranchOutcome::Unfinished
                }
                _ => BranchOutcome::Error,
            },
        }
    }

    /// True once the branch needs no further completion call.
    pub fn is_final(&self) -> bool {
        !matches!(self, BranchOutcome::Unfinished | BranchOutcome::Error)
    }
}

/// True for codes after which the resource manager keeps state until `forget`.
pub fn is_heuristic_code(code: XaErrorCode) -> bool {
    matches!(
        code,
        XaErrorCode::HeuristicCommit
            | XaErrorCode::HeuristicRollback
            | XaErrorCode::HeuristicMixed
            | XaErrorCode::HeuristicHazard
    )
}

/// Aggregated branch outcomes of one completion attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeFlags {
    pub committed: bool,
    pub rolledback: bool,
    pub mixed: bool,
    pub unfinished: bool,
    pub error: bool,
}

impl OutcomeFlags {
    pub fn record(&mut self, outcome: BranchOutcome) {
        match outcome {
            BranchOutcome::ReadOnly => {}
            BranchOutcome::Committed => self.committed = true,
            BranchOutcome::RolledBack => self.rolledback = true,
            BranchOutcome::Mixed => self.mixed = true,
            BranchOutcome::Unfinished => self.unfinished = true,
            BranchOutcome::Error => self.error = true,
        }
    }

    pub fn merge(self, other: OutcomeFlags) -> OutcomeFlags {
        OutcomeFlags {
            committed: self.committed || other.committed,
            rolledback: self.rolledback || other.rolledback,
            mixed: self.mixed || other.mixed,
            unfinished: self.unfinished || other.unfinished,
            error: self.error || other.error,
        }
    }

    /// Both outcomes present anywhere.
    pub fn is_mixed(&self) -> bool {
        self.mixed || (self.committed && self.rolledback)
    }

    /// Everything that completed, committed.
    pub fn is_clean_commit(&self) -> bool {
        !self.rolledback && !self.mixed && !self.unfinished && !self.error
    }

    /// Everything that completed, rolled back.
    pub fn is_clean_rollback(&self) -> bool {
        !self.committed && !self.mixed && !self.unfinished && !self.error
    }

    /// Resolve a commit attempt.
    pub fn resolve_commit(&self) -> Result<(), TransactionError> {
        if self.is_mixed() {
            Err(TransactionError::HeuristicMixed)
        } else if self.unfinished {
            Err(TransactionError::HeuristicHazard(
                "commit outcome of a branch is unknown".to_string(),
            ))
        } else if self.error {
            Err(TransactionError::SystemError(
                "resource manager error during commit".to_string(),
            ))
        } else if self.rolledback {
            Err(TransactionError::HeuristicRollback)
        } else {
            Ok(())
        }
    }

    /// Resolve a rollback attempt. A committed-only aggregate is surfaced as
    /// `HeuristicCommit`.
    pub fn resolve_rollback(&self) -> Result<(), TransactionError> {
        if self.is_mixed() {
            Err(TransactionError::HeuristicMixed)
        } else if self.unfinished {
            Err(TransactionError::HeuristicHazard(
                "rollback outcome of a branch is unknown".to_string(),
            ))
        } else if self.error {
            Err(TransactionError::SystemError(
                "resource manager error during rollback".to_string(),
            ))
        } else if self.committed {
            Err(TransactionError::HeuristicCommit)
        } else {
            Ok(())
        }
    }
}
