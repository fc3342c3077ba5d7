//! # Commit Strategies
//!
//! How prepare, commit and rollback are sequenced across the native and
//! remote resource groups. Chosen once per transaction from the topology.
//!
//! | Topology | Strategy |
//! |---|---|
//! | one group non-empty | Simple |
//! | 1 native + ≥1 remote | LastResourceOptimize (native = one, remote = two) |
//! | ≥2 native + ≥1 remote | Common |
//!
//! Last-Resource-Optimize commits terminator one in a single phase during
//! prepare. If terminator two later rolls back, the outcome is mixed and is
//! always reported as such.

use shared_types::{StrategyType, Vote};
use tracing::{debug, error};
use xa_01_journal::TransactionLogger;

use super::terminator::ResourceTerminator;
use crate::domain::TransactionError;

/// A strategy bound to the terminators it drives.
#[derive(Debug, Clone, Copy)]
pub enum CommitStrategy<'a> {
    Simple(&'a ResourceTerminator),
    Common {
        native: &'a ResourceTerminator,
        remote: &'a ResourceTerminator,
    },
    LastResourceOptimize {
        one: &'a ResourceTerminator,
        two: &'a ResourceTerminator,
    },
}

impl<'a> CommitStrategy<'a> {
    /// Strategy for the current topology.
    pub fn choose(native: &ResourceTerminator, remote: &ResourceTerminator) -> StrategyType {
        match (native.len(), remote.len()) {
            (1, r) if r >= 1 => StrategyType::LastResourceOptimize,
            (n, r) if n >= 2 && r >= 1 => StrategyType::Common,
            _ => StrategyType::Simple,
        }
    }

    /// Bind a (possibly persisted) strategy type to the terminators.
    ///
    /// A type that no longer fits the topology falls back to Common, which
    /// drives both groups.
    pub fn bind(
        kind: StrategyType,
        native: &'a ResourceTerminator,
        remote: &'a ResourceTerminator,
    ) -> Self {
        match kind {
            StrategyType::Simple if remote.is_empty() => CommitStrategy::Simple(native),
            StrategyType::Simple if native.is_empty() => CommitStrategy::Simple(remote),
            StrategyType::LastResourceOptimize if native.len() == 1 => {
                CommitStrategy::LastResourceOptimize {
                    one: native,
                    two: remote,
                }
            }
            _ => CommitStrategy::Common { native, remote },
        }
    }

    pub fn kind(&self) -> StrategyType {
        match self {
            CommitStrategy::Simple(_) => StrategyType::Simple,
            CommitStrategy::Common { .. } => StrategyType::Common,
            CommitStrategy::LastResourceOptimize { .. } => StrategyType::LastResourceOptimize,
        }
    }

    pub fn prepare(&self, logger: &dyn TransactionLogger) -> Result<Vote, TransactionError> {
        match self {
            CommitStrategy::Simple(terminator) => terminator.prepare(logger),
            CommitStrategy::Common { native, remote } => {
                let native_vote = native.prepare(logger)?;
                let remote_vote = remote.prepare(logger)?;
                if native_vote == Vote::ReadOnly && remote_vote == Vote::ReadOnly {
                    Ok(Vote::ReadOnly)
                } else {
                    Ok(Vote::Ok)
                }
            }
            CommitStrategy::LastResourceOptimize { one, two } => {
                let vote_two = two.prepare(logger)?;
                let flags_one = one.commit(true, logger);
                debug!(?flags_one, "[xa-02] Last resource committed during prepare");

                if flags_one.is_clean_commit() {
                    Ok(vote_two)
                } else if flags_one.is_clean_rollback() {
                    Err(TransactionError::RollbackRequired(
                        "last resource rolled back".to_string(),
                    ))
                } else {
                    // Fate of the last resource is unknown or partial.
                    Err(flags_one.resolve_commit().err().unwrap_or_else(|| {
                        TransactionError::HeuristicHazard("last resource outcome unknown".into())
                    }))
                }
            }
        }
    }

    pub fn commit(&self, logger: &dyn TransactionLogger) -> Result<(), TransactionError> {
        let flags = match self {
            CommitStrategy::Simple(terminator) => terminator.commit(false, logger),
            CommitStrategy::Common { native, remote } => {
                let native_flags = native.commit(false, logger);
                native_flags.merge(remote.commit(false, logger))
            }
            CommitStrategy::LastResourceOptimize { one, two } => {
                // Terminator one completed during prepare; this only re-reads it.
                let flags_two = two.commit(false, logger);
                one.commit(true, logger).merge(flags_two)
            }
        };

        let result = flags.resolve_commit();
        if let Err(e) = &result {
            error!(strategy = ?self.kind(), ?flags, error = %e, "[xa-02] Commit did not resolve cleanly");
        }
        result
    }

    pub fn rollback(&self, logger: &dyn TransactionLogger) -> Result<(), TransactionError> {
        let flags = match self {
            CommitStrategy::Simple(terminator) => terminator.rollback(logger),
            CommitStrategy::Common { native, remote } => {
                let native_flags = native.rollback(logger);
                native_flags.merge(remote.rollback(logger))
            }
            CommitStrategy::LastResourceOptimize { one, two } => {
                let flags_one = one.rollback(logger);
                let flags_two = two.rollback(logger);
                let mixed_exists = (flags_one.committed && flags_two.rolledback)
                    || (flags_one.rolledback && flags_two.committed);
                if mixed_exists {
                    error!("[xa-02] Last resource committed while the rest rolled back");
                    return Err(TransactionError::HeuristicMixed);
                }
                flags_one.merge(flags_two)
            }
        };

        let result = flags.resolve_rollback();
        if let Err(e) = &result {
            error!(strategy = ?self.kind(), ?flags, error = %e, "[xa-02] Rollback did not resolve cleanly");
        }
        result
    }
}
