//! # Archive Model
//!
//! Durable snapshots of a global transaction and its branches. These are the
//! only values the journal persists.
//!
//! ## Lifecycle
//!
//! ```text
//! enlist ──→ [in memory] ──first write──→ CREATE ──transitions──→ MODIFY ... ──terminal──→ DELETE
//! ```

use serde::{Deserialize, Serialize};

use crate::xid::Xid;

/// A branch's prepare-phase answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Vote {
    /// No prepare has completed yet.
    #[default]
    Unset,
    /// Prepared; a commit phase is required (`XA_OK`).
    Ok,
    /// Read-only; nothing to commit (`XA_RDONLY`).
    ReadOnly,
}

/// Transaction state machine.
///
/// ```text
/// ACTIVE ──→ PREPARING ──→ PREPARED ──→ COMMITTING ──→ COMMITTED
///   │            │
///   ├──→ MARKED_ROLLBACK ──┐
///   │            └─────────┴──→ ROLLING_BACK ──→ ROLLEDBACK
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TransactionStatus {
    #[default]
    Active,
    MarkedRollback,
    Preparing,
    Prepared,
    Committing,
    Committed,
    RollingBack,
    RolledBack,
    /// Outcome could not be classified; never persisted.
    Unknown,
}

impl TransactionStatus {
    /// Check if transition to `next` is valid.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        match (self, next) {
            (Active, Preparing | MarkedRollback | RollingBack | Committing | Committed) => true,
            (MarkedRollback, RollingBack) => true,
            (Preparing, Prepared | RollingBack | Committed) => true,
            (Prepared, Committing | RollingBack) => true,
            (Committing, Committed) => true,
            (RollingBack, RolledBack) => true,
            (_, Unknown) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Committed | TransactionStatus::RolledBack | TransactionStatus::Unknown
        )
    }

    /// True once the commit decision has been durably recorded.
    pub fn is_commit_decided(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Prepared | TransactionStatus::Committing | TransactionStatus::Committed
        )
    }
}

/// Commit strategy chosen for a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyType {
    Simple,
    Common,
    LastResourceOptimize,
}

/// One resource-manager branch of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceArchive {
    /// Branch xid.
    pub xid: Xid,
    pub vote: Vote,
    /// Identifier of the resource descriptor.
    pub identifier: String,
    /// True if the branch is fronted by a remote peer coordinator.
    pub remote: bool,
    pub delisted: bool,
    pub completed: bool,
    pub readonly: bool,
    pub committed: bool,
    pub rolledback: bool,
    pub heuristic: bool,
    pub identified: bool,
}

impl ResourceArchive {
    pub fn new(xid: Xid, identifier: impl Into<String>, remote: bool) -> Self {
        Self {
            xid,
            vote: Vote::Unset,
            identifier: identifier.into(),
            remote,
            delisted: false,
            completed: false,
            readonly: false,
            committed: false,
            rolledback: false,
            heuristic: false,
            identified: true,
        }
    }

    /// Both outcomes recorded on one branch.
    pub fn is_mixed(&self) -> bool {
        self.committed && self.rolledback
    }
}

/// Durable snapshot of one global transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionArchive {
    /// Global xid.
    pub xid: Xid,
    pub status: TransactionStatus,
    pub vote: Vote,
    /// True if this node coordinates the transaction.
    pub coordinator: bool,
    /// Peer that propagated the transaction here, if any.
    pub propagated_by: Option<String>,
    pub native_resources: Vec<ResourceArchive>,
    pub remote_resources: Vec<ResourceArchive>,
    pub optimized_resource: Option<ResourceArchive>,
    pub strategy_type: Option<StrategyType>,
    pub recovered_times: u32,
    pub recovered_at: u64,
}

impl TransactionArchive {
    pub fn new(xid: Xid, coordinator: bool) -> Self {
        Self {
            xid,
            status: TransactionStatus::Active,
            vote: Vote::Unset,
            coordinator,
            propagated_by: None,
            native_resources: Vec::new(),
            remote_resources: Vec::new(),
            optimized_resource: None,
            strategy_type: None,
            recovered_times: 0,
            recovered_at: 0,
        }
    }

    /// Replace the branch with the same xid, or append it to the list its
    /// `remote` flag selects. Returns true if an existing entry was replaced.
    pub fn upsert_resource(&mut self, resource: ResourceArchive) -> bool {
        if let Some(optimized) = self.optimized_resource.as_mut() {
            if optimized.xid == resource.xid {
                *optimized = resource.clone();
            }
        }

        let list = if resource.remote {
            &mut self.remote_resources
        } else {
            &mut self.native_resources
        };
        match list.iter_mut().find(|r| r.xid == resource.xid) {
            Some(existing) => {
                *existing = resource;
                true
            }
            None => {
                list.push(resource);
                false
            }
        }
    }

    /// Number of enlisted branches.
    pub fn resource_count(&self) -> usize {
        self.native_resources.len() + self.remote_resources.len()
    }

    /// Iterate all branches, native first.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceArchive> {
        self.native_resources.iter().chain(self.remote_resources.iter())
    }
}
