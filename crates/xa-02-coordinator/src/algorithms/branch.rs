//! # Enlisted Branch
//!
//! A live descriptor plus the `ResourceArchive` it drives. Every mutation of
//! the archive happens under its own lock, held across the resource call, so
//! concurrent completion attempts on one branch cannot interleave.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use shared_types::{
    DelistFlag, ResourceArchive, StartFlag, Vote, XaErrorCode, XaException, Xid,
};
use tracing::warn;

use crate::domain::{is_heuristic_code, BranchOutcome};
use crate::ports::outbound::XaResourceDescriptor;

/// One branch of a global transaction.
pub struct EnlistedResource {
    descriptor: Arc<dyn XaResourceDescriptor>,
    archive: Mutex<ResourceArchive>,
    suspended: AtomicBool,
    /// Bound to a stand-in because no resource was registered at replay.
    placeholder: bool,
}

impl std::fmt::Debug for EnlistedResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnlistedResource")
            .field("archive", &*self.archive.lock())
            .finish()
    }
}

impl EnlistedResource {
    pub fn new(descriptor: Arc<dyn XaResourceDescriptor>, branch_xid: Xid) -> Self {
        let archive = ResourceArchive::new(
            branch_xid,
            descriptor.identifier(),
            descriptor.is_remote(),
        );
        Self::from_archive(descriptor, archive)
    }

    /// Rebind a journaled branch to a live descriptor.
    pub fn from_archive(descriptor: Arc<dyn XaResourceDescriptor>, archive: ResourceArchive) -> Self {
        Self {
            descriptor,
            archive: Mutex::new(archive),
            suspended: AtomicBool::new(false),
            placeholder: false,
        }
    }

    /// Journaled branch bound to a stand-in until its resource registers.
    pub fn placeholder(descriptor: Arc<dyn XaResourceDescriptor>, archive: ResourceArchive) -> Self {
        Self {
            placeholder: true,
            ..Self::from_archive(descriptor, archive)
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn descriptor(&self) -> &Arc<dyn XaResourceDescriptor> {
        &self.descriptor
    }

    pub fn xid(&self) -> Xid {
        self.archive.lock().xid
    }

    pub fn snapshot(&self) -> ResourceArchive {
        self.archive.lock().clone()
    }

    pub fn is_remote(&self) -> bool {
        self.archive.lock().remote
    }

    pub fn is_same_rm(&self, other: &dyn XaResourceDescriptor) -> bool {
        self.descriptor.is_same_rm(other)
    }

    pub fn is_delisted(&self) -> bool {
        self.archive.lock().delisted
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    pub fn is_heuristic(&self) -> bool {
        self.archive.lock().heuristic
    }

    /// Start the association with a new branch.
    pub fn start(&self) -> Result<(), XaException> {
        let archive = self.archive.lock();
        self.descriptor.start(&archive.xid, StartFlag::NoFlags)
    }

    /// End or suspend the association.
    pub fn end(&self, flag: DelistFlag) -> Result<(), XaException> {
        let mut archive = self.archive.lock();
        let result = self.descriptor.end(&archive.xid, flag);
        match flag {
            DelistFlag::Success | DelistFlag::Fail => {
                archive.delisted = true;
                self.suspended.store(false, Ordering::SeqCst);
            }
            DelistFlag::Suspend => self.suspended.store(true, Ordering::SeqCst),
        }
        result
    }

    /// Resume a suspended association.
    pub fn resume(&self) -> Result<(), XaException> {
        let archive = self.archive.lock();
        self.descriptor.start(&archive.xid, StartFlag::Resume)?;
        self.suspended.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Prepare once; later calls return the cached vote.
    pub fn prepare(&self) -> Result<Vote, XaException> {
        let mut archive = self.archive.lock();
        if archive.vote != Vote::Unset {
            return Ok(archive.vote);
        }

        let vote = self.descriptor.prepare(&archive.xid)?;
        archive.vote = vote;
        if vote == Vote::ReadOnly {
            archive.readonly = true;
            archive.completed = true;
        }
        Ok(vote)
    }

    /// Commit unless already completed.
    pub fn commit(&self, one_phase: bool) -> BranchOutcome {
        let mut archive = self.archive.lock();
        if let Some(outcome) = settled(&archive) {
            return outcome;
        }

        let result = self.descriptor.commit(&archive.xid, one_phase);
        let outcome = BranchOutcome::of_commit(&result);
        self.apply(&mut archive, outcome, &result, XaErrorCode::HeuristicCommit);
        outcome
    }

    /// Roll back unless already completed.
    pub fn rollback(&self) -> BranchOutcome {
        let mut archive = self.archive.lock();
        if let Some(outcome) = settled(&archive) {
            return outcome;
        }

        let result = self.descriptor.rollback(&archive.xid);
        let outcome = BranchOutcome::of_rollback(&result);
        self.apply(&mut archive, outcome, &result, XaErrorCode::HeuristicRollback);
        outcome
    }

    /// Tell the resource manager to discard a heuristic outcome.
    ///
    /// Returns false if the branch had nothing to forget.
    pub fn forget(&self) -> Result<bool, XaException> {
        let mut archive = self.archive.lock();
        if !archive.heuristic {
            return Ok(false);
        }
        self.descriptor.forget(&archive.xid)?;
        archive.heuristic = false;
        Ok(true)
    }

    fn apply(
        &self,
        archive: &mut ResourceArchive,
        outcome: BranchOutcome,
        result: &Result<(), XaException>,
        agreeing_heuristic: XaErrorCode,
    ) {
        match outcome {
            BranchOutcome::Committed => archive.committed = true,
            BranchOutcome::RolledBack => archive.rolledback = true,
            BranchOutcome::Mixed => {
                archive.committed = true;
                archive.rolledback = true;
            }
            BranchOutcome::ReadOnly => archive.readonly = true,
            BranchOutcome::Unfinished | BranchOutcome::Error => {}
        }
        if !outcome.is_final() {
            return;
        }
        archive.completed = true;

        let code = match result {
            Err(e) if is_heuristic_code(e.code) => e.code,
            _ => return,
        };
        if code == agreeing_heuristic {
            // Outcome matches the decision; nothing to report.
            if let Err(e) = self.descriptor.forget(&archive.xid) {
                warn!(xid = %archive.xid, error = %e, "[xa-02] Forget after agreeing heuristic failed");
            }
        } else {
            archive.heuristic = true;
        }
    }
}

/// Outcome of a branch that needs no further completion call.
fn settled(archive: &ResourceArchive) -> Option<BranchOutcome> {
    if !archive.completed {
        return None;
    }
    Some(if archive.is_mixed() {
        BranchOutcome::Mixed
    } else if archive.committed {
        BranchOutcome::Committed
    } else if archive.rolledback {
        BranchOutcome::RolledBack
    } else {
        BranchOutcome::ReadOnly
    })
}
