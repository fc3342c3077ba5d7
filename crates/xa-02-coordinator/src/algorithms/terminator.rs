//! # Resource Terminator
//!
//! Owns the branches of one resource group (native or remote) and drives
//! them through prepare, commit and rollback.
//!
//! Commit and rollback never stop early: every branch is given its chance
//! to complete, and each outcome lands in `OutcomeFlags`.

use std::sync::Arc;

use shared_types::{DelistFlag, ResourceArchive, Vote, XaException, Xid};
use tracing::{debug, warn};
use xa_01_journal::TransactionLogger;

use super::branch::EnlistedResource;
use crate::domain::{BranchOutcome, OutcomeFlags, TransactionError};
use crate::ports::outbound::XaResourceDescriptor;

/// Branches of one resource group.
#[derive(Debug, Default)]
pub struct ResourceTerminator {
    resources: Vec<Arc<EnlistedResource>>,
}

impl ResourceTerminator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start and add a branch unless the same resource manager is already
    /// enlisted. A branch whose `start` fails is not added.
    ///
    /// `branch_xid` is only called for a new branch.
    pub fn enlist<F>(
        &mut self,
        descriptor: Arc<dyn XaResourceDescriptor>,
        branch_xid: F,
    ) -> Result<Option<Arc<EnlistedResource>>, XaException>
    where
        F: FnOnce() -> Xid,
    {
        if self.find_same_rm(descriptor.as_ref()).is_some() {
            return Ok(None);
        }
        let resource = Arc::new(EnlistedResource::new(descriptor, branch_xid()));
        resource.start()?;
        self.resources.push(resource.clone());
        Ok(Some(resource))
    }

    /// Add a branch rebuilt from the journal.
    pub fn restore(&mut self, resource: EnlistedResource) {
        self.resources.push(Arc::new(resource));
    }

    /// Swap placeholder branches for the descriptors `resolve` now knows.
    /// Branch state carries over. Returns the number rebound.
    pub fn rebind<F>(&mut self, mut resolve: F) -> usize
    where
        F: FnMut(&ResourceArchive) -> Option<Arc<dyn XaResourceDescriptor>>,
    {
        let mut rebound = 0;
        for slot in self.resources.iter_mut().filter(|r| r.is_placeholder()) {
            let archive = slot.snapshot();
            if let Some(descriptor) = resolve(&archive) {
                *slot = Arc::new(EnlistedResource::from_archive(descriptor, archive));
                rebound += 1;
            }
        }
        rebound
    }

    pub fn find_same_rm(&self, descriptor: &dyn XaResourceDescriptor) -> Option<&Arc<EnlistedResource>> {
        self.resources.iter().find(|r| r.is_same_rm(descriptor))
    }

    pub fn find(&self, branch_xid: &Xid) -> Option<&Arc<EnlistedResource>> {
        self.resources.iter().find(|r| &r.xid() == branch_xid)
    }

    pub fn resources(&self) -> &[Arc<EnlistedResource>] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn snapshots(&self) -> Vec<ResourceArchive> {
        self.resources.iter().map(|r| r.snapshot()).collect()
    }

    pub fn has_heuristic(&self) -> bool {
        self.resources.iter().any(|r| r.is_heuristic())
    }

    /// End every still-associated branch with `flag`.
    ///
    /// Returns false if any resource rejected the call.
    pub fn end_all(&self, flag: DelistFlag) -> bool {
        let mut ok = true;
        for resource in self.resources.iter().filter(|r| !r.is_delisted()) {
            if let Err(e) = resource.end(flag) {
                warn!(xid = %resource.xid(), error = %e, "[xa-02] Failed to end branch");
                ok = false;
            }
        }
        ok
    }

    /// Prepare every branch. The first failure stops the prepare.
    ///
    /// All branches read-only gives `ReadOnly`, otherwise `Ok`.
    pub fn prepare(&self, logger: &dyn TransactionLogger) -> Result<Vote, TransactionError> {
        let mut all_readonly = true;
        for resource in &self.resources {
            let vote = resource.prepare().map_err(|e| {
                TransactionError::RollbackRequired(format!(
                    "branch {} failed to prepare: {e}",
                    resource.xid()
                ))
            })?;
            logger.update_resource(&resource.snapshot())?;
            debug!(xid = %resource.xid(), ?vote, "[xa-02] Branch prepared");
            all_readonly &= vote == Vote::ReadOnly;
        }
        Ok(if all_readonly { Vote::ReadOnly } else { Vote::Ok })
    }

    pub fn commit(&self, one_phase: bool, logger: &dyn TransactionLogger) -> OutcomeFlags {
        self.complete(logger, "commit", |r| r.commit(one_phase))
    }

    pub fn rollback(&self, logger: &dyn TransactionLogger) -> OutcomeFlags {
        self.complete(logger, "rollback", |r| r.rollback())
    }

    /// Forget every heuristic branch. Returns the number forgotten.
    pub fn forget(&self, logger: &dyn TransactionLogger) -> Result<usize, TransactionError> {
        let mut forgotten = 0;
        for resource in &self.resources {
            let cleared = resource.forget().map_err(|e| {
                TransactionError::SystemError(format!("forget of {} failed: {e}", resource.xid()))
            })?;
            if cleared {
                logger.update_resource(&resource.snapshot())?;
                forgotten += 1;
            }
        }
        Ok(forgotten)
    }

    fn complete<F>(&self, logger: &dyn TransactionLogger, verb: &str, mut op: F) -> OutcomeFlags
    where
        F: FnMut(&EnlistedResource) -> BranchOutcome,
    {
        let mut flags = OutcomeFlags::default();
        for resource in &self.resources {
            let outcome = op(resource);
            flags.record(outcome);

            match outcome {
                BranchOutcome::Unfinished | BranchOutcome::Error => warn!(
                    xid = %resource.xid(),
                    ?outcome,
                    "[xa-02] Branch {} did not complete", verb
                ),
                _ => debug!(xid = %resource.xid(), ?outcome, "[xa-02] Branch {} done", verb),
            }

            if let Err(e) = logger.update_resource(&resource.snapshot()) {
                warn!(xid = %resource.xid(), error = %e, "[xa-02] Failed to journal branch outcome");
                flags.unfinished = true;
            }
        }
        flags
    }
}
