//! # Transaction Coordinator
//!
//! The state machine of one global transaction.
//!
//! ```text
//! ACTIVE ──→ PREPARING ──→ PREPARED ──→ COMMITTING ──→ COMMITTED
//!   │            │             │
//!   ├──→ MARKED_ROLLBACK ──────┴──→ ROLLING_BACK ──→ ROLLEDBACK
//! ```
//!
//! ## Journaling
//!
//! | Moment | Record |
//! |---|---|
//! | first transition out of ACTIVE that needs durability | CREATE |
//! | every later transition, every branch outcome | MODIFY |
//! | clean terminal outcome, or `forget` | DELETE |
//!
//! A transaction that rolls back without ever preparing is not journaled
//! unless a branch reports a heuristic or the outcome is unknown. Branch
//! updates for such a transaction go nowhere.
//!
//! All operations on one transaction are serialized by its state lock, which
//! is held across resource calls.

use std::sync::Arc;

use parking_lot::Mutex;
use shared_types::{
    current_time_millis, DelistFlag, ResourceArchive, StrategyType, TransactionArchive,
    TransactionContext, TransactionStatus, Vote, XidFactory, Xid,
};
use tracing::{debug, error, info, warn};
use xa_01_journal::{JournalError, RecoveryCallback, TransactionLogger};

use super::listener::ListenerChain;
use crate::adapters::UnresolvedResource;
use crate::algorithms::{CommitStrategy, EnlistedResource, ResourceTerminator};
use crate::domain::{
    invariant_mixed_is_heuristic, invariant_persistable_status, invariant_valid_transition,
    TransactionError,
};
use crate::ports::outbound::{ResourceResolver, XaResourceDescriptor};

/// Sink for branch updates of a transaction that has no journal archive.
struct Unjournaled;

impl TransactionLogger for Unjournaled {
    fn create_transaction(&self, _archive: &TransactionArchive) -> Result<(), JournalError> {
        Ok(())
    }

    fn update_transaction(&self, _archive: &TransactionArchive) -> Result<(), JournalError> {
        Ok(())
    }

    fn delete_transaction(&self, _archive: &TransactionArchive) -> Result<(), JournalError> {
        Ok(())
    }

    fn update_resource(&self, _archive: &ResourceArchive) -> Result<(), JournalError> {
        Ok(())
    }

    fn recover(&self, _callback: &mut dyn RecoveryCallback) -> Result<usize, JournalError> {
        Ok(0)
    }
}

#[derive(Debug)]
struct CoordinatorState {
    status: TransactionStatus,
    vote: Vote,
    native: ResourceTerminator,
    remote: ResourceTerminator,
    strategy_type: Option<StrategyType>,
    /// Branch committed in one phase: the last resource, or the only one.
    optimized: Option<Xid>,
    /// A CREATE has been written and no DELETE since.
    journaled: bool,
    /// Last completion attempt could not be classified.
    hazard: bool,
    recovered_times: u32,
    recovered_at: u64,
}

impl CoordinatorState {
    fn resource_count(&self) -> usize {
        self.native.len() + self.remote.len()
    }

    fn has_heuristic(&self) -> bool {
        self.native.has_heuristic() || self.remote.has_heuristic()
    }

    fn find_same_rm(&self, descriptor: &dyn XaResourceDescriptor) -> Option<Arc<EnlistedResource>> {
        self.native
            .find_same_rm(descriptor)
            .or_else(|| self.remote.find_same_rm(descriptor))
            .cloned()
    }

    fn resources(&self) -> impl Iterator<Item = &Arc<EnlistedResource>> {
        self.native.resources().iter().chain(self.remote.resources())
    }
}

/// Coordinator of one global transaction.
pub struct TransactionCoordinator {
    context: TransactionContext,
    state: Mutex<CoordinatorState>,
    logger: Arc<dyn TransactionLogger>,
    listeners: ListenerChain,
    xid_factory: Arc<XidFactory>,
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("context", &self.context)
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl TransactionCoordinator {
    pub fn new(
        context: TransactionContext,
        logger: Arc<dyn TransactionLogger>,
        listeners: ListenerChain,
        xid_factory: Arc<XidFactory>,
    ) -> Self {
        Self {
            context,
            state: Mutex::new(CoordinatorState {
                status: TransactionStatus::Active,
                vote: Vote::Unset,
                native: ResourceTerminator::new(),
                remote: ResourceTerminator::new(),
                strategy_type: None,
                optimized: None,
                journaled: false,
                hazard: false,
                recovered_times: 0,
                recovered_at: 0,
            }),
            logger,
            listeners,
            xid_factory,
        }
    }

    /// Rebuild a coordinator from its journal archive.
    ///
    /// Branches are rebound through `resolver`; an identifier it does not
    /// know is bound to an [`UnresolvedResource`] until [`Self::rebind`]
    /// finds it.
    pub fn from_archive(
        archive: TransactionArchive,
        resolver: &dyn ResourceResolver,
        logger: Arc<dyn TransactionLogger>,
        listeners: ListenerChain,
        xid_factory: Arc<XidFactory>,
    ) -> Self {
        let context = TransactionContext::recovered(
            archive.xid,
            archive.coordinator,
            archive.propagated_by.clone(),
        );

        let mut native = ResourceTerminator::new();
        let mut remote = ResourceTerminator::new();
        for branch in archive.native_resources.into_iter().chain(archive.remote_resources) {
            let terminator = if branch.remote { &mut remote } else { &mut native };
            match resolver.resolve(&branch.identifier, branch.remote) {
                Some(descriptor) => {
                    terminator.restore(EnlistedResource::from_archive(descriptor, branch))
                }
                None => {
                    warn!(
                        xid = %branch.xid,
                        identifier = %branch.identifier,
                        "[xa-02] No resource registered for journaled branch"
                    );
                    let stand_in =
                        Arc::new(UnresolvedResource::new(branch.identifier.clone(), branch.remote));
                    terminator.restore(EnlistedResource::placeholder(stand_in, branch));
                }
            }
        }

        Self {
            context,
            state: Mutex::new(CoordinatorState {
                status: archive.status,
                vote: archive.vote,
                native,
                remote,
                strategy_type: archive.strategy_type,
                optimized: archive.optimized_resource.map(|r| r.xid),
                journaled: true,
                hazard: false,
                recovered_times: archive.recovered_times,
                recovered_at: archive.recovered_at,
            }),
            logger,
            listeners,
            xid_factory,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Global xid.
    pub fn xid(&self) -> Xid {
        self.context.xid
    }

    pub fn context(&self) -> &TransactionContext {
        &self.context
    }

    /// `Unknown` while the last completion attempt is unresolved.
    pub fn status(&self) -> TransactionStatus {
        let state = self.state.lock();
        if state.hazard {
            TransactionStatus::Unknown
        } else {
            state.status
        }
    }

    pub fn vote(&self) -> Vote {
        self.state.lock().vote
    }

    pub fn is_coordinator(&self) -> bool {
        self.context.coordinator
    }

    pub fn resource_count(&self) -> usize {
        self.state.lock().resource_count()
    }

    pub fn strategy_type(&self) -> Option<StrategyType> {
        self.state.lock().strategy_type
    }

    pub fn recovered_times(&self) -> u32 {
        self.state.lock().recovered_times
    }

    /// Prepared participant waiting for its propagating peer's decision.
    pub fn is_in_doubt(&self) -> bool {
        let state = self.state.lock();
        !self.context.coordinator && state.status == TransactionStatus::Prepared && !state.hazard
    }

    /// Completed with heuristic branches that still need `forget`.
    pub fn awaits_forget(&self) -> bool {
        let state = self.state.lock();
        state.status.is_terminal() && !state.hazard && state.has_heuristic()
    }

    /// Work remains that the recovery sweep can finish: an unknown outcome,
    /// or a terminal archive whose DELETE did not reach the journal.
    pub fn needs_recovery(&self) -> bool {
        let state = self.state.lock();
        state.hazard || (state.status.is_terminal() && state.journaled && !state.has_heuristic())
    }

    /// Snapshot in the shape the journal persists.
    pub fn archive(&self) -> TransactionArchive {
        self.snapshot(&self.state.lock())
    }

    // =========================================================================
    // Association
    // =========================================================================

    /// Enlist a resource. Returns false if the same resource manager is
    /// already enlisted.
    pub fn enlist(&self, descriptor: Arc<dyn XaResourceDescriptor>) -> Result<bool, TransactionError> {
        let mut state = self.state.lock();
        self.check_expiry(&mut state);
        match state.status {
            TransactionStatus::Active => {}
            TransactionStatus::MarkedRollback => {
                return Err(TransactionError::RollbackRequired(
                    "transaction is marked rollback-only".to_string(),
                ))
            }
            status => return Err(TransactionError::illegal_state(status, "enlist")),
        }

        if state.find_same_rm(descriptor.as_ref()).is_some() {
            debug!(xid = %self.xid(), identifier = descriptor.identifier(), "[xa-02] Resource already enlisted");
            return Ok(false);
        }

        let remaining = self.context.remaining_secs(current_time_millis());
        if let Err(e) = descriptor.set_transaction_timeout(remaining) {
            warn!(identifier = descriptor.identifier(), error = %e, "[xa-02] Resource rejected transaction timeout");
        }

        let identifier = descriptor.identifier().to_string();
        let global = self.context.xid;
        let factory = &self.xid_factory;
        let terminator = if descriptor.is_remote() {
            &mut state.remote
        } else {
            &mut state.native
        };

        match terminator.enlist(descriptor, || factory.create_branch_xid(&global)) {
            Ok(added) => {
                if let Some(resource) = &added {
                    debug!(xid = %resource.xid(), %identifier, "[xa-02] Branch enlisted");
                }
                Ok(added.is_some())
            }
            Err(e) if e.code.is_rollback() => {
                state.status = TransactionStatus::MarkedRollback;
                Err(TransactionError::RollbackRequired(format!(
                    "resource {identifier} refused the branch: {e}"
                )))
            }
            Err(e) => Err(TransactionError::SystemError(format!(
                "resource {identifier} failed to start: {e}"
            ))),
        }
    }

    /// End a resource's association. Returns false if it is not enlisted.
    ///
    /// `Fail` marks the transaction rollback-only.
    pub fn delist(
        &self,
        descriptor: &dyn XaResourceDescriptor,
        flag: DelistFlag,
    ) -> Result<bool, TransactionError> {
        let mut state = self.state.lock();
        let Some(resource) = state.find_same_rm(descriptor) else {
            return Ok(false);
        };
        if !matches!(
            state.status,
            TransactionStatus::Active | TransactionStatus::MarkedRollback
        ) {
            return Err(TransactionError::illegal_state(state.status, "delist"));
        }

        let result = resource.end(flag);
        if let Err(e) = &result {
            warn!(xid = %resource.xid(), error = %e, "[xa-02] Failed to end branch");
        }
        if flag == DelistFlag::Fail || result.is_err() {
            state.status = TransactionStatus::MarkedRollback;
        }
        Ok(true)
    }

    /// Suspend every associated branch.
    pub fn suspend(&self) -> Result<(), TransactionError> {
        let mut state = self.state.lock();
        self.require_associable(&state, "suspend")?;
        let native_ok = state.native.end_all(DelistFlag::Suspend);
        let remote_ok = state.remote.end_all(DelistFlag::Suspend);
        if !(native_ok && remote_ok) {
            state.status = TransactionStatus::MarkedRollback;
        }
        Ok(())
    }

    /// Resume every suspended branch.
    pub fn resume(&self) -> Result<(), TransactionError> {
        let mut state = self.state.lock();
        self.require_associable(&state, "resume")?;
        let mut ok = true;
        for resource in state.resources().filter(|r| r.is_suspended()) {
            if let Err(e) = resource.resume() {
                warn!(xid = %resource.xid(), error = %e, "[xa-02] Failed to resume branch");
                ok = false;
            }
        }
        if !ok {
            state.status = TransactionStatus::MarkedRollback;
        }
        Ok(())
    }

    pub fn set_rollback_only(&self) -> Result<(), TransactionError> {
        let mut state = self.state.lock();
        match state.status {
            TransactionStatus::Active | TransactionStatus::MarkedRollback => {
                state.status = TransactionStatus::MarkedRollback;
                Ok(())
            }
            status => Err(TransactionError::illegal_state(status, "set rollback-only")),
        }
    }

    // =========================================================================
    // Completion
    // =========================================================================

    /// First phase only, for a transaction propagated to this node.
    pub fn prepare(&self) -> Result<Vote, TransactionError> {
        let mut state = self.state.lock();
        self.check_expiry(&mut state);
        match state.status {
            TransactionStatus::Active => {}
            TransactionStatus::Prepared => return Ok(state.vote),
            TransactionStatus::MarkedRollback => return self.rollback_required(&mut state),
            status => return Err(TransactionError::illegal_state(status, "prepare")),
        }

        self.end_associations(&mut state);
        if state.status == TransactionStatus::MarkedRollback {
            return self.rollback_required(&mut state);
        }
        if state.resource_count() == 0 {
            state.status = TransactionStatus::Committed;
            return Ok(Vote::ReadOnly);
        }
        self.prepare_phase(&mut state)
    }

    /// Commit as the transaction's coordinator.
    ///
    /// A single enlisted resource is committed in one phase.
    pub fn commit(&self) -> Result<(), TransactionError> {
        let mut state = self.state.lock();
        self.commit_locked(&mut state)
    }

    /// Commit on behalf of the propagating peer.
    ///
    /// `one_phase` is only valid before prepare; a two-phase commit of an
    /// unprepared transaction is a protocol error.
    pub fn commit_participant(&self, one_phase: bool) -> Result<(), TransactionError> {
        let mut state = self.state.lock();
        match state.status {
            TransactionStatus::Active if !one_phase => Err(TransactionError::Protocol(format!(
                "two-phase commit of unprepared transaction {}",
                self.xid()
            ))),
            TransactionStatus::RolledBack => Err(TransactionError::RollbackRequired(
                "transaction already rolled back".to_string(),
            )),
            _ => self.commit_locked(&mut state),
        }
    }

    pub fn rollback(&self) -> Result<(), TransactionError> {
        let mut state = self.state.lock();
        self.rollback_locked(&mut state)
    }

    /// Discard heuristic branch state and erase the archive.
    pub fn forget(&self) -> Result<(), TransactionError> {
        let mut state = self.state.lock();
        if !(state.status.is_terminal() || state.hazard) {
            return Err(TransactionError::illegal_state(state.status, "forget"));
        }

        let logger = self.branch_logger(&state);
        let forgotten = state.native.forget(logger)? + state.remote.forget(logger)?;
        state.hazard = false;
        self.erase(&mut state)?;
        info!(xid = %self.xid(), forgotten, "[xa-02] Transaction forgotten");
        Ok(())
    }

    /// Bind branches recovered without a registered resource to the
    /// descriptors `resolver` now knows. Returns the number rebound.
    pub fn rebind(&self, resolver: &dyn ResourceResolver) -> usize {
        let mut state = self.state.lock();
        let resolve = |branch: &ResourceArchive| resolver.resolve(&branch.identifier, branch.remote);
        let rebound = state.native.rebind(resolve) + state.remote.rebind(resolve);
        if rebound > 0 {
            info!(xid = %self.xid(), rebound, "[xa-02] Late-registered resources bound");
        }
        rebound
    }

    /// Re-drive toward the recorded outcome.
    ///
    /// Commit if the decision was durable (`Prepared` or later on the commit
    /// path), otherwise roll back.
    pub fn recover(&self) -> Result<(), TransactionError> {
        let mut state = self.state.lock();
        state.recovered_times = state.recovered_times.saturating_add(1);
        state.recovered_at = current_time_millis();
        debug!(xid = %self.xid(), status = ?state.status, attempt = state.recovered_times, "[xa-02] Recovering transaction");

        match state.status {
            TransactionStatus::Committed | TransactionStatus::RolledBack if !state.hazard => {
                if !state.has_heuristic() {
                    self.erase(&mut state)?;
                }
                Ok(())
            }
            status if status.is_commit_decided() => self.commit_phase(&mut state),
            _ => self.rollback_locked(&mut state),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn commit_locked(&self, state: &mut CoordinatorState) -> Result<(), TransactionError> {
        self.check_expiry(state);
        match state.status {
            TransactionStatus::Active => {}
            TransactionStatus::MarkedRollback => return self.rollback_required(state),
            TransactionStatus::Prepared | TransactionStatus::Committing => {
                return self.commit_phase(state)
            }
            TransactionStatus::Committed if !state.hazard => return Ok(()),
            status => return Err(TransactionError::illegal_state(status, "commit")),
        }

        self.end_associations(state);
        if state.status == TransactionStatus::MarkedRollback {
            return self.rollback_required(state);
        }

        match state.resource_count() {
            0 => {
                self.listeners.commit_start(&self.context.xid);
                state.status = TransactionStatus::Committed;
                self.listeners.commit_success(&self.context.xid);
                debug!(xid = %self.xid(), "[xa-02] Vacant transaction committed");
                Ok(())
            }
            1 => self.commit_one_phase(state),
            _ => match self.prepare_phase(state)? {
                Vote::ReadOnly => Ok(()),
                _ => self.commit_phase(state),
            },
        }
    }

    fn prepare_phase(&self, state: &mut CoordinatorState) -> Result<Vote, TransactionError> {
        let xid = self.context.xid;
        let kind = self.strategy_kind(state);
        self.listeners.prepare_start(&xid);

        self.transition(state, TransactionStatus::Preparing)?;
        let result = match self.persist(state) {
            Ok(()) => CommitStrategy::bind(kind, &state.native, &state.remote)
                .prepare(self.logger.as_ref()),
            Err(e) => Err(e),
        };

        let vote = match result {
            Ok(vote) => vote,
            Err(e) => {
                warn!(%xid, error = %e, "[xa-02] Prepare failed, rolling back");
                self.listeners.prepare_failure(&xid);
                self.rollback_locked(state)?;
                return Err(match e {
                    TransactionError::RollbackRequired(_) => e,
                    other => TransactionError::RollbackRequired(other.to_string()),
                });
            }
        };

        state.vote = vote;
        if vote == Vote::ReadOnly {
            self.transition(state, TransactionStatus::Committed)?;
            self.erase_best_effort(state);
            self.listeners.prepare_success(&xid);
            info!(%xid, "[xa-02] All branches read-only, transaction complete");
            return Ok(Vote::ReadOnly);
        }

        self.transition(state, TransactionStatus::Prepared)?;
        if let Err(e) = self.persist(state) {
            // Branches are prepared but the decision is not durable.
            self.listeners.prepare_failure(&xid);
            self.rollback_locked(state)?;
            return Err(TransactionError::RollbackRequired(e.to_string()));
        }
        self.listeners.prepare_success(&xid);
        debug!(%xid, strategy = ?kind, "[xa-02] Transaction prepared");
        Ok(vote)
    }

    fn commit_phase(&self, state: &mut CoordinatorState) -> Result<(), TransactionError> {
        let xid = self.context.xid;
        let kind = self.strategy_kind(state);
        self.listeners.commit_start(&xid);

        self.transition(state, TransactionStatus::Committing)?;
        if let Err(e) = self.persist(state) {
            state.hazard = true;
            self.listeners.commit_failure(&xid);
            return Err(e);
        }

        let logger = self.branch_logger(state);
        let result = if kind == StrategyType::Simple && state.optimized.is_some() {
            // The only branch was never prepared.
            Self::one_phase_group(state).commit(true, logger).resolve_commit()
        } else {
            CommitStrategy::bind(kind, &state.native, &state.remote).commit(logger)
        };
        self.finish_commit(state, result)
    }

    /// One-phase commit of the only enlisted branch.
    fn commit_one_phase(&self, state: &mut CoordinatorState) -> Result<(), TransactionError> {
        let xid = self.context.xid;
        state.strategy_type = Some(StrategyType::Simple);
        state.optimized = Self::one_phase_group(state).resources().first().map(|r| r.xid());
        self.listeners.commit_start(&xid);

        let logger = self.branch_logger(state);
        let flags = Self::one_phase_group(state).commit(true, logger);

        if flags.is_clean_commit() {
            state.status = TransactionStatus::Committed;
            self.listeners.commit_success(&xid);
            debug!(%xid, "[xa-02] One-phase commit complete");
            return Ok(());
        }
        if flags.is_clean_rollback() && !state.has_heuristic() {
            self.transition(state, TransactionStatus::RollingBack)?;
            self.transition(state, TransactionStatus::RolledBack)?;
            self.listeners.commit_failure(&xid);
            return Err(TransactionError::RollbackRequired(
                "resource rolled back the one-phase commit".to_string(),
            ));
        }

        self.transition(state, TransactionStatus::Committing)?;
        self.finish_commit(state, flags.resolve_commit())
    }

    /// Group holding the branch of a one-phase transaction.
    fn one_phase_group(state: &CoordinatorState) -> &ResourceTerminator {
        if state.native.is_empty() {
            &state.remote
        } else {
            &state.native
        }
    }

    fn finish_commit(
        &self,
        state: &mut CoordinatorState,
        result: Result<(), TransactionError>,
    ) -> Result<(), TransactionError> {
        let xid = self.context.xid;
        match result {
            Ok(()) => {
                self.settle(state, TransactionStatus::Committed)?;
                self.listeners.commit_success(&xid);
                info!(%xid, "[xa-02] Transaction committed");
                Ok(())
            }
            Err(e @ TransactionError::HeuristicMixed) => {
                self.settle(state, TransactionStatus::Committed)?;
                self.listeners.commit_heuristic_mixed(&xid);
                error!(%xid, "[xa-02] Commit ended with a heuristic mixed outcome");
                Err(e)
            }
            Err(e @ TransactionError::HeuristicRollback) => {
                self.settle(state, TransactionStatus::Committed)?;
                self.listeners.commit_heuristic_rolledback(&xid);
                error!(%xid, "[xa-02] Commit was heuristically rolled back");
                Err(e)
            }
            Err(e) => {
                self.mark_hazard(state);
                self.listeners.commit_failure(&xid);
                error!(%xid, error = %e, "[xa-02] Commit outcome unknown, left for recovery");
                Err(e)
            }
        }
    }

    fn rollback_locked(&self, state: &mut CoordinatorState) -> Result<(), TransactionError> {
        let xid = self.context.xid;
        let previous = state.status;
        match previous {
            TransactionStatus::Active | TransactionStatus::MarkedRollback => {
                self.end_associations(state)
            }
            TransactionStatus::Preparing
            | TransactionStatus::Prepared
            | TransactionStatus::RollingBack => {}
            TransactionStatus::RolledBack if !state.hazard => return Ok(()),
            TransactionStatus::Committing | TransactionStatus::Committed => {
                return Err(TransactionError::CommitRequired)
            }
            status => return Err(TransactionError::illegal_state(status, "rollback")),
        }

        let kind = self.strategy_kind(state);
        self.listeners.rollback_start(&xid);
        self.transition(state, TransactionStatus::RollingBack)?;
        if state.journaled {
            if let Err(e) = self.persist(state) {
                // A journaled Prepared must not be rolled back behind the log's back.
                state.status = previous;
                self.listeners.rollback_failure(&xid);
                return Err(e);
            }
        }

        let logger = self.branch_logger(state);
        let result = CommitStrategy::bind(kind, &state.native, &state.remote).rollback(logger);
        match result {
            Ok(()) => {
                self.settle(state, TransactionStatus::RolledBack)?;
                self.listeners.rollback_success(&xid);
                info!(%xid, "[xa-02] Transaction rolled back");
                Ok(())
            }
            Err(e @ (TransactionError::HeuristicCommit | TransactionError::HeuristicMixed)) => {
                self.settle(state, TransactionStatus::RolledBack)?;
                self.listeners.rollback_failure(&xid);
                error!(%xid, error = %e, "[xa-02] Rollback ended with a heuristic outcome");
                Err(e)
            }
            Err(e) => {
                self.mark_hazard(state);
                self.listeners.rollback_failure(&xid);
                error!(%xid, error = %e, "[xa-02] Rollback outcome unknown, left for recovery");
                Err(e)
            }
        }
    }

    /// Roll back a rollback-only transaction and report it to the caller.
    fn rollback_required<T>(&self, state: &mut CoordinatorState) -> Result<T, TransactionError> {
        self.rollback_locked(state)?;
        Err(TransactionError::RollbackRequired(
            "transaction was marked rollback-only".to_string(),
        ))
    }

    /// Enter a terminal status. Heuristic branches keep the archive in the
    /// journal until `forget`; otherwise it is erased.
    fn settle(
        &self,
        state: &mut CoordinatorState,
        terminal: TransactionStatus,
    ) -> Result<(), TransactionError> {
        self.transition(state, terminal)?;
        state.hazard = false;
        if state.has_heuristic() {
            if let Err(e) = self.persist(state) {
                error!(xid = %self.xid(), error = %e, "[xa-02] Failed to journal heuristic outcome");
            }
        } else {
            self.erase_best_effort(state);
        }
        Ok(())
    }

    fn mark_hazard(&self, state: &mut CoordinatorState) {
        state.hazard = true;
        if let Err(e) = self.persist(state) {
            error!(xid = %self.xid(), error = %e, "[xa-02] Failed to journal unresolved transaction");
        }
    }

    /// End every associated branch before completion. A failure marks the
    /// transaction rollback-only.
    fn end_associations(&self, state: &mut CoordinatorState) {
        let native_ok = state.native.end_all(DelistFlag::Success);
        let remote_ok = state.remote.end_all(DelistFlag::Success);
        if !(native_ok && remote_ok) && state.status == TransactionStatus::Active {
            state.status = TransactionStatus::MarkedRollback;
        }
    }

    fn check_expiry(&self, state: &mut CoordinatorState) {
        if state.status == TransactionStatus::Active
            && self.context.is_expired(current_time_millis())
        {
            warn!(xid = %self.xid(), "[xa-02] Transaction timed out, marking rollback-only");
            state.status = TransactionStatus::MarkedRollback;
        }
    }

    fn require_associable(
        &self,
        state: &CoordinatorState,
        operation: &'static str,
    ) -> Result<(), TransactionError> {
        match state.status {
            TransactionStatus::Active | TransactionStatus::MarkedRollback => Ok(()),
            status => Err(TransactionError::illegal_state(status, operation)),
        }
    }

    /// Strategy for this transaction, chosen once from the topology.
    fn strategy_kind(&self, state: &mut CoordinatorState) -> StrategyType {
        if let Some(kind) = state.strategy_type {
            return kind;
        }
        let kind = CommitStrategy::choose(&state.native, &state.remote);
        if kind == StrategyType::LastResourceOptimize {
            state.optimized = state.native.resources().first().map(|r| r.xid());
        }
        state.strategy_type = Some(kind);
        debug!(xid = %self.xid(), strategy = ?kind, "[xa-02] Commit strategy chosen");
        kind
    }

    fn transition(
        &self,
        state: &mut CoordinatorState,
        to: TransactionStatus,
    ) -> Result<(), TransactionError> {
        invariant_valid_transition(state.status, to)?;
        state.status = to;
        Ok(())
    }

    fn branch_logger<'a>(&'a self, state: &CoordinatorState) -> &'a dyn TransactionLogger {
        if state.journaled {
            self.logger.as_ref()
        } else {
            &Unjournaled
        }
    }

    fn snapshot(&self, state: &CoordinatorState) -> TransactionArchive {
        let mut archive = TransactionArchive::new(self.context.xid, self.context.coordinator);
        archive.status = state.status;
        archive.vote = state.vote;
        archive.propagated_by = self.context.propagated_by.clone();
        archive.native_resources = state.native.snapshots();
        archive.remote_resources = state.remote.snapshots();
        archive.optimized_resource = state
            .optimized
            .and_then(|xid| state.native.find(&xid).or_else(|| state.remote.find(&xid)))
            .map(|r| r.snapshot());
        archive.strategy_type = state.strategy_type;
        archive.recovered_times = state.recovered_times;
        archive.recovered_at = state.recovered_at;
        archive
    }

    /// Write the current snapshot: CREATE the first time, MODIFY after.
    fn persist(&self, state: &mut CoordinatorState) -> Result<(), TransactionError> {
        let archive = self.snapshot(state);
        invariant_persistable_status(&archive)?;
        invariant_mixed_is_heuristic(&archive)?;
        if state.journaled {
            self.logger.update_transaction(&archive)?;
        } else {
            self.logger.create_transaction(&archive)?;
            state.journaled = true;
        }
        Ok(())
    }

    fn erase(&self, state: &mut CoordinatorState) -> Result<(), TransactionError> {
        if state.journaled {
            self.logger.delete_transaction(&self.snapshot(state))?;
            state.journaled = false;
        }
        Ok(())
    }

    /// A failed DELETE leaves a terminal archive that recovery erases later.
    fn erase_best_effort(&self, state: &mut CoordinatorState) {
        if let Err(e) = self.erase(state) {
            warn!(xid = %self.xid(), error = %e, "[xa-02] Failed to erase completed transaction");
        }
    }
}
