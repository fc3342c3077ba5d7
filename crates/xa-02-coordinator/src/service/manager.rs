//! # Transaction Manager
//!
//! Application-facing entry point: begins transactions, hands out the
//! single handle that represents the caller's association with one, and
//! implements the coordinator-facing protocol for peers.
//!
//! A `TransactionHandle` is not `Clone`. Suspending consumes it and yields a
//! `SuspendedTransaction`; resuming consumes that and yields a handle again.

use std::sync::Arc;

use shared_types::{
    DelistFlag, RecoverFlags, TransactionContext, TransactionStatus, Vote, Xid, XidFactory,
};
use tracing::{debug, info, warn};
use xa_01_journal::TransactionLogger;

use super::coordinator::TransactionCoordinator;
use super::listener::ListenerChain;
use super::repository::TransactionRepository;
use crate::domain::{CoordinatorConfig, TransactionError};
use crate::ports::inbound::XaCoordinatorApi;
use crate::ports::outbound::{TransactionListener, XaResourceDescriptor};

/// The caller's association with a transaction.
#[derive(Debug)]
pub struct TransactionHandle {
    coordinator: Arc<TransactionCoordinator>,
}

impl TransactionHandle {
    pub fn xid(&self) -> Xid {
        self.coordinator.xid()
    }

    /// Context to propagate to a peer.
    pub fn context(&self) -> &TransactionContext {
        self.coordinator.context()
    }

    pub fn status(&self) -> TransactionStatus {
        self.coordinator.status()
    }

    pub fn enlist(&self, descriptor: Arc<dyn XaResourceDescriptor>) -> Result<bool, TransactionError> {
        self.coordinator.enlist(descriptor)
    }

    pub fn delist(
        &self,
        descriptor: &dyn XaResourceDescriptor,
        flag: DelistFlag,
    ) -> Result<bool, TransactionError> {
        self.coordinator.delist(descriptor, flag)
    }

    pub fn coordinator(&self) -> &Arc<TransactionCoordinator> {
        &self.coordinator
    }
}

/// A transaction detached from its caller.
#[derive(Debug)]
pub struct SuspendedTransaction {
    coordinator: Arc<TransactionCoordinator>,
}

impl SuspendedTransaction {
    pub fn xid(&self) -> Xid {
        self.coordinator.xid()
    }
}

/// Begins and completes transactions.
pub struct TransactionManager {
    config: CoordinatorConfig,
    xid_factory: Arc<XidFactory>,
    repository: Arc<TransactionRepository>,
    logger: Arc<dyn TransactionLogger>,
    listeners: ListenerChain,
}

impl TransactionManager {
    pub fn new(
        config: CoordinatorConfig,
        logger: Arc<dyn TransactionLogger>,
        repository: Arc<TransactionRepository>,
    ) -> Self {
        let xid_factory = Arc::new(XidFactory::new(config.format_id));
        Self {
            config,
            xid_factory,
            repository,
            logger,
            listeners: ListenerChain::new(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn TransactionListener>) -> Self {
        self.listeners.add(listener);
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn xid_factory(&self) -> &Arc<XidFactory> {
        &self.xid_factory
    }

    pub fn repository(&self) -> &Arc<TransactionRepository> {
        &self.repository
    }

    pub fn listeners(&self) -> &ListenerChain {
        &self.listeners
    }

    /// Begin with the configured default timeout.
    pub fn begin(&self) -> TransactionHandle {
        self.begin_with_timeout(self.config.default_timeout_secs)
    }

    pub fn begin_with_timeout(&self, timeout_secs: u64) -> TransactionHandle {
        let context = TransactionContext::new(self.xid_factory.create_global_xid(), timeout_secs);
        debug!(xid = %context.xid, timeout_secs, "[xa-02] Transaction begun");
        self.register(context)
    }

    /// Join a transaction propagated from a peer coordinator.
    ///
    /// A second request for the same xid joins the existing transaction.
    pub fn begin_propagated(
        &self,
        context: &TransactionContext,
    ) -> Result<TransactionHandle, TransactionError> {
        if let Some(coordinator) = self.repository.get_transaction(&context.xid) {
            return match coordinator.status() {
                TransactionStatus::Active | TransactionStatus::MarkedRollback => {
                    Ok(TransactionHandle { coordinator })
                }
                status => Err(TransactionError::illegal_state(status, "join")),
            };
        }

        let mut imported = context.clone();
        imported.xid = context.xid.to_global();
        imported.coordinator = false;
        imported.propagated = true;
        debug!(xid = %imported.xid, by = ?imported.propagated_by, "[xa-02] Propagated transaction joined");
        Ok(self.register(imported))
    }

    pub fn commit(&self, handle: TransactionHandle) -> Result<(), TransactionError> {
        let result = handle.coordinator.commit();
        self.finish(&handle.coordinator);
        result
    }

    pub fn rollback(&self, handle: TransactionHandle) -> Result<(), TransactionError> {
        let result = handle.coordinator.rollback();
        self.finish(&handle.coordinator);
        result
    }

    pub fn set_rollback_only(&self, handle: &TransactionHandle) -> Result<(), TransactionError> {
        handle.coordinator.set_rollback_only()
    }

    pub fn suspend(&self, handle: TransactionHandle) -> Result<SuspendedTransaction, TransactionError> {
        handle.coordinator.suspend()?;
        debug!(xid = %handle.xid(), "[xa-02] Transaction suspended");
        Ok(SuspendedTransaction {
            coordinator: handle.coordinator,
        })
    }

    pub fn resume(&self, suspended: SuspendedTransaction) -> Result<TransactionHandle, TransactionError> {
        suspended.coordinator.resume()?;
        debug!(xid = %suspended.xid(), "[xa-02] Transaction resumed");
        Ok(TransactionHandle {
            coordinator: suspended.coordinator,
        })
    }

    pub fn status(&self, xid: &Xid) -> Option<TransactionStatus> {
        self.repository.find(xid).map(|c| c.status())
    }

    pub fn get_transaction(&self, xid: &Xid) -> Option<Arc<TransactionCoordinator>> {
        self.repository.find(xid)
    }

    fn register(&self, context: TransactionContext) -> TransactionHandle {
        let coordinator = Arc::new(TransactionCoordinator::new(
            context,
            self.logger.clone(),
            self.listeners.clone(),
            self.xid_factory.clone(),
        ));
        self.repository.put_transaction(coordinator.clone());
        TransactionHandle { coordinator }
    }

    fn lookup(&self, xid: &Xid) -> Result<Arc<TransactionCoordinator>, TransactionError> {
        self.repository
            .find(xid)
            .ok_or(TransactionError::NotFound(xid.to_global()))
    }

    /// File a transaction after a completion attempt.
    fn finish(&self, coordinator: &Arc<TransactionCoordinator>) {
        let xid = coordinator.xid();
        if coordinator.needs_recovery() || coordinator.awaits_forget() {
            warn!(%xid, status = ?coordinator.status(), "[xa-02] Transaction moved to the error set");
            self.repository.mark_error(coordinator.clone());
        } else if coordinator.status().is_terminal() {
            self.repository.forget(&xid);
        }
    }
}

impl XaCoordinatorApi for TransactionManager {
    fn prepare(&self, xid: &Xid) -> Result<Vote, TransactionError> {
        let coordinator = self.lookup(xid)?;
        let result = coordinator.prepare();
        self.finish(&coordinator);
        result
    }

    fn commit(&self, xid: &Xid, one_phase: bool) -> Result<(), TransactionError> {
        let coordinator = self.lookup(xid)?;
        let result = coordinator.commit_participant(one_phase);
        self.finish(&coordinator);
        result
    }

    fn rollback(&self, xid: &Xid) -> Result<(), TransactionError> {
        let coordinator = self.lookup(xid)?;
        let result = coordinator.rollback();
        self.finish(&coordinator);
        result
    }

    fn recover(&self, flags: RecoverFlags) -> Result<Vec<Xid>, TransactionError> {
        if !flags.returns_results() {
            return Ok(Vec::new());
        }
        let xids: Vec<Xid> = self
            .repository
            .all_transactions()
            .into_iter()
            .filter(|c| c.is_in_doubt() || c.awaits_forget())
            .map(|c| c.xid())
            .collect();
        debug!(count = xids.len(), "[xa-02] Recover scan");
        Ok(xids)
    }

    fn forget(&self, xid: &Xid) -> Result<(), TransactionError> {
        let coordinator = self.lookup(xid)?;
        coordinator.forget()?;
        self.repository.forget(xid);
        info!(xid = %coordinator.xid(), "[xa-02] Heuristic transaction forgotten by peer");
        Ok(())
    }
}
