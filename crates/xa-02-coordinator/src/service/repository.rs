//! In-flight and errored transactions, keyed by global xid.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use shared_types::Xid;

use super::coordinator::TransactionCoordinator;

type CoordinatorMap = RwLock<HashMap<Xid, Arc<TransactionCoordinator>>>;

/// Shared registry of live coordinators.
///
/// The error set holds transactions that need recovery or `forget`.
#[derive(Debug, Default)]
pub struct TransactionRepository {
    active: CoordinatorMap,
    error: CoordinatorMap,
}

impl TransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_transaction(&self, coordinator: Arc<TransactionCoordinator>) {
        self.active.write().insert(coordinator.xid(), coordinator);
    }

    pub fn get_transaction(&self, xid: &Xid) -> Option<Arc<TransactionCoordinator>> {
        self.active.read().get(&xid.to_global()).cloned()
    }

    pub fn remove_transaction(&self, xid: &Xid) -> Option<Arc<TransactionCoordinator>> {
        self.active.write().remove(&xid.to_global())
    }

    pub fn active_transactions(&self) -> Vec<Arc<TransactionCoordinator>> {
        self.active.read().values().cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.read().len()
    }

    pub fn put_error_transaction(&self, coordinator: Arc<TransactionCoordinator>) {
        self.error.write().insert(coordinator.xid(), coordinator);
    }

    pub fn get_error_transaction(&self, xid: &Xid) -> Option<Arc<TransactionCoordinator>> {
        self.error.read().get(&xid.to_global()).cloned()
    }

    pub fn remove_error_transaction(&self, xid: &Xid) -> Option<Arc<TransactionCoordinator>> {
        self.error.write().remove(&xid.to_global())
    }

    pub fn error_transactions(&self) -> Vec<Arc<TransactionCoordinator>> {
        self.error.read().values().cloned().collect()
    }

    pub fn error_count(&self) -> usize {
        self.error.read().len()
    }

    /// Look in the active set, then the error set.
    pub fn find(&self, xid: &Xid) -> Option<Arc<TransactionCoordinator>> {
        self.get_transaction(xid)
            .or_else(|| self.get_error_transaction(xid))
    }

    pub fn contains(&self, xid: &Xid) -> bool {
        self.find(xid).is_some()
    }

    /// Move a transaction into the error set.
    pub fn mark_error(&self, coordinator: Arc<TransactionCoordinator>) {
        self.remove_transaction(&coordinator.xid());
        self.put_error_transaction(coordinator);
    }

    /// Drop a transaction from both sets.
    pub fn forget(&self, xid: &Xid) {
        self.remove_transaction(xid);
        self.remove_error_transaction(xid);
    }

    /// Every known transaction, active first.
    pub fn all_transactions(&self) -> Vec<Arc<TransactionCoordinator>> {
        let mut all = self.active_transactions();
        all.extend(self.error_transactions());
        all
    }
}
