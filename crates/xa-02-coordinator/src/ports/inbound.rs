//! # Inbound Ports
//!
//! The coordinator-facing protocol a transport binding exposes to peer
//! coordinators. Verbs mirror the XA resource-manager interface and are
//! addressed by global xid; failures map to the protocol error codes via
//! `TransactionError::code()`.

use shared_types::{RecoverFlags, Vote, Xid};

use crate::domain::TransactionError;

/// Coordinator-facing protocol - inbound port.
pub trait XaCoordinatorApi: Send + Sync {
    /// First phase for a transaction propagated to this node.
    fn prepare(&self, xid: &Xid) -> Result<Vote, TransactionError>;

    /// Second phase, or a single-phase commit when `one_phase` is set.
    fn commit(&self, xid: &Xid, one_phase: bool) -> Result<(), TransactionError>;

    fn rollback(&self, xid: &Xid) -> Result<(), TransactionError>;

    /// In-doubt and heuristically completed transactions.
    fn recover(&self, flags: RecoverFlags) -> Result<Vec<Xid>, TransactionError>;

    /// Discard a heuristically completed transaction.
    fn forget(&self, xid: &Xid) -> Result<(), TransactionError>;
}
