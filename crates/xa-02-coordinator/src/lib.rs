//! # Transaction Coordinator Subsystem (xa-02)
//!
//! XA two-phase commit across native resources and resources fronted by
//! remote peer coordinators, with heuristic classification and crash
//! recovery over the xa-01 journal.
//!
//! ## Architecture
//!
//! - **Domain Layer**: error taxonomy, branch outcome aggregation, invariants, config
//! - **Ports Layer**: `XaCoordinatorApi` (inbound); resource descriptor,
//!   resolver and listener traits (outbound)
//! - **Algorithms**: branch completion, resource terminators, commit strategies
//! - **Service**: coordinator state machine, manager, repository, recovery
//! - **Adapters**: resource registry
//!
//! ## Outcome Rules
//!
//! | Situation | Caller sees |
//! |-----------|-------------|
//! | any prepare failure | `RollbackRequired`, every branch rolled back |
//! | all branches read-only | success, no commit phase |
//! | some committed, some rolled back | `HeuristicMixed` |
//! | a branch's fate unknown | `HeuristicHazard`, retried by recovery |
//! | commit requested, all rolled back | `HeuristicRollback` |
//! | rollback requested, branches committed | `HeuristicCommit` |
//!
//! ## Usage
//!
//! ```ignore
//! let manager = TransactionManager::new(config, journal, repository);
//! let tx = manager.begin();
//! tx.enlist(database)?;
//! tx.enlist(peer)?;
//! manager.commit(tx)?;
//! ```

pub mod adapters;
pub mod algorithms;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{ResourceRegistry, UnresolvedResource};
pub use algorithms::{CommitStrategy, EnlistedResource, ResourceTerminator};
pub use domain::{
    invariant_mixed_is_heuristic, invariant_persistable_status, invariant_valid_transition,
    BranchOutcome, CoordinatorConfig, OutcomeFlags, TransactionError,
};
pub use ports::{
    MockListener, MockResource, ResourceResolver, TransactionListener, XaCoordinatorApi,
    XaResourceDescriptor,
};
pub use service::{
    ListenerChain, RecoveryReport, SuspendedTransaction, TransactionCoordinator, TransactionHandle,
    TransactionManager, TransactionRecovery, TransactionRepository,
};
