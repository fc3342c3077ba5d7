//! # Coordinator Service
//!
//! - `coordinator`: per-transaction state machine
//! - `manager`: begin/complete, suspend/resume, coordinator-facing protocol
//! - `recovery`: journal replay and the periodic recovery sweep
//! - `repository`: active and error transaction sets
//! - `listener`: transition hooks

pub mod coordinator;
pub mod listener;
pub mod manager;
pub mod recovery;
pub mod repository;


pub use coordinator::TransactionCoordinator;
pub use listener::ListenerChain;
pub use manager::{SuspendedTransaction, TransactionHandle, TransactionManager};
pub use recovery::{RecoveryReport, TransactionRecovery};
pub use repository::TransactionRepository;
