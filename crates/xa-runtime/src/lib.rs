//! # XA Coordinator Runtime
//!
//! Wires the journal (xa-01) and the transaction engine (xa-02) into a
//! running process. The `main.rs` binary is a thin shell around
//! `CoordinatorRuntime`; the library exists so the wiring can be tested.
//!
//! ## Modules
//!
//! - `container/` - configuration and the application context
//! - `handlers/` - background compaction and recovery sweeps

pub mod container;
pub mod handlers;
mod runtime;

pub use container::{ApplicationContext, ConfigError, RuntimeConfig};
pub use runtime::CoordinatorRuntime;
