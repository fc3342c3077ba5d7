//! # Runtime Handlers
//!
//! Background tasks started by `CoordinatorRuntime::start`.

pub mod background;

pub use background::{spawn_compaction, spawn_periodic, spawn_recovery_sweep};
