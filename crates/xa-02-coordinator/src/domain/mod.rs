//! # Domain Module
//!
//! Core types for the transaction engine: error taxonomy, outcome
//! classification, configuration, invariants.

pub mod config;
pub mod errors;
pub mod invariants;
pub mod value_objects;

pub use config::CoordinatorConfig;
pub use errors::TransactionError;
pub use invariants::*;
pub use value_objects::*;
