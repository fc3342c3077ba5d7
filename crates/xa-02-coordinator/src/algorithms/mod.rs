//! # Algorithms Module
//!
//! Branch completion, per-group termination and the commit strategies.

pub mod branch;
pub mod strategy;
pub mod terminator;

pub use branch::EnlistedResource;
pub use strategy::CommitStrategy;
pub use terminator::ResourceTerminator;
