//! # Application Container
//!
//! Explicit wiring of the journal, repository, resource registry, manager and
//! recovery engine. Everything is built once at startup and shared by `Arc`.

pub mod config;
mod context;

pub use config::{ConfigError, RuntimeConfig};
pub use context::ApplicationContext;
