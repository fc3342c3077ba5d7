//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements the `ResourceResolver` outbound port.

mod registry;

pub use registry::{ResourceRegistry, UnresolvedResource};
