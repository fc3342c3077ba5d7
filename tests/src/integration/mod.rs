//! # Cross-Crate Integration Tests

pub mod end_to_end;
pub mod journal;
pub mod recovery;

#[cfg(test)]
pub(crate) mod support;
