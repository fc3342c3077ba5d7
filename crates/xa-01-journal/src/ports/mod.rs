//! # Ports Layer
//!
//! - `inbound`: `TransactionLogger` and `RecoveryCallback`
//! - `outbound`: `ArchiveSerializer` and `TimeSource`

pub mod inbound;
pub mod outbound;

pub use inbound::{RecoveryCallback, TransactionLogger};
pub use outbound::{ArchiveSerializer, TimeSource};
