//! # Shared Types Crate
//!
//! This crate contains the archive model and the identifiers every other
//! crate in the workspace agrees on.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: `Xid`, `ResourceArchive` and
//!   `TransactionArchive` are defined once, here, because the journal stores
//!   them and the coordinator mutates them.
//! - **Serializable archives**: every archive type derives `serde` so the
//!   journal can persist a snapshot without knowing the coordinator.
//! - **No live handles in archives**: a branch refers to its resource manager
//!   by identifier only; live descriptors are rebound at recovery.

pub mod context;
pub mod entities;
pub mod errors;
pub mod time;
pub mod xid;

pub use context::TransactionContext;
pub use entities::*;
pub use errors::*;
pub use time::current_time_millis;
pub use xid::{GlobalId, Xid, XidFactory, BRANCH_QUALIFIER_LEN, GLOBAL_TRANSACTION_ID_LEN};
