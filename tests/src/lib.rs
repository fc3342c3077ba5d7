//! # XA Coordinator Test Suite
//!
//! Scenarios that need more than one crate: the coordinator running over the
//! real file journal, crashes simulated by dropping a process's state and
//! reopening its journal directory, and the runtime's background tasks.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/
//! │   ├── end_to_end.rs   # commit/rollback paths over ArchiveJournal
//! │   ├── recovery.rs     # crash, reopen, re-drive
//! │   └── journal.rs      # compaction and swap under coordinator load
//! └── benches/
//!     └── journal_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p xa-tests
//! cargo test -p xa-tests integration::recovery
//! cargo bench -p xa-tests
//! ```

#![allow(dead_code)]

pub mod integration;
