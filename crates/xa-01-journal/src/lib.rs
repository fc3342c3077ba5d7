//! # Transaction Journal Subsystem (xa-01)
//!
//! Crash-safe write-ahead log of transaction archive mutations.
//!
//! ## Architecture
//!
//! - **Domain Layer**: header and record encodings, config, two-pass replay
//! - **Ports Layer**: `TransactionLogger` (inbound), serializer and clock (outbound)
//! - **Adapters**: journal file, directory lock, bincode serializer, in-memory logger
//! - **Service**: `ArchiveJournal`, the dual-file journal with compaction/swap
//!
//! ## Guarantees
//!
//! | Property | Enforcement |
//! |----------|-------------|
//! | Durable before ack | record and header `sync_data` before `write` returns |
//! | Total order | single writer lock per journal |
//! | Swap never races an append | swap runs under the writer lock |
//! | Exactly one master after a crash | header resolution on `open` |
//! | Single process | `fs2` lock on the journal directory |
//!
//! ## Usage
//!
//! ```ignore
//! let journal = ArchiveJournal::open_default(JournalConfig::new("/var/lib/xa"))?;
//! journal.create_transaction(&archive)?;
//! journal.recover(&mut |archive| coordinator.recover(archive))?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{
    BincodeArchiveSerializer, InMemoryTransactionLogger, JournalFile, JournalLock,
    SystemTimeSource,
};
pub use domain::{
    ArchivePayload, JournalConfig, JournalError, JournalHeader, JournalOperator, JournalRecord,
    SerializationError, INCREASE_SIZE,
};
pub use ports::{ArchiveSerializer, RecoveryCallback, TimeSource, TransactionLogger};
pub use service::{ArchiveJournal, CompactionReport, JournalDependencies, JournalStats};
