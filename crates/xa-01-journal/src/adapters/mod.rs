//! # Adapters Module
//!
//! - `file`: one journal file (header + record area)
//! - `lock`: directory process lock (singleton guard)
//! - `memory`: in-memory `TransactionLogger` for tests
//! - `serializer`, `time`: default outbound port implementations

pub mod file;
pub mod lock;
pub mod memory;
pub mod serializer;
pub mod time;

pub use file::JournalFile;
pub use lock::JournalLock;
pub use memory::InMemoryTransactionLogger;
pub use serializer::BincodeArchiveSerializer;
pub use time::SystemTimeSource;
