//! # Domain Layer
//!
//! Pure journal types: header and record encodings, configuration, replay.
//! No file handles live here.

pub mod config;
pub mod errors;
pub mod header;
pub mod record;
pub mod replay;

pub use config::{JournalConfig, DEFAULT_INITIAL_SIZE, INCREASE_SIZE};
pub use errors::{JournalError, SerializationError};
pub use header::{JournalHeader, DEFAULT_START_INDEX, HEADER_SIZE, JOURNAL_IDENTIFIER};
pub use record::{ArchivePayload, JournalOperator, JournalRecord, RECORD_PREFIX_SIZE};
pub use replay::{deleted_ids, replay_records};
