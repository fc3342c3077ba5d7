//! # Domain Errors
//!
//! Error types for the journal.
//!
//! ## Design Principles
//!
//! - `Corrupt` is fatal: the journal refuses to open rather than guess.
//! - I/O failures on the append path are always surfaced to the caller.
//! - No panics in domain logic (use Result instead).

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing the journal.
#[derive(Debug, Error)]
pub enum JournalError {
    /// Underlying file I/O failed.
    #[error("Journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Header or record area failed validation.
    #[error("Journal corrupt ({path}): {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// File was written by an incompatible format version.
    #[error("Unsupported journal version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    /// Record cannot be addressed by the 4-byte offsets of the format.
    #[error("Journal record too large: {size} bytes")]
    RecordTooLarge { size: usize },

    /// Payload could not be encoded or decoded.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Another process holds the journal directory.
    #[error("Journal locked: {message}")]
    Locked { message: String },
}

impl JournalError {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        JournalError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that must stop startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            JournalError::Corrupt { .. } | JournalError::UnsupportedVersion { .. }
        )
    }
}

/// Serialization errors.
#[derive(Debug, Clone, Error)]
#[error("Serialization error: {message}")]
pub struct SerializationError {
    pub message: String,
}

impl From<SerializationError> for JournalError {
    fn from(err: SerializationError) -> Self {
        JournalError::Serialization {
            message: err.message,
        }
    }
}
