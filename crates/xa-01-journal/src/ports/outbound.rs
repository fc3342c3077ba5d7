//! # Outbound Ports (Driven Ports)
//!
//! Dependencies the journal needs from its host.

use crate::domain::errors::SerializationError;
use crate::domain::record::ArchivePayload;

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    /// Current time in milliseconds since the epoch.
    fn now_millis(&self) -> u64;
}

/// Abstract interface for payload serialization.
pub trait ArchiveSerializer: Send + Sync {
    fn serialize(&self, payload: &ArchivePayload) -> Result<Vec<u8>, SerializationError>;

    fn deserialize(&self, data: &[u8]) -> Result<ArchivePayload, SerializationError>;
}
