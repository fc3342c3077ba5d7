//! # Journal Records
//!
//! ```text
//! Offset  Size  Description
//!   0      32   Global transaction id
//!  32       1   Operator (CREATE=1, MODIFY=2, DELETE=3)
//!  33       4   Payload length (big-endian)
//!  37       N   Payload (bincode ArchivePayload)
//! ```

use serde::{Deserialize, Serialize};
use shared_types::{GlobalId, ResourceArchive, TransactionArchive, GLOBAL_TRANSACTION_ID_LEN};

/// Bytes preceding the payload.
pub const RECORD_PREFIX_SIZE: usize = GLOBAL_TRANSACTION_ID_LEN + 1 + 4;

/// Kind of mutation a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JournalOperator {
    Create,
    Modify,
    Delete,
}

impl JournalOperator {
    pub fn as_byte(&self) -> u8 {
        match self {
            JournalOperator::Create => 1,
            JournalOperator::Modify => 2,
            JournalOperator::Delete => 3,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(JournalOperator::Create),
            2 => Some(JournalOperator::Modify),
            3 => Some(JournalOperator::Delete),
            _ => None,
        }
    }
}

/// Archive carried in a record payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchivePayload {
    Transaction(TransactionArchive),
    Resource(ResourceArchive),
}

/// One entry of the append-only record stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalRecord {
    pub global_id: GlobalId,
    pub operator: JournalOperator,
    /// Serialized `ArchivePayload`.
    pub payload: Vec<u8>,
}

impl JournalRecord {
    pub fn new(global_id: GlobalId, operator: JournalOperator, payload: Vec<u8>) -> Self {
        Self {
            global_id,
            operator,
            payload,
        }
    }

    /// Total encoded length.
    pub fn encoded_len(&self) -> usize {
        RECORD_PREFIX_SIZE + self.payload.len()
    }

    /// Append the encoded record to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.reserve(self.encoded_len());
        buf.extend_from_slice(&self.global_id);
        buf.push(self.operator.as_byte());
        buf.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(&self.payload);
    }

    /// Decode the record starting at `buf[0]`.
    ///
    /// Returns the record and the number of bytes consumed, or a description
    /// of what is wrong with the bytes.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), String> {
        if buf.len() < RECORD_PREFIX_SIZE {
            return Err(format!(
                "truncated record prefix: {} of {RECORD_PREFIX_SIZE} bytes",
                buf.len()
            ));
        }

        let mut global_id = [0u8; GLOBAL_TRANSACTION_ID_LEN];
        global_id.copy_from_slice(&buf[..GLOBAL_TRANSACTION_ID_LEN]);

        let op_byte = buf[GLOBAL_TRANSACTION_ID_LEN];
        let operator = JournalOperator::from_byte(op_byte)
            .ok_or_else(|| format!("unknown operator {op_byte}"))?;

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&buf[GLOBAL_TRANSACTION_ID_LEN + 1..RECORD_PREFIX_SIZE]);
        let payload_len = u32::from_be_bytes(len_bytes) as usize;

        let end = RECORD_PREFIX_SIZE + payload_len;
        if buf.len() < end {
            return Err(format!(
                "truncated payload: need {payload_len} bytes, {} available",
                buf.len() - RECORD_PREFIX_SIZE
            ));
        }

        Ok((
            Self {
                global_id,
                operator,
                payload: buf[RECORD_PREFIX_SIZE..end].to_vec(),
            },
            end,
        ))
    }
}
