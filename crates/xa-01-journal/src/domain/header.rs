//! # Journal File Header
//!
//! Written once at creation, rewritten on every append and role switch,
//! validated on every open. Integers are big-endian.
//!
//! Layout:
//! ```text
//! Offset  Size  Description
//!   0       8   Identifier ("XATXJRNL")
//!   8       1   Major version
//!   9       1   Minor version
//!  10       8   Created time (millis)
//!  18       4   Start index of the record area
//!  22       1   Marked flag
//!  23       1   Master flag
//!  24       8   Modified time (millis)
//!  32       4   End index (end of valid data)
//! ```

use std::path::Path;

use super::errors::JournalError;

/// Magic identifier at the start of every journal file.
pub const JOURNAL_IDENTIFIER: [u8; 8] = *b"XATXJRNL";

/// Current format version.
pub const JOURNAL_MAJOR_VERSION: u8 = 1;
pub const JOURNAL_MINOR_VERSION: u8 = 0;

/// Encoded header length.
pub const HEADER_SIZE: usize = 36;

/// Default start of the record area (header plus reserved space).
pub const DEFAULT_START_INDEX: u32 = 64;

const MAJOR_OFFSET: usize = 8;
const MINOR_OFFSET: usize = 9;
const CREATED_OFFSET: usize = 10;
const START_OFFSET: usize = 18;
const MARKED_OFFSET: usize = 22;
const MASTER_OFFSET: usize = 23;
const MODIFIED_OFFSET: usize = 24;
const END_OFFSET: usize = 32;

/// Parsed journal header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalHeader {
    pub major: u8,
    pub minor: u8,
    pub created_time: u64,
    pub start_index: u32,
    pub marked: bool,
    pub master: bool,
    pub modified_time: u64,
    pub end_index: u32,
}

impl JournalHeader {
    /// Header for a freshly created, empty file.
    pub fn new(now: u64, master: bool) -> Self {
        Self {
            major: JOURNAL_MAJOR_VERSION,
            minor: JOURNAL_MINOR_VERSION,
            created_time: now,
            start_index: DEFAULT_START_INDEX,
            marked: false,
            master,
            modified_time: now,
            end_index: DEFAULT_START_INDEX,
        }
    }

    /// Bytes of record data between start and end.
    pub fn used(&self) -> u64 {
        u64::from(self.end_index - self.start_index)
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..MAJOR_OFFSET].copy_from_slice(&JOURNAL_IDENTIFIER);
        buf[MAJOR_OFFSET] = self.major;
        buf[MINOR_OFFSET] = self.minor;
        buf[CREATED_OFFSET..START_OFFSET].copy_from_slice(&self.created_time.to_be_bytes());
        buf[START_OFFSET..MARKED_OFFSET].copy_from_slice(&self.start_index.to_be_bytes());
        buf[MARKED_OFFSET] = u8::from(self.marked);
        buf[MASTER_OFFSET] = u8::from(self.master);
        buf[MODIFIED_OFFSET..END_OFFSET].copy_from_slice(&self.modified_time.to_be_bytes());
        buf[END_OFFSET..HEADER_SIZE].copy_from_slice(&self.end_index.to_be_bytes());
        buf
    }

    /// Parse and validate a header read from `path`.
    pub fn decode(path: &Path, buf: &[u8], file_len: u64) -> Result<Self, JournalError> {
        if buf.len() < HEADER_SIZE {
            return Err(JournalError::corrupt(
                path,
                format!("header too small: expected {HEADER_SIZE}, got {}", buf.len()),
            ));
        }
        if buf[..MAJOR_OFFSET] != JOURNAL_IDENTIFIER {
            return Err(JournalError::corrupt(path, "invalid journal identifier"));
        }

        let major = buf[MAJOR_OFFSET];
        let minor = buf[MINOR_OFFSET];
        if major != JOURNAL_MAJOR_VERSION {
            return Err(JournalError::UnsupportedVersion { major, minor });
        }

        let header = Self {
            major,
            minor,
            created_time: read_u64(buf, CREATED_OFFSET),
            start_index: read_u32(buf, START_OFFSET),
            marked: read_flag(path, buf[MARKED_OFFSET], "marked")?,
            master: read_flag(path, buf[MASTER_OFFSET], "master")?,
            modified_time: read_u64(buf, MODIFIED_OFFSET),
            end_index: read_u32(buf, END_OFFSET),
        };

        if (header.start_index as usize) < HEADER_SIZE {
            return Err(JournalError::corrupt(
                path,
                format!("start index {} overlaps header", header.start_index),
            ));
        }
        if header.end_index < header.start_index {
            return Err(JournalError::corrupt(
                path,
                format!(
                    "end index {} before start index {}",
                    header.end_index, header.start_index
                ),
            ));
        }
        if u64::from(header.end_index) > file_len {
            return Err(JournalError::corrupt(
                path,
                format!("end index {} beyond file length {}", header.end_index, file_len),
            ));
        }
        Ok(header)
    }
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_be_bytes(bytes)
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_be_bytes(bytes)
}

fn read_flag(path: &Path, value: u8, name: &str) -> Result<bool, JournalError> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(JournalError::corrupt(
            path,
            format!("invalid {name} flag value {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> &'static Path {
        Path::new("journal-1.log")
    }

    #[test]
    fn test_header_encode_decode() {
        let mut header = JournalHeader::new(1_000, true);
        header.end_index = 200;
        header.modified_time = 2_000;

        let bytes = header.encode();
        let decoded = JournalHeader::decode(path(), &bytes, 4096).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.used(), 136);
    }

    #[test]
    fn test_header_rejects_bad_identifier() {
        let mut bytes = JournalHeader::new(1, false).encode();
        bytes[0] = b'Z';
        let err = JournalHeader::decode(path(), &bytes, 4096).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_header_rejects_future_major() {
        let mut bytes = JournalHeader::new(1, false).encode();
        bytes[MAJOR_OFFSET] = JOURNAL_MAJOR_VERSION + 1;
        let err = JournalHeader::decode(path(), &bytes, 4096).unwrap_err();
        assert!(matches!(err, JournalError::UnsupportedVersion { .. }));
    }

    #[test]
    fn test_header_rejects_end_beyond_file() {
        let mut header = JournalHeader::new(1, false);
        header.end_index = 10_000;
        let err = JournalHeader::decode(path(), &header.encode(), 4096).unwrap_err();
        assert!(err.to_string().contains("beyond file length"));
    }

    #[test]
    fn test_header_rejects_invalid_flag() {
        let mut bytes = JournalHeader::new(1, false).encode();
        bytes[MASTER_OFFSET] = 7;
        assert!(JournalHeader::decode(path(), &bytes, 4096).is_err());
    }
}
