//! # Journal File
//!
//! One of the two journal files: header plus append-only record area.
//! The header's end index is advanced only after the record bytes are
//! durable, so everything between start and end is always complete.
//!
//! ```text
//! ┌──────────┬──────────┬───────────────────────────┬────────────────┐
//! │  header  │ reserved │  records [start .. end)   │  preallocated  │
//! └──────────┴──────────┴───────────────────────────┴────────────────┘
//! 0          36         64                          end              capacity
//! ```

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::domain::errors::JournalError;
use crate::domain::header::{JournalHeader, HEADER_SIZE};
use crate::domain::record::JournalRecord;

/// Open handle to one journal file.
#[derive(Debug)]
pub struct JournalFile {
    path: PathBuf,
    file: File,
    header: JournalHeader,
    capacity: u64,
}

impl JournalFile {
    /// Create (or truncate) a journal file with an empty record area.
    pub fn create(path: &Path, initial_size: u64, now: u64, master: bool) -> Result<Self, JournalError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let header = JournalHeader::new(now, master);
        let capacity = initial_size.max(u64::from(header.start_index));

        let mut journal = Self {
            path: path.to_path_buf(),
            file,
            header,
            capacity: 0,
        };
        journal.grow_to(capacity)?;
        journal.write_header()?;
        journal.file.sync_all()?;

        debug!(path = %path.display(), capacity, master, "[xa-01] Created journal file");
        Ok(journal)
    }

    /// Open an existing journal file and validate its header.
    pub fn open(path: &Path) -> Result<Self, JournalError> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let capacity = file.metadata()?.len();

        let mut buf = [0u8; HEADER_SIZE];
        if capacity < HEADER_SIZE as u64 {
            return Err(JournalError::corrupt(
                path,
                format!("file length {capacity} shorter than header"),
            ));
        }
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut buf)?;
        let header = JournalHeader::decode(path, &buf, capacity)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            header,
            capacity,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &JournalHeader {
        &self.header
    }

    pub fn is_master(&self) -> bool {
        self.header.master
    }

    pub fn is_marked(&self) -> bool {
        self.header.marked
    }

    /// Allocated size of the file.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes available to the record area.
    pub fn record_capacity(&self) -> u64 {
        self.capacity.saturating_sub(u64::from(self.header.start_index))
    }

    /// Bytes of valid record data.
    pub fn used(&self) -> u64 {
        self.header.used()
    }

    /// Read every record between start and end.
    pub fn read_records(&mut self) -> Result<Vec<JournalRecord>, JournalError> {
        let start = u64::from(self.header.start_index);
        let len = self.used() as usize;
        let mut buf = vec![0u8; len];
        self.file.seek(SeekFrom::Start(start))?;
        self.file.read_exact(&mut buf)?;

        let mut records = Vec::new();
        let mut offset = 0usize;
        while offset < buf.len() {
            let (record, consumed) = JournalRecord::decode(&buf[offset..]).map_err(|reason| {
                JournalError::corrupt(
                    &self.path,
                    format!("record at offset {}: {reason}", start + offset as u64),
                )
            })?;
            records.push(record);
            offset += consumed;
        }
        Ok(records)
    }

    pub fn append(
        &mut self,
        record: &JournalRecord,
        now: u64,
        increase_size: u64,
    ) -> Result<(), JournalError> {
        self.append_batch(std::slice::from_ref(record), now, increase_size)
    }

    /// Append records, growing the file in `increase_size` steps if needed.
    ///
    /// Returns once both the records and the updated header are synced.
    pub fn append_batch(
        &mut self,
        records: &[JournalRecord],
        now: u64,
        increase_size: u64,
    ) -> Result<(), JournalError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::with_capacity(records.iter().map(JournalRecord::encoded_len).sum());
        for record in records {
            record.encode_into(&mut buf);
        }

        let end = u64::from(self.header.end_index);
        let new_end = end + buf.len() as u64;
        let new_end_index =
            u32::try_from(new_end).map_err(|_| JournalError::RecordTooLarge { size: buf.len() })?;

        if new_end > self.capacity {
            let step = increase_size.max(1);
            let shortfall = new_end - self.capacity;
            let steps = shortfall.div_ceil(step);
            self.grow_to(self.capacity + steps * step)?;
        }

        self.file.seek(SeekFrom::Start(end))?;
        self.file.write_all(&buf)?;
        self.file.sync_data()?;

        self.header.end_index = new_end_index;
        self.header.modified_time = now;
        self.write_header()?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Extend the allocation by `increase_size`.
    pub fn grow(&mut self, increase_size: u64) -> Result<(), JournalError> {
        let target = self.capacity + increase_size;
        self.grow_to(target)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Drop every record.
    pub fn reset(&mut self, now: u64) -> Result<(), JournalError> {
        self.header.end_index = self.header.start_index;
        self.header.modified_time = now;
        self.flush_header()
    }

    /// Swap step 1: flag this file as the one being promoted.
    pub fn mark_as_master(&mut self, now: u64) -> Result<(), JournalError> {
        self.header.marked = true;
        self.header.modified_time = now;
        self.flush_header()
    }

    /// Swap step 2: demote to slave and discard the records.
    pub fn switch_to_slave(&mut self, now: u64) -> Result<(), JournalError> {
        self.header.master = false;
        self.header.marked = false;
        self.header.end_index = self.header.start_index;
        self.header.modified_time = now;
        self.flush_header()
    }

    /// Swap step 3: become master and clear the mark.
    pub fn switch_to_master(&mut self, now: u64) -> Result<(), JournalError> {
        self.header.master = true;
        self.header.marked = false;
        self.header.modified_time = now;
        self.flush_header()
    }

    /// Best-effort flush, used on shutdown.
    pub fn sync(&self) -> Result<(), JournalError> {
        self.file.sync_all()?;
        Ok(())
    }

    fn flush_header(&mut self) -> Result<(), JournalError> {
        self.write_header()?;
        self.file.sync_data()?;
        Ok(())
    }

    fn write_header(&mut self) -> Result<(), JournalError> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.header.encode())?;
        Ok(())
    }

    fn grow_to(&mut self, target: u64) -> Result<(), JournalError> {
        if target <= self.capacity {
            return Ok(());
        }
        self.file.allocate(target)?;
        if self.file.metadata()?.len() < target {
            self.file.set_len(target)?;
        }
        debug!(
            path = %self.path.display(),
            from = self.capacity,
            to = target,
            "[xa-01] Grew journal file"
        );
        self.capacity = target;
        Ok(())
    }
}
