//! Change journal: durable append of committed batches.
//!
//! Each record is a little-endian `u32` length followed by a MessagePack
//! encoded [`JournalRecord`]. A batch is final only once its record has
//! been appended.

use crate::core::{CoordError, Result, SessionId, Zxid};
use crate::transaction::{ChangeEvent, Op};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// One committed batch as written to the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub zxid: Zxid,
    pub time: i64,
    pub session: SessionId,
    pub ops: Vec<Op>,
    pub events: Vec<ChangeEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DurabilityMode {
    /// fsync after every record
    Sync,
    /// flush to the OS after every record
    #[default]
    Async,
    /// journal disabled
    None,
}

/// Durable sink for committed batches.
pub trait ChangeLog: Send + Sync {
    fn append(&mut self, record: &JournalRecord) -> Result<()>;

    /// Records appended through this handle.
    fn appended(&self) -> u64;
}

/// Journal that keeps nothing.
#[derive(Debug, Default)]
pub struct NullChangeLog {
    appended: u64,
}

impl ChangeLog for NullChangeLog {
    fn append(&mut self, _record: &JournalRecord) -> Result<()> {
        self.appended += 1;
        Ok(())
    }

    fn appended(&self) -> u64 {
        self.appended
    }
}

pub struct FileChangeLog {
    path: PathBuf,
    file: Option<BufWriter<File>>,
    durability: DurabilityMode,
    appended: u64,
}

impl FileChangeLog {
    /// Open the journal for appending, creating it and its directory if needed.
    pub fn open<P: AsRef<Path>>(path: P, durability: DurabilityMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| CoordError::Journal(format!("Failed to create journal directory: {}", e)))?;
        }

        let file = if durability != DurabilityMode::None {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| CoordError::Journal(format!("Failed to open journal: {}", e)))?;
            Some(BufWriter::new(file))
        } else {
            None
        };
        debug!("journal opened at {} ({:?})", path.display(), durability);

        Ok(Self {
            path,
            file,
            durability,
            appended: 0,
        })
    }

    /// Location of the journal file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every complete record. A torn record at the tail (a crash in
    /// the middle of an append) ends the replay.
    pub fn read_all<P: AsRef<Path>>(path: P) -> Result<Vec<JournalRecord>> {
        Ok(Self::scan(path)?.records)
    }

    /// Read every complete record and locate where the complete prefix ends.
    pub fn scan<P: AsRef<Path>>(path: P) -> Result<JournalScan> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(JournalScan::default());
        }
        let file = File::open(path)
            .map_err(|e| CoordError::Journal(format!("Failed to open journal for reading: {}", e)))?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        let mut offset = 0u64;

        while offset < file_len {
            let remaining = file_len - offset;
            if remaining < 4 {
                warn!("journal {} ends with a torn length prefix at {}", path.display(), offset);
                break;
            }
            let mut len_bytes = [0u8; 4];
            reader
                .read_exact(&mut len_bytes)
                .map_err(|e| CoordError::Journal(format!("Failed to read record length: {}", e)))?;
            let len = u32::from_le_bytes(len_bytes) as u64;
            // a length running past the end of the file can only be a torn append
            if len > remaining - 4 {
                warn!(
                    "journal {} ends with a torn record of {} bytes at {}, ignoring it",
                    path.display(),
                    len,
                    offset
                );
                break;
            }
            let mut data = vec![0u8; len as usize];
            reader
                .read_exact(&mut data)
                .map_err(|e| CoordError::Journal(format!("Failed to read record: {}", e)))?;
            let record: JournalRecord = rmp_serde::from_slice(&data)
                .map_err(|e| CoordError::Journal(format!("Failed to decode record: {}", e)))?;
            records.push(record);
            offset += 4 + len;
        }

        Ok(JournalScan {
            records,
            valid_len: offset,
            file_len,
        })
    }

    /// Open for appending after cutting off a torn tail. Returns the
    /// complete records for replay alongside the handle.
    pub fn recover<P: AsRef<Path>>(path: P, durability: DurabilityMode) -> Result<(Self, Vec<JournalRecord>)> {
        let path = path.as_ref();
        let scan = Self::scan(path)?;
        if scan.valid_len < scan.file_len {
            let file = OpenOptions::new()
                .write(true)
                .open(path)
                .map_err(|e| CoordError::Journal(format!("Failed to open journal for repair: {}", e)))?;
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
            warn!(
                "journal {} truncated from {} to {} bytes",
                path.display(),
                scan.file_len,
                scan.valid_len
            );
        }
        let log = Self::open(path, durability)?;
        Ok((log, scan.records))
    }
}

/// Outcome of [`FileChangeLog::scan`].
#[derive(Debug, Default)]
pub struct JournalScan {
    pub records: Vec<JournalRecord>,
    /// Byte length of the complete-record prefix
    pub valid_len: u64,
    pub file_len: u64,
}

impl ChangeLog for FileChangeLog {
    fn append(&mut self, record: &JournalRecord) -> Result<()> {
        if self.durability == DurabilityMode::None {
            return Ok(());
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CoordError::Journal("journal file not initialized".to_string()))?;
        let serialized = rmp_serde::to_vec(record)
            .map_err(|e| CoordError::Journal(format!("Failed to encode record: {}", e)))?;
        let len = serialized.len() as u32;
        file.write_all(&len.to_le_bytes())?;
        file.write_all(&serialized)?;
        file.flush()?;
        if self.durability == DurabilityMode::Sync {
            file.get_mut().sync_all()?;
        }
        self.appended += 1;
        Ok(())
    }

    fn appended(&self) -> u64 {
        self.appended
    }
}
