//! Journal reader implementation.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::Path;

use tracing::warn;

use crate::errors::JournalError;
use crate::frame::{FrameKind, JournalHeader, RecordFrame, FRAME_HEADER_SIZE, HEADER_SIZE};
use crate::record::JournalRecord;

/// Read mode for handling truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Strict mode: truncated frames are errors.
    Strict,
    /// Permissive mode: a truncated tail is treated as end-of-file.
    Permissive,
}

/// Sequential reader over a journal file.
///
/// A torn final frame (a crash mid-append) is an error in
/// [`ReadMode::Strict`] and the end of the journal in
/// [`ReadMode::Permissive`]. Frames of unknown kind are skipped.
///
/// ```rust
/// use strand_journal::{JournalReader, JournalWriter, ReadMode, WriteOptions};
///
/// let dir = tempfile::TempDir::new()?;
/// let path = dir.path().join("empty.stj");
/// JournalWriter::open(&path, WriteOptions::default())?.finish()?;
///
/// let mut reader = JournalReader::open(&path, ReadMode::Strict)?;
/// assert!(reader.read_record()?.is_none());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct JournalReader {
    file: BufReader<File>,
    len: u64,
    mode: ReadMode,
    position: u64,
}

impl JournalReader {
    /// Opens a journal and validates its header.
    pub fn open<P: AsRef<Path>>(path: P, mode: ReadMode) -> Result<Self, JournalError> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        let mut file = BufReader::new(file);
        file.seek(io::SeekFrom::Start(0))?;
        let mut header = [0u8; HEADER_SIZE];
        file.read_exact(&mut header).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                JournalError::InvalidHeader(format!("header too short: {len} bytes"))
            }
            _ => e.into(),
        })?;
        JournalHeader::from_bytes(&header)?;
        Ok(Self {
            file,
            len,
            mode,
            position: HEADER_SIZE as u64,
        })
    }

    /// Byte offset of the next frame. After a permissive read hits a torn
    /// tail this is the end of the last complete frame.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Reads the next frame of any kind; `Ok(None)` at end-of-file.
    pub fn read_frame(&mut self) -> Result<Option<(FrameKind, Vec<u8>)>, JournalError> {
        if self.position >= self.len {
            return Ok(None);
        }
        let start = self.position;

        let mut header = [0u8; FRAME_HEADER_SIZE];
        if !self.read_exact_or_truncated(&mut header, start)? {
            return Ok(None);
        }
        let frame = RecordFrame::from_bytes(&header, start)?;

        let mut payload = vec![0u8; frame.len as usize];
        if !self.read_exact_or_truncated(&mut payload, start)? {
            return Ok(None);
        }
        self.position = start + FRAME_HEADER_SIZE as u64 + u64::from(frame.len);
        Ok(Some((frame.kind, payload)))
    }

    /// Returns false when the file ends inside `buf` in permissive mode.
    fn read_exact_or_truncated(&mut self, buf: &mut [u8], start: u64) -> Result<bool, JournalError> {
        match self.file.read_exact(buf) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => match self.mode {
                ReadMode::Permissive => {
                    warn!(offset = start, "ignoring truncated journal tail");
                    self.position = start;
                    self.len = start;
                    Ok(false)
                }
                ReadMode::Strict => Err(JournalError::TruncatedFrame { offset: start }),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Reads the next record, skipping unknown frame kinds.
    pub fn read_record(&mut self) -> Result<Option<JournalRecord>, JournalError> {
        loop {
            match self.read_frame()? {
                None => return Ok(None),
                Some((FrameKind::Record, payload)) => {
                    let text = std::str::from_utf8(&payload)?;
                    return Ok(Some(serde_json::from_str(text)?));
                }
                Some((FrameKind::Unknown(_), _)) => continue,
            }
        }
    }

    /// Reads every remaining record.
    pub fn read_all(&mut self) -> Result<Vec<JournalRecord>, JournalError> {
        let mut records = Vec::new();
        while let Some(record) = self.read_record()? {
            records.push(record);
        }
        Ok(records)
    }
}

impl Iterator for JournalReader {
    type Item = Result<JournalRecord, JournalError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}
