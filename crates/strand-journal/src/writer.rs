//! Journal writer implementation.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, Write};
use std::path::Path;

use tracing::{debug, error};

use crate::errors::JournalError;
use crate::frame::{FrameKind, JournalHeader, RecordFrame, HEADER_SIZE};
use crate::record::JournalRecord;

/// Options for journal writing.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Whether to fsync after each append (default: false).
    pub sync: bool,
    /// Whether to create the file if it doesn't exist (default: true).
    pub create: bool,
    /// Whether to keep existing records (default: true). When false the
    /// journal is truncated back to its header.
    pub append: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            sync: false,
            create: true,
            append: true,
        }
    }
}

/// Appends framed [`JournalRecord`]s to a journal file.
///
/// ```rust
/// use strand_canonical::{Canonicalizer, PrincipalId};
/// use strand_core::Notification;
/// use strand_journal::{JournalRecord, JournalWriter, WriteOptions};
///
/// let dir = tempfile::TempDir::new()?;
/// let path = dir.path().join("settlement.stj");
///
/// let notification = Notification::AuthorizationChanged {
///     principal: PrincipalId::parse("acct:relayer")?,
///     allowed: true,
/// };
/// let record = JournalRecord::new(0, notification, &Canonicalizer::default())?;
///
/// let mut writer = JournalWriter::open(&path, WriteOptions::default())?;
/// writer.append_record(&record)?;
/// writer.finish()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct JournalWriter {
    file: File,
    sync: bool,
    broken: bool,
}

impl JournalWriter {
    /// Opens or creates a journal file for writing.
    ///
    /// An empty file gets a fresh header. A non-empty file must start with a
    /// valid header; it is then appended to, or truncated to the header when
    /// `options.append` is false.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened, is shorter than a header, or
    /// carries an invalid header.
    pub fn open<P: AsRef<Path>>(path: P, options: WriteOptions) -> Result<Self, JournalError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(options.create)
            .truncate(false)
            .write(true)
            .read(true)
            .open(path)?;
        let mut writer = Self {
            file,
            sync: options.sync,
            broken: false,
        };

        let len = writer.file.metadata()?.len();
        if len == 0 {
            writer.write_header()?;
        } else if len < HEADER_SIZE as u64 {
            return Err(JournalError::FileNotEmpty);
        } else {
            let mut header = [0u8; HEADER_SIZE];
            writer.file.seek(io::SeekFrom::Start(0))?;
            writer.file.read_exact(&mut header)?;
            JournalHeader::from_bytes(&header)?;
            if options.append {
                writer.file.seek(io::SeekFrom::End(0))?;
            } else {
                writer.file.set_len(HEADER_SIZE as u64)?;
                writer.file.seek(io::SeekFrom::Start(HEADER_SIZE as u64))?;
            }
        }
        debug!(path = %path.display(), append = options.append, "journal opened for writing");
        Ok(writer)
    }

    fn write_header(&mut self) -> Result<(), JournalError> {
        self.file.write_all(&JournalHeader::current().to_bytes())?;
        self.flush()
    }

    /// Appends one record as a `Record` frame.
    pub fn append_record(&mut self, record: &JournalRecord) -> Result<(), JournalError> {
        let json = serde_json::to_vec(record)?;
        self.append_raw(FrameKind::Record, &json)
    }

    /// Appends a raw frame with the given kind and payload.
    ///
    /// A failed append leaves no partial frame behind: the file is cut back
    /// to the offset the frame started at, so the next append follows the
    /// last complete frame.
    pub fn append_raw(&mut self, kind: FrameKind, payload: &[u8]) -> Result<(), JournalError> {
        let frame = RecordFrame::new(kind, payload.len())?;
        self.write_frame(|file| {
            file.write_all(&frame.to_bytes())?;
            file.write_all(payload)
        })
    }

    fn write_frame<F>(&mut self, write: F) -> Result<(), JournalError>
    where
        F: FnOnce(&mut File) -> io::Result<()>,
    {
        if self.broken {
            return Err(JournalError::Io(io::Error::other(
                "journal writer unusable after a failed rollback",
            )));
        }
        let start = self.file.stream_position()?;
        let written = write(&mut self.file)
            .map_err(JournalError::from)
            .and_then(|()| self.flush());
        if written.is_err() {
            self.rewind_to(start);
        }
        written
    }

    fn rewind_to(&mut self, offset: u64) {
        let restored = self
            .file
            .set_len(offset)
            .and_then(|()| self.file.seek(io::SeekFrom::Start(offset)));
        if let Err(e) = restored {
            error!(offset, error = %e, "failed to drop partial journal frame");
            self.broken = true;
        }
    }

    fn flush(&mut self) -> Result<(), JournalError> {
        self.file.flush()?;
        if self.sync {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Flushes and closes the file.
    pub fn finish(mut self) -> Result<(), JournalError> {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{JournalReader, ReadMode};
    use strand_canonical::{Canonicalizer, PrincipalId};
    use strand_core::Notification;

    fn make_record(seq: u64) -> JournalRecord {
        let notification = Notification::AuthorizationChanged {
            principal: PrincipalId::parse("acct:relayer").unwrap(),
            allowed: true,
        };
        JournalRecord::new(seq, notification, &Canonicalizer::default()).unwrap()
    }

    #[test]
    fn failed_write_leaves_no_partial_frame() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("test.stj");
        let mut writer = JournalWriter::open(&path, WriteOptions::default()).unwrap();
        writer.append_record(&make_record(0)).unwrap();
        let good_len = std::fs::metadata(&path).unwrap().len();

        let frame = RecordFrame::new(FrameKind::Record, 64).unwrap();
        let err = writer
            .write_frame(|file| {
                file.write_all(&frame.to_bytes())?;
                file.write_all(b"{\"partial\"")?;
                Err(io::Error::other("no space left on device"))
            })
            .unwrap_err();
        assert!(matches!(err, JournalError::Io(_)));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), good_len);

        writer.append_record(&make_record(1)).unwrap();
        writer.finish().unwrap();

        let records = JournalReader::open(&path, ReadMode::Strict)
            .unwrap()
            .read_all()
            .unwrap();
        assert_eq!(records, vec![make_record(0), make_record(1)]);
    }
}
