//! [`EventSink`] that persists notifications to a journal.

use std::fs::OpenOptions;
use std::path::Path;

use parking_lot::Mutex;
use strand_canonical::Canonicalizer;
use strand_core::{EventSink, Notification};
use tracing::{error, warn};

use crate::errors::JournalError;
use crate::reader::{JournalReader, ReadMode};
use crate::record::JournalRecord;
use crate::writer::{JournalWriter, WriteOptions};

struct SinkState {
    writer: JournalWriter,
    next_seq: u64,
}

/// Appends every notification to a journal file, numbering records from 0.
///
/// Appending to an existing journal continues its numbering after cutting
/// off any torn tail. Write failures are logged and never fail the operation
/// that emitted the notification.
pub struct JournalSink {
    state: Mutex<SinkState>,
    canonicalizer: Canonicalizer,
}

impl JournalSink {
    /// Opens (or creates) the journal at `path`.
    pub fn open<P: AsRef<Path>>(path: P, options: WriteOptions) -> Result<Self, JournalError> {
        let path = path.as_ref();
        let has_records = std::fs::metadata(path).is_ok_and(|m| m.len() > 0);
        let next_seq = if options.append && has_records {
            let mut reader = JournalReader::open(path, ReadMode::Permissive)?;
            let mut next = 0;
            while let Some(record) = reader.read_record()? {
                next = record.seq + 1;
            }
            let valid_end = reader.position();
            let len = std::fs::metadata(path)?.len();
            if valid_end < len {
                warn!(path = %path.display(), valid_end, len, "dropping torn journal tail");
                OpenOptions::new().write(true).open(path)?.set_len(valid_end)?;
            }
            next
        } else {
            0
        };
        let writer = JournalWriter::open(path, options)?;
        Ok(Self {
            state: Mutex::new(SinkState { writer, next_seq }),
            canonicalizer: Canonicalizer::default(),
        })
    }

    /// Sequence number the next record will get.
    pub fn next_seq(&self) -> u64 {
        self.state.lock().next_seq
    }

    fn append(&self, notification: Notification) -> Result<u64, JournalError> {
        let mut state = self.state.lock();
        let seq = state.next_seq;
        let record = JournalRecord::new(seq, notification, &self.canonicalizer)?;
        state.writer.append_record(&record)?;
        state.next_seq += 1;
        Ok(seq)
    }
}

impl EventSink for JournalSink {
    fn emit(&self, notification: Notification) {
        let kind = notification.kind();
        if let Err(e) = self.append(notification) {
            error!(kind, error = %e, "failed to journal notification");
        }
    }
}
