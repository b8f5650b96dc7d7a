//! Verification helpers for journal records.

use std::path::Path;

use strand_canonical::Canonicalizer;

use crate::errors::JournalError;
use crate::reader::{JournalReader, ReadMode};
use crate::record::JournalRecord;

/// Checks a record's id against its `(seq, notification)`.
pub fn verify_record(
    record: &JournalRecord,
    canonicalizer: &Canonicalizer,
) -> Result<bool, JournalError> {
    let computed = JournalRecord::compute_id(record.seq, &record.notification, canonicalizer)?;
    Ok(computed == record.record_id)
}

/// Outcome of [`verify_journal`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalVerification {
    /// Records read.
    pub records: u64,
    /// Sequence numbers whose record id does not match.
    pub bad_ids: Vec<u64>,
    /// Sequence numbers that break the `0, 1, 2, ...` numbering.
    pub out_of_order: Vec<u64>,
}

impl JournalVerification {
    /// Whether every record verified and the numbering is gapless.
    pub fn is_valid(&self) -> bool {
        self.bad_ids.is_empty() && self.out_of_order.is_empty()
    }
}

/// Reads a whole journal in strict mode and verifies every record.
pub fn verify_journal<P: AsRef<Path>>(
    path: P,
    canonicalizer: &Canonicalizer,
) -> Result<JournalVerification, JournalError> {
    let mut reader = JournalReader::open(path, ReadMode::Strict)?;
    let mut report = JournalVerification::default();
    while let Some(record) = reader.read_record()? {
        if record.seq != report.records {
            report.out_of_order.push(record.seq);
        }
        if !verify_record(&record, canonicalizer)? {
            report.bad_ids.push(record.seq);
        }
        report.records += 1;
    }
    Ok(report)
}
