//! Record filtering for selective iteration.

use strand_canonical::ActorId;

use crate::errors::JournalError;
use crate::reader::JournalReader;
use crate::record::JournalRecord;

/// Predicate over journal records.
pub trait RecordFilter {
    /// Returns true if the record matches.
    fn matches(&self, record: &JournalRecord) -> bool;
}

/// Records concerning one actor.
#[derive(Debug, Clone)]
pub struct ActorFilter {
    /// Actor to match.
    pub actor: ActorId,
}

impl RecordFilter for ActorFilter {
    fn matches(&self, record: &JournalRecord) -> bool {
        record.notification.actor() == Some(&self.actor)
    }
}

/// Records of one notification kind (`"collapse"`, `"intent_executed"`, ...).
#[derive(Debug, Clone)]
pub struct KindFilter {
    /// Kind tag to match.
    pub kind: String,
}

impl RecordFilter for KindFilter {
    fn matches(&self, record: &JournalRecord) -> bool {
        record.notification.kind() == self.kind
    }
}

/// Records whose sequence number lies in `from..=to`.
#[derive(Debug, Clone, Copy)]
pub struct SeqRangeFilter {
    /// Lowest sequence number, inclusive.
    pub from: u64,
    /// Highest sequence number, inclusive.
    pub to: u64,
}

impl RecordFilter for SeqRangeFilter {
    fn matches(&self, record: &JournalRecord) -> bool {
        (self.from..=self.to).contains(&record.seq)
    }
}

/// All filters must match.
pub struct AndFilter {
    /// Filters to combine.
    pub filters: Vec<Box<dyn RecordFilter>>,
}

impl RecordFilter for AndFilter {
    fn matches(&self, record: &JournalRecord) -> bool {
        self.filters.iter().all(|f| f.matches(record))
    }
}

/// Any filter must match.
pub struct OrFilter {
    /// Filters to combine.
    pub filters: Vec<Box<dyn RecordFilter>>,
}

impl RecordFilter for OrFilter {
    fn matches(&self, record: &JournalRecord) -> bool {
        self.filters.iter().any(|f| f.matches(record))
    }
}

/// Reader that yields only matching records.
pub struct FilteredReader<F: RecordFilter> {
    reader: JournalReader,
    filter: F,
}

impl<F: RecordFilter> FilteredReader<F> {
    /// Wraps `reader`.
    pub fn new(reader: JournalReader, filter: F) -> Self {
        Self { reader, filter }
    }

    /// Next matching record; `Ok(None)` at end-of-file.
    pub fn read_record(&mut self) -> Result<Option<JournalRecord>, JournalError> {
        while let Some(record) = self.reader.read_record()? {
            if self.filter.matches(&record) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }
}

impl<F: RecordFilter> Iterator for FilteredReader<F> {
    type Item = Result<JournalRecord, JournalError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}
