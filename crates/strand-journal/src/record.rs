use serde::{Deserialize, Serialize};
use serde_json::json;
use strand_canonical::{compute_content_id, Canonicalizer, ContentDomain, Digest};
use strand_core::Notification;

use crate::errors::JournalError;

/// One journaled notification.
///
/// `record_id` commits to both the sequence number and the notification, so
/// a record moved to another position no longer verifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    /// Content id of `(seq, notification)`.
    pub record_id: Digest,
    /// Position in the journal, starting at 0.
    pub seq: u64,
    /// The notification itself.
    pub notification: Notification,
}

impl JournalRecord {
    /// Wraps `notification` as record number `seq`.
    pub fn new(
        seq: u64,
        notification: Notification,
        canonicalizer: &Canonicalizer,
    ) -> Result<Self, JournalError> {
        let record_id = Self::compute_id(seq, &notification, canonicalizer)?;
        Ok(Self {
            record_id,
            seq,
            notification,
        })
    }

    /// Record id for `(seq, notification)`.
    pub fn compute_id(
        seq: u64,
        notification: &Notification,
        canonicalizer: &Canonicalizer,
    ) -> Result<Digest, JournalError> {
        let preimage = json!({ "seq": seq, "notification": notification });
        Ok(compute_content_id(
            ContentDomain::Notification,
            &preimage,
            canonicalizer,
        )?)
    }
}
