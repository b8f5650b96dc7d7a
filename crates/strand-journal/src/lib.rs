//! Append-only journal of Strand settlement notifications.
//!
//! This crate provides:
//! - Framed, append-only storage for [`Notification`](strand_core::Notification)s
//! - Reader/writer APIs with strict and permissive truncation handling
//! - Content-addressed record ids and whole-journal verification
//! - Record filters for selective replay
//! - [`JournalSink`], an `EventSink` that persists everything the kernel emits
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use strand_canonical::{payload_ref, Canonicalizer, PrincipalId};
//! use strand_core::{EngineConfig, SettlementEngine};
//! use strand_journal::{verify_journal, JournalReader, JournalSink, ReadMode, WriteOptions};
//!
//! let dir = tempfile::TempDir::new()?;
//! let path = dir.path().join("settlement.stj");
//!
//! let sink = Arc::new(JournalSink::open(&path, WriteOptions::default())?);
//! let owner = PrincipalId::parse("acct:owner")?;
//! let engine = SettlementEngine::new(EngineConfig::default(), owner, sink)?;
//!
//! let alice = PrincipalId::parse("acct:alice")?;
//! let ctx = engine.call_as(&alice);
//! engine.registry().register_branch(&ctx, &alice, 1, payload_ref(b"order"))?;
//! engine.registry().settle(&ctx, &alice, 1)?;
//!
//! let records = JournalReader::open(&path, ReadMode::Strict)?.read_all()?;
//! assert_eq!(records.len(), 2);
//! assert!(verify_journal(&path, &Canonicalizer::default())?.is_valid());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Format
//!
//! A 16-byte header (`STJ1`, LE version, LE flags, reserved zeros) followed
//! by frames of an 8-byte header (kind, 3 reserved zeros, LE length) and a
//! UTF-8 JSON [`JournalRecord`].

#![deny(missing_docs)]

/// Error types for journal operations.
pub mod errors;
/// Record filters.
pub mod filter;
/// Frame structure and serialization.
pub mod frame;
/// Journal reader implementation.
pub mod reader;
/// Journal record type.
pub mod record;
/// Journal-backed notification sink.
pub mod sink;
/// Verification helpers for journal records.
pub mod verification;
/// Journal writer implementation.
pub mod writer;

pub use errors::JournalError;
pub use filter::{
    ActorFilter, AndFilter, FilteredReader, KindFilter, OrFilter, RecordFilter, SeqRangeFilter,
};
pub use frame::{FrameKind, JournalHeader, RecordFrame};
pub use reader::{JournalReader, ReadMode};
pub use record::JournalRecord;
pub use sink::JournalSink;
pub use verification::{verify_journal, verify_record, JournalVerification};
pub use writer::{JournalWriter, WriteOptions};
