//! Canonical primitives shared by every Strand crate.
//!
//! Anything that participates in hashing lives here: the digest type, the
//! validated identifiers, the canonical JSON encoder, and the
//! domain-separated content id functions used for intent ids, payload
//! references, and journal record ids.
//!
#![deny(missing_docs)]

/// Canonical JSON encoding for deterministic hashing.
pub mod canonicalizer;
/// Domain-separated content identifiers.
pub mod content_id;
/// Digest primitives.
pub mod digest;
/// Validated identifier newtypes.
pub mod identifiers;
/// Validation errors for canonical primitives.
pub mod validation;

pub use canonicalizer::{CanonicalizationError, Canonicalizer};
pub use content_id::{
    compute_content_id, payload_ref, verify_content_id, ContentDomain, ContentIdError,
};
pub use digest::{Digest, DigestAlg};
pub use identifiers::{ActorId, PrincipalId, Timestamp};
pub use validation::ValidationError;
