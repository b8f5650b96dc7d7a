//! Content-addressed identifiers with domain-separated hashing.
//!
//! Every id is `sha256(domain_separator || canonical_bytes(value))`. The
//! separator keeps an intent id from ever colliding with a journal record id
//! computed over the same bytes.

use serde::Serialize;
use serde_json::Value;

use crate::{CanonicalizationError, Canonicalizer, Digest};

/// Hashing domains used by Strand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentDomain {
    /// Intent ids, computed over `(actor, token, payload)`.
    Intent,
    /// Payload references, computed over raw payload bytes.
    Payload,
    /// Journal record ids, computed over `(seq, notification)`.
    Notification,
}

impl ContentDomain {
    /// NUL-terminated separator prepended to the hash input.
    pub fn separator(self) -> &'static [u8] {
        match self {
            ContentDomain::Intent => b"strand:intent:v1\0",
            ContentDomain::Payload => b"strand:payload:v1\0",
            ContentDomain::Notification => b"strand:notification:v1\0",
        }
    }
}

/// Error during content id computation.
#[derive(thiserror::Error, Debug)]
pub enum ContentIdError {
    /// Serialization to JSON failed.
    #[error("serialization failed: {0}")]
    Serialization(String),
    /// Canonicalization failed.
    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

/// Computes the content id of `value` in `domain`.
///
/// JSON numbers are stringified before canonicalization so that integer
/// width never changes an id.
///
/// # Example
///
/// ```rust
/// use strand_canonical::{compute_content_id, Canonicalizer, ContentDomain};
/// use serde_json::json;
///
/// let id = compute_content_id(
///     ContentDomain::Intent,
///     &json!({"actor": "acct:alice", "token": "7", "payload": "aGk"}),
///     &Canonicalizer::default(),
/// )?;
/// assert_eq!(id.b64.len(), 43);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn compute_content_id<T: Serialize>(
    domain: ContentDomain,
    value: &T,
    canonicalizer: &Canonicalizer,
) -> Result<Digest, ContentIdError> {
    let mut value: Value =
        serde_json::to_value(value).map_err(|e| ContentIdError::Serialization(e.to_string()))?;
    stringify_numbers(&mut value);
    let bytes = canonicalizer.canonicalize(&value)?;
    Ok(Digest::sha256_with_domain(domain.separator(), &bytes))
}

/// Content reference for an opaque payload.
pub fn payload_ref(payload: &[u8]) -> Digest {
    Digest::sha256_with_domain(ContentDomain::Payload.separator(), payload)
}

/// Returns `true` when `claimed` equals the recomputed id of `value`.
pub fn verify_content_id<T: Serialize>(
    domain: ContentDomain,
    value: &T,
    claimed: &Digest,
    canonicalizer: &Canonicalizer,
) -> Result<bool, ContentIdError> {
    Ok(compute_content_id(domain, value, canonicalizer)? == *claimed)
}

fn stringify_numbers(value: &mut Value) {
    match value {
        Value::Number(n) => {
            *value = Value::String(n.to_string());
        }
        Value::Array(items) => items.iter_mut().for_each(stringify_numbers),
        Value::Object(map) => map.values_mut().for_each(stringify_numbers),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_and_strings_hash_alike() {
        let c = Canonicalizer::default();
        let a = compute_content_id(ContentDomain::Notification, &json!({"seq": 3}), &c).unwrap();
        let b = compute_content_id(ContentDomain::Notification, &json!({"seq": "3"}), &c).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn domains_are_separated() {
        let c = Canonicalizer::default();
        let v = json!({"k": "v"});
        let a = compute_content_id(ContentDomain::Intent, &v, &c).unwrap();
        let b = compute_content_id(ContentDomain::Notification, &v, &c).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn payload_ref_depends_on_bytes_only() {
        assert_eq!(payload_ref(b"abc"), payload_ref(b"abc"));
        assert_ne!(payload_ref(b"abc"), payload_ref(b"abd"));
    }
}
