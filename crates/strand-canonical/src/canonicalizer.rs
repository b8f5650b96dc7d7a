use std::fmt;

use canonical_json::to_string;
use serde_json::Value;

/// Default nesting limit applied by [`Canonicalizer::default`].
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Error returned when canonicalization fails.
#[derive(thiserror::Error, Debug)]
pub enum CanonicalizationError {
    /// Non-finite number (NaN/Infinity) detected.
    #[error("non-finite number detected at {0}")]
    NonFiniteNumber(String),
    /// Nesting exceeded the configured limit.
    #[error("nesting deeper than {max} at {path}")]
    TooDeep {
        /// Path where the limit was hit.
        path: String,
        /// Configured limit.
        max: usize,
    },
    /// The encoder rejected the value.
    #[error("encoding failed: {0}")]
    Encoding(String),
}

/// JSON path used in error messages.
#[derive(Debug, Clone, Default)]
struct Path {
    segments: Vec<String>,
}

impl Path {
    fn child(&self, segment: String) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, "root")
        } else {
            write!(f, "{}", self.segments.join("."))
        }
    }
}

/// Emits RFC 8785 canonical bytes for JSON values.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    max_depth: usize,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl Canonicalizer {
    /// Creates a canonicalizer that rejects values nested deeper than `max_depth`.
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Produces canonical UTF-8 bytes for `value`.
    pub fn canonicalize(&self, value: &Value) -> Result<Vec<u8>, CanonicalizationError> {
        self.validate(value, &Path::default())?;
        let canonical =
            to_string(value).map_err(|err| CanonicalizationError::Encoding(err.to_string()))?;
        Ok(canonical.into_bytes())
    }

    fn validate(&self, value: &Value, path: &Path) -> Result<(), CanonicalizationError> {
        if path.depth() > self.max_depth {
            return Err(CanonicalizationError::TooDeep {
                path: path.to_string(),
                max: self.max_depth,
            });
        }
        match value {
            Value::Object(map) => map
                .iter()
                .try_for_each(|(key, child)| self.validate(child, &path.child(key.clone()))),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .try_for_each(|(idx, item)| self.validate(item, &path.child(format!("[{idx}]")))),
            Value::Number(num) => match num.as_f64() {
                Some(f) if !f.is_finite() => {
                    Err(CanonicalizationError::NonFiniteNumber(path.to_string()))
                }
                _ => Ok(()),
            },
            Value::String(_) | Value::Bool(_) | Value::Null => Ok(()),
        }
    }
}
