//! Error types for DNS log compression and decompression.

use thiserror::Error;

/// Result type alias for dnslz operations.
pub type Result<T> = std::result::Result<T, DnslzError>;

/// Errors raised while tokenizing, compressing or decompressing a log stream.
///
/// Every variant is fatal for the run that produced it: the pipelines assume
/// well-formed input from a trusted upstream logger and define no
/// skip-and-continue policy.
#[derive(Debug, Error)]
pub enum DnslzError {
    /// The byte source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A single line does not fit into the tokenizer buffer.
    #[error("line exceeds the {capacity}-byte line buffer")]
    BufferOverflow { capacity: usize },

    /// A line carries more columns than a row can hold.
    #[error("line {line}: more than {limit} columns")]
    TooManyColumns { line: u64, limit: usize },

    /// A raw log line violates the column layout or a field range.
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },

    /// Compressed input is inconsistent with the configured function mask,
    /// base or chunk capacity.
    #[error("compressed stream does not match configuration: {reason}")]
    ConfigMismatch { reason: String },

    /// The configuration itself is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A chunk needed more rrset elements than the pool was sized for.
    #[error("{kind} pool exhausted: requested {requested} slots, capacity {capacity}")]
    PoolExhausted {
        kind: &'static str,
        requested: usize,
        capacity: usize,
    },
}

impl DnslzError {
    /// Create a malformed record error for the given input line.
    pub fn malformed(line: u64, reason: impl Into<String>) -> Self {
        DnslzError::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }

    /// Create a configuration mismatch error.
    pub fn mismatch(reason: impl Into<String>) -> Self {
        DnslzError::ConfigMismatch {
            reason: reason.into(),
        }
    }

    /// Check whether the error came from the byte source.
    pub fn is_io(&self) -> bool {
        matches!(self, DnslzError::Io(_))
    }
}
