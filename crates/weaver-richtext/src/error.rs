//! Error types.
//!
//! None of these are fatal to an editing session: registration errors skip the
//! offending binding or matcher, and document errors abort a single edit.

use thiserror::Error;

/// A keyboard binding descriptor that could not be normalized.
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("invalid binding descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("invalid {field} pattern `{pattern}`: {source}")]
    InvalidPattern {
        field: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A matcher selector that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid selector `{selector}`: {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

/// A change that cannot be applied to the document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("change expects a document of at least {expected} units, document has {actual}")]
    OutOfRange { expected: usize, actual: usize },
}
