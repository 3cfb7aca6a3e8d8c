//! Error types for form flattening.
//!
//! This module defines all error types that can occur while flattening a
//! document's form layer.

use lopdf::ObjectId;

/// Result type alias for flattening operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during form flattening.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required field key is absent or unreadable.
    ///
    /// Recovered per annotation: the affected widget is left unflattened and
    /// the pass continues.
    #[error("Malformed field: missing or unreadable /{key} on object {} {} R", .id.0, .id.1)]
    MalformedField {
        /// The dictionary key that was absent or had the wrong type
        key: &'static str,
        /// The annotation or field object the key was looked up on
        id: ObjectId,
    },

    /// Document object graph error from the underlying PDF library
    #[error("Document error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error is recovered per-annotation rather than aborting
    /// the whole run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::MalformedField { .. })
    }
}
