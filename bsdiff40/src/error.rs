//! Error types for BSDIFF40 patch application.

use thiserror::Error;

/// Result type alias for bsdiff40 operations.
pub type Result<T> = std::result::Result<T, BsdiffError>;

/// Errors that can occur while parsing extents or applying a BSDIFF40 patch.
#[derive(Error, Debug)]
pub enum BsdiffError {
    /// The patch container is malformed or internally inconsistent.
    #[error("corrupt patch: {0}")]
    CorruptPatch(String),

    /// An extent list or positional-I/O string failed to parse.
    #[error("invalid extents: {0}")]
    InvalidExtents(String),

    /// I/O error against a backing file, patch file, or bzip2 decoder.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An allocation-sized buffer (output, extent array, prefix table) could
    /// not be sized; surfaced distinctly from a parse failure so callers can
    /// tell a malformed string from a resource exhaustion.
    #[error("allocation failure: {0}")]
    AllocationFailure(String),
}

impl BsdiffError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        BsdiffError::CorruptPatch(msg.into())
    }

    pub(crate) fn invalid_extents(msg: impl Into<String>) -> Self {
        BsdiffError::InvalidExtents(msg.into())
    }
}
