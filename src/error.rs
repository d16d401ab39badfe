//! Error types for the Framea library.
//!
//! All errors are represented by the [`FrameaError`] enum. Constructor
//! methods exist for the error kinds the segment subsystem produces, so
//! call sites stay short.

use std::io;

use thiserror::Error;

/// The main error type for Framea operations.
#[derive(Error, Debug)]
pub enum FrameaError {
    /// I/O errors (field loads, object storage access).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A field load was requested for a segment whose collection is not
    /// loaded on this node.
    #[error("collection {0} is not loaded")]
    CollectionNotLoaded(i64),

    /// A query named a segment that is not registered on this node.
    #[error("segment {0} is not loaded")]
    SegmentNotLoaded(i64),

    /// A read pin was refused because the segment is being released.
    #[error("segment {0} is being released, cannot pin")]
    PinAcquisitionFailed(i64),

    /// Field loading failed; no cache entry was created.
    #[error("segment field load failed: {0}")]
    Loader(String),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Generic error for other cases
    #[error("error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with [`FrameaError`].
pub type Result<T> = std::result::Result<T, FrameaError>;

impl FrameaError {
    /// Create a new collection-not-loaded error.
    pub fn collection_not_loaded(collection_id: i64) -> Self {
        FrameaError::CollectionNotLoaded(collection_id)
    }

    /// Create a new segment-not-loaded error.
    pub fn segment_not_loaded(segment_id: i64) -> Self {
        FrameaError::SegmentNotLoaded(segment_id)
    }

    /// Create a new pin-refused error.
    pub fn pin_refused(segment_id: i64) -> Self {
        FrameaError::PinAcquisitionFailed(segment_id)
    }

    /// Create a new loader failure.
    pub fn loader<S: Into<String>>(msg: S) -> Self {
        FrameaError::Loader(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        FrameaError::InvalidArgument(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        FrameaError::Other(msg.into())
    }
}
