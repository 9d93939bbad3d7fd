//! Protocol error types

use thiserror::Error;

/// Wire format errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer too small to hold a header
    #[error("Buffer too small: needed {needed}, got {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// The size field of a record disagrees with the bytes available
    #[error("Size mismatch: header declares {declared} bytes, got {actual}")]
    SizeMismatch { declared: usize, actual: usize },

    /// Record exceeds what a u32 size field can describe
    #[error("Record too large: {size} bytes")]
    RecordTooLarge { size: usize },

    /// A sub-range of a caller buffer falls outside the buffer
    #[error("Range {offset}..{offset}+{length} out of bounds for buffer of {available} bytes")]
    OutOfRange {
        offset: usize,
        length: usize,
        available: usize,
    },
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
