//! Error types for package format operations

use std::io;
use thiserror::Error;

/// Errors raised while reading or writing package containers.
#[derive(Error, Debug)]
pub enum FormatError {
    /// I/O error from the underlying source or target.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Magic string did not match.
    #[error("bad magic: expected {expected:?}, found {found:?}")]
    BadMagic {
        /// Magic the parser was looking for.
        expected: &'static str,
        /// What the stream actually contained.
        found: String,
    },

    /// Container was written by a newer format revision.
    #[error("unsupported format version {found} (max supported {max})")]
    UnsupportedVersion {
        /// Version stamped in the file.
        found: u32,
        /// Newest version this build understands.
        max: u32,
    },

    /// A length-prefixed string failed validation.
    #[error("invalid string: {0}")]
    InvalidString(String),

    /// Structural problem in the container layout.
    #[error("invalid package format: {0}")]
    InvalidFormat(String),

    /// Record offset does not fit the on-disk offset field.
    #[error("offset {0} exceeds the 4 GiB container limit")]
    OffsetOverflow(u64),
}

/// Result type for format operations.
pub type Result<T> = std::result::Result<T, FormatError>;
