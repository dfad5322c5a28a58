//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding a save record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The input buffer was empty.
    ///
    /// Zero-length source files must be skipped by the caller; the codec
    /// never produces empty output for them.
    #[error("input is empty")]
    EmptyInput,

    /// The input is too large for the 4-byte length trailer.
    #[error("input length {len} exceeds the length trailer range")]
    InputTooLarge {
        /// Length of the rejected input.
        len: usize,
    },

    /// The encrypted blob is not a whole number of cipher blocks.
    #[error("blob length {len} is not a multiple of the cipher block size")]
    Misaligned {
        /// Length of the rejected blob.
        len: usize,
    },

    /// The padding byte was outside the valid `[1, 16]` range or larger
    /// than the decrypted buffer.
    #[error("invalid padding byte {value}")]
    InvalidPadding {
        /// The rejected pad value.
        value: u8,
    },

    /// The decrypted buffer is too short to hold the length trailer.
    #[error("blob truncated: {len} bytes remain after padding removal")]
    Truncated {
        /// Bytes remaining after the padding was stripped.
        len: usize,
    },

    /// Compression failed.
    #[error("compression failed: {message}")]
    CompressionFailed {
        /// Description of the compression error.
        message: String,
    },

    /// Decompression rejected the data.
    #[error("decompression failed: {message}")]
    DecompressionFailed {
        /// Description of the decompression error.
        message: String,
    },

    /// The inflated data did not match the declared uncompressed length.
    #[error("declared uncompressed length {declared} but inflated {actual} bytes")]
    LengthMismatch {
        /// Length recorded in the blob trailer.
        declared: u32,
        /// Length actually produced by inflation.
        actual: usize,
    },
}

impl CodecError {
    /// Creates a compression failure.
    pub fn compression_failed(message: impl Into<String>) -> Self {
        Self::CompressionFailed {
            message: message.into(),
        }
    }

    /// Creates a decompression failure.
    pub fn decompression_failed(message: impl Into<String>) -> Self {
        Self::DecompressionFailed {
            message: message.into(),
        }
    }
}
