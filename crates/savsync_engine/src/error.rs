//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while synchronizing records.
///
/// A concurrent modification of a source file is deliberately not an error:
/// it is benign control flow reported as
/// [`RecordOutcome::Conflicted`](crate::RecordOutcome::Conflicted).
#[derive(Error, Debug)]
pub enum SyncError {
    /// No key could be derived from an account identifier.
    ///
    /// Permanent for the account root in question; it is never retried.
    #[error("cannot derive a key from account identifier {account:?}")]
    KeyDerivation {
        /// The rejected identifier.
        account: String,
    },

    /// The codec rejected a record's data.
    #[error("codec error: {0}")]
    Codec(#[from] savsync_codec::CodecError),

    /// Filesystem I/O failed while reading, writing, or renaming.
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncError::KeyDerivation {
            account: "bogus".into(),
        };
        assert!(err.to_string().contains("bogus"));

        let err = SyncError::from(savsync_codec::CodecError::EmptyInput);
        assert!(err.to_string().contains("codec"));
    }
}
