use std::io;
use thiserror::Error;

/// Error taxonomy for every pack/unpack/validate operation.
///
/// Variants other than [`PackError::Io`] carry the offending path, offset,
/// or field so callers can act on the failure without re-parsing messages.
#[derive(Debug, Error)]
pub enum PackError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("corrupt data: {0}")]
    CorruptData(String),

    #[error("checksum mismatch for {subject}: stored {expected:08x}, computed {actual:08x}")]
    ChecksumMismatch {
        subject: String,
        expected: u32,
        actual: u32,
    },

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("unsupported compression: {0}")]
    UnsupportedCompression(String),

    #[error("path violation: {0}")]
    PathViolation(String),

    #[error("entry not found: {0}")]
    EntryNotFound(String),
}

pub type PackResult<T> = Result<T, PackError>;
