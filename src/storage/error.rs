//! Errors surfaced by the mmap bar store and writer.

use std::fmt;
use std::path::PathBuf;

/// Failure reading or writing a bar file.
#[derive(Debug)]
#[non_exhaustive]
pub enum BarStoreError {
    /// An I/O operation on `path` failed.
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// `path` does not have the expected bar-file layout.
    Format {
        /// The file involved.
        path: PathBuf,
        /// Why the file was rejected.
        reason: String,
    },
    /// A record's CRC32 did not match its payload.
    CorruptEntry {
        /// The file involved.
        path: PathBuf,
        /// Index of the corrupt record within the file.
        index: usize,
    },
}

impl fmt::Display for BarStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarStoreError::Io { path, source } => {
                write!(f, "io error on {}: {source}", path.display())
            }
            BarStoreError::Format { path, reason } => {
                write!(f, "malformed bar file {}: {reason}", path.display())
            }
            BarStoreError::CorruptEntry { path, index } => {
                write!(f, "record {index} in {} failed its CRC check", path.display())
            }
        }
    }
}

impl std::error::Error for BarStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BarStoreError::Io { source, .. } => Some(source),
            BarStoreError::Format { .. } | BarStoreError::CorruptEntry { .. } => None,
        }
    }
}
