//! Error types for the light synchronization engine

use std::path::PathBuf;

/// Result alias for engine operations
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Structural errors that abort a run
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A band maps to no FFT bins for the given block size and sample rate
    #[error(
        "band {band} is degenerate: bins [{low_bin}, {high_bin}) are empty at {sample_rate} Hz"
    )]
    DegenerateBand {
        band: usize,
        low_bin: usize,
        high_bin: usize,
        sample_rate: u32,
    },

    /// Configuration failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A block does not match the shape the analyzer was built for
    #[error(
        "block mismatch: expected {expected} samples at {expected_rate} Hz, \
         got {found} samples at {found_rate} Hz"
    )]
    BlockMismatch {
        expected: usize,
        expected_rate: u32,
        found: usize,
        found_rate: u32,
    },

    /// Cache failure surfaced to the caller
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Cache failures. None of these are fatal to a run.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The artifact exists but cannot be decoded into a record
    #[error("corrupt sync cache {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Persisting a record failed; nothing was published
    #[error("failed to store sync cache {path:?}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading the artifact failed for a reason other than absence
    #[error("I/O error on sync cache {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
