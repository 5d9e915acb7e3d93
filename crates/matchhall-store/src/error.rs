//! Error types for the stores.

use std::path::PathBuf;

/// Errors opening or writing a store's files.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A data file exists but isn't valid. The store refuses to start
    /// rather than overwrite it.
    #[error("{path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode store data: {0}")]
    Encode(#[source] serde_json::Error),
}
