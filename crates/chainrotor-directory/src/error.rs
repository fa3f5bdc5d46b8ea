//! Error type for the endpoint directory.

use std::path::PathBuf;

use thiserror::Error;

use chainrotor_core::error::RotatorError;

#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The catalog request could not be completed.
    #[error("catalog fetch failed: {0}")]
    Fetch(String),

    /// The catalog source answered with a non-success status.
    #[error("catalog source returned HTTP {status}")]
    Status { status: u16 },

    /// The catalog body was not the expected JSON array.
    #[error("catalog parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Reading or writing the local snapshot failed.
    #[error("snapshot I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The directory was shut down before its first load completed.
    #[error("endpoint directory has not been loaded")]
    NotLoaded,

    #[error("unknown chain id {0}")]
    UnknownChain(i64),

    #[error("chain {0} has no usable RPC endpoints")]
    NoEndpoints(i64),

    #[error(transparent)]
    Rotator(#[from] RotatorError),
}
