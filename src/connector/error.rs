use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::storage::StorageError;

/// Discovery errors, each aborts the walk of the failing origin
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Directory could not be walked
    #[error("failed to walk `{path}`: {source}")]
    Walk {
        path: PathBuf,
        source: io::Error,
    },

    /// Storage metadata of a matching file could not be read
    #[error("failed to read metadata of `{path}`: {source}")]
    Metadata {
        path: PathBuf,
        source: StorageError,
    },

    /// Receiving side dropped while discovery was still running
    #[error("discovery channel closed")]
    ChannelClosed,
}

impl DiscoveryError {
    pub(crate) fn walk(path: impl Into<PathBuf>, source: io::Error) -> Self {
        DiscoveryError::Walk {
            path: path.into(),
            source,
        }
    }
}
