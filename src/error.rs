/*!
# Error Module

Crate-level error type. Each area keeps its own error enum and converts
into [`Error`]:

- [`ConfigError`] - backend type, connector settings and discovery pattern problems
- [`QueryError`] - malformed group queries
- [`DiscoveryError`] - walk and metadata failures aborting a discovery pass
- [`StorageError`] - storage engine failures, passed through unchanged
*/

use thiserror::Error;

use crate::catalog::ConfigError;
use crate::connector::DiscoveryError;
use crate::query::QueryError;
use crate::storage::StorageError;

/// Core catalog error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Query error
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Discovery error
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Storage engine error
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl Error {
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    pub fn is_query(&self) -> bool {
        matches!(self, Error::Query(_))
    }

    pub fn is_discovery(&self) -> bool {
        matches!(self, Error::Discovery(_))
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Config(_) => false,
            Error::Query(_) => false,
            Error::Discovery(DiscoveryError::Walk { .. }) => true,
            Error::Discovery(DiscoveryError::Metadata { source, .. }) => source.is_retryable(),
            Error::Discovery(DiscoveryError::ChannelClosed) => false,
            Error::Storage(e) => e.is_retryable(),
        }
    }
}
