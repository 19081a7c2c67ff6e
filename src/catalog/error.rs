use thiserror::Error;

/// Catalog and connector configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Origin settings without a `type` entry
    #[error("missing backend type")]
    MissingBackendType,

    /// `type` entry naming no registered connector
    #[error("unknown `{0}` backend type")]
    UnknownBackendType(String),

    /// Mandatory connector setting absent
    #[error("missing `{0}` mandatory connector setting")]
    MissingSetting(String),

    /// Origin name already present in the catalog
    #[error("origin `{0}` already exists")]
    DuplicateOrigin(String),

    /// Discovery pattern is not a valid regular expression
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// Discovery pattern names a group other than `source` or `metric`
    #[error("invalid pattern keyword `{0}`")]
    InvalidPatternKeyword(String),

    /// Discovery pattern lacks the `source` or `metric` group
    #[error("missing pattern keyword `{0}`")]
    MissingPatternKeyword(String),

    /// Catalog configuration document could not be parsed
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}
