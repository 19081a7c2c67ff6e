//! Metrics catalog and time-series group query engine.
//!
//! The [`Catalog`] keeps an origin → source → metric inventory populated by
//! pluggable [`Connector`]s. Group queries combine catalog metrics and are
//! evaluated by the connectors against a [`StorageEngine`].

pub mod catalog;
pub mod connector;
pub mod query;
pub mod storage;

// Re-exports
pub use catalog::{Catalog, CatalogConfig, ConnectorRegistry, ConnectorSettings, Metric, Origin, Source};
pub use connector::{Connector, Discovered, RrdConnector};
pub use query::{GroupQuery, GroupType, PlotResult, PlotValue, Serie};
pub use storage::{MemoryEngine, StorageEngine};

// Core types
pub type Result<T> = std::result::Result<T, Error>;
pub use error::Error;

pub mod error;
