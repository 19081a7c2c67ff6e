/*!
# Catalog Module

In-memory inventory of monitored entities, organised as a three-level
tree: origins (configured storage backends), their sources (hosts or
entities) and the metrics of each source.

## Components

1. **Catalog** (`Catalog`)
   - Owns every origin
   - Refreshes all origins and tracks the last clean refresh
   - Answers existence and lookup queries

2. **Origin** (`Origin`)
   - One configured backend instance
   - Owns its connector and the source/metric tree it discovered

3. **Connector Registry** (`ConnectorRegistry`)
   - Maps a backend type tag to a connector constructor
   - Built once at startup and handed to the catalog

## Refresh Semantics

`Catalog::update` refreshes every origin and waits for all of them.
A failing origin does not stop the others; the call then returns the
last error and leaves the refresh timestamp untouched. Metrics found
before a failure stay in the catalog.

## Concurrency

Origin and source maps sit behind read/write locks that are never held
across an await point, so lookups stay consistent while a refresh is in
progress.
*/

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use futures::future::join_all;
use metrics::{counter, gauge};
use parking_lot::RwLock;
use tracing::{error, info};

use crate::Result;

pub mod config;
pub mod error;
pub mod origin;
pub mod registry;

pub use config::{CatalogConfig, ConnectorSettings};
pub use error::ConfigError;
pub use origin::{Metric, Origin, Source};
pub use registry::{ConnectorConstructor, ConnectorRegistry};

/// Registry of origins, sources and metrics
pub struct Catalog {
    registry: Arc<ConnectorRegistry>,
    origins: RwLock<HashMap<String, Arc<Origin>>>,
    updated: RwLock<Option<SystemTime>>,
}

impl Catalog {
    pub fn new(registry: ConnectorRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            origins: RwLock::new(HashMap::new()),
            updated: RwLock::new(None),
        }
    }

    /// Create a catalog and add every configured origin
    pub fn from_config(registry: ConnectorRegistry, config: &CatalogConfig) -> Result<Self> {
        let catalog = Self::new(registry);
        for (name, settings) in &config.origins {
            catalog.add_origin(name, settings)?;
        }
        Ok(catalog)
    }

    pub fn registry(&self) -> &ConnectorRegistry {
        &self.registry
    }

    /// Add an origin backed by the connector its `type` setting names
    ///
    /// Origin names are unique: adding an existing name fails and leaves
    /// the present origin untouched.
    pub fn add_origin(&self, name: &str, settings: &ConnectorSettings) -> Result<Arc<Origin>> {
        if self.origins.read().contains_key(name) {
            return Err(ConfigError::DuplicateOrigin(name.to_string()).into());
        }

        let connector = self.registry.construct(name, settings)?;
        let origin = Arc::new(Origin::new(name, connector));

        let mut origins = self.origins.write();
        if origins.contains_key(name) {
            return Err(ConfigError::DuplicateOrigin(name.to_string()).into());
        }
        origins.insert(name.to_string(), Arc::clone(&origin));

        info!("added origin `{}`", name);
        Ok(origin)
    }

    pub fn origin(&self, name: &str) -> Option<Arc<Origin>> {
        self.origins.read().get(name).cloned()
    }

    /// Origin names, sorted
    pub fn origin_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.origins.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn get_metric(&self, origin: &str, source: &str, name: &str) -> Option<Metric> {
        self.origin(origin)?.get_metric(source, name)
    }

    pub fn metric_exists(&self, origin: &str, source: &str, name: &str) -> bool {
        self.origin(origin)
            .map_or(false, |origin| origin.metric_exists(source, name))
    }

    /// Time of the last refresh in which every origin succeeded
    pub fn updated(&self) -> Option<SystemTime> {
        *self.updated.read()
    }

    /// Refresh every origin
    pub async fn update(&self) -> Result<()> {
        info!("catalog update started");
        counter!("catalog.update.total", 1);

        let mut origins: Vec<Arc<Origin>> = self.origins.read().values().cloned().collect();
        origins.sort_by(|a, b| a.name().cmp(b.name()));

        let results = join_all(origins.iter().map(|origin| origin.update())).await;

        let mut last_error = None;
        for (origin, result) in origins.iter().zip(results) {
            match result {
                Ok(_) => {
                    gauge!(
                        "catalog.origin.metrics",
                        origin.metric_count() as f64,
                        "origin" => origin.name().to_string()
                    );
                }
                Err(e) => {
                    error!("origin `{}` update failed: {}", origin.name(), e);
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error {
            counter!("catalog.update.failures", 1);
            info!("catalog update failed");
            return Err(e);
        }

        *self.updated.write() = Some(SystemTime::now());

        info!("catalog update completed");
        Ok(())
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("origins", &self.origin_names())
            .field("updated", &self.updated())
            .finish()
    }
}
