use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::connector::Connector;
use crate::Result;
use super::{ConfigError, ConnectorSettings};

/// Connector constructor, called with the origin name and its raw settings
pub type ConnectorConstructor =
    Arc<dyn Fn(&str, &ConnectorSettings) -> Result<Arc<dyn Connector>> + Send + Sync>;

/// Registry of connector constructors keyed by backend type
///
/// Built once at startup, each connector registering itself, then handed
/// to the [`Catalog`](super::Catalog) which only reads it.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    constructors: HashMap<String, ConnectorConstructor>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for a backend type
    pub fn register<F>(mut self, type_name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&str, &ConnectorSettings) -> Result<Arc<dyn Connector>> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        if self.constructors.contains_key(&type_name) {
            warn!("replacing connector constructor for `{}` backend type", type_name);
        }
        self.constructors.insert(type_name, Arc::new(constructor));
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&ConnectorConstructor> {
        self.constructors.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    /// Registered backend types, sorted
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Construct the connector named by the settings' `type` entry
    pub fn construct(&self, origin: &str, settings: &ConnectorSettings) -> Result<Arc<dyn Connector>> {
        let type_name = settings
            .connector_type()
            .ok_or(ConfigError::MissingBackendType)?;

        let constructor = self
            .get(type_name)
            .ok_or_else(|| ConfigError::UnknownBackendType(type_name.to_string()))?;

        constructor(origin, settings)
    }
}

impl fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("types", &self.types())
            .finish()
    }
}
