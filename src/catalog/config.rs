use serde::{Serialize, Deserialize};
use std::collections::{BTreeMap, HashMap};

use super::ConfigError;

/// Setting holding the connector type tag
pub const TYPE_SETTING: &str = "type";

/// Raw string settings of one origin
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectorSettings(HashMap<String, String>);

impl ConnectorSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Mandatory setting
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::MissingSetting(key.to_string()))
    }

    /// Connector type tag
    pub fn connector_type(&self) -> Option<&str> {
        self.get(TYPE_SETTING)
    }
}

impl From<HashMap<String, String>> for ConnectorSettings {
    fn from(settings: HashMap<String, String>) -> Self {
        Self(settings)
    }
}

/// Catalog configuration: one settings bag per origin name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub origins: BTreeMap<String, ConnectorSettings>,
}

impl CatalogConfig {
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(document).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
