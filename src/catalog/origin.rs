use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::connector::{discovery_channel, Connector, Discovered};
use crate::query::{GroupQuery, PlotResult, PlotValue};
use crate::Result;

/// Catalog metric
///
/// Identifies a metric by its origin, source and logical name. Storage
/// resolution data stays inside the origin's connector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Metric {
    pub origin: String,
    pub source: String,
    pub name: String,
}

impl Metric {
    pub fn new(origin: impl Into<String>, source: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            source: source.into(),
            name: name.into(),
        }
    }
}

/// Monitored host or entity grouping metrics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Source {
    pub name: String,
    pub metrics: HashMap<String, Metric>,
}

impl Source {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metrics: HashMap::new(),
        }
    }
}

/// One configured backend instance and the tree it discovered
pub struct Origin {
    name: String,
    sources: RwLock<HashMap<String, Source>>,
    connector: Arc<dyn Connector>,
}

impl Origin {
    pub fn new(name: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        Self {
            name: name.into(),
            sources: RwLock::new(HashMap::new()),
            connector,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    pub fn get_metric(&self, source: &str, name: &str) -> Option<Metric> {
        self.sources
            .read()
            .get(source)
            .and_then(|source| source.metrics.get(name))
            .cloned()
    }

    pub fn metric_exists(&self, source: &str, name: &str) -> bool {
        self.sources
            .read()
            .get(source)
            .map_or(false, |source| source.metrics.contains_key(name))
    }

    pub fn source(&self, name: &str) -> Option<Source> {
        self.sources.read().get(name).cloned()
    }

    /// Source names, sorted
    pub fn source_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Metric names of a source, sorted
    pub fn metric_names(&self, source: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .sources
            .read()
            .get(source)
            .map(|source| source.metrics.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn metric_count(&self) -> usize {
        self.sources
            .read()
            .values()
            .map(|source| source.metrics.len())
            .sum()
    }

    /// Insert a discovered pair, creating its source on first sight
    ///
    /// Returns whether the metric was new.
    pub fn register(&self, discovered: Discovered) -> bool {
        let mut sources = self.sources.write();
        let source = sources
            .entry(discovered.source.clone())
            .or_insert_with(|| Source::new(discovered.source.clone()));

        if source.metrics.contains_key(&discovered.metric) {
            return false;
        }

        let metric = Metric::new(self.name.as_str(), discovered.source, discovered.metric.as_str());
        source.metrics.insert(discovered.metric, metric);
        true
    }

    /// Run the connector discovery, merging what it finds into the tree
    ///
    /// The channel is drained concurrently with the connector's walk and
    /// only once it is closed is the pass over. Metrics found before a
    /// discovery error stay registered. Returns the number of identifiers
    /// received.
    pub async fn update(&self) -> Result<usize> {
        let (tx, mut rx) = discovery_channel();

        let producer = self.connector.update(tx);
        let consumer = async {
            let mut received = 0;
            while let Some(discovered) = rx.recv().await {
                self.register(discovered);
                received += 1;
            }
            received
        };

        let (result, received) = tokio::join!(producer, consumer);
        debug!("origin `{}` received {} discovered metrics", self.name, received);

        result.map(|_| received)
    }

    pub async fn get_plots(
        &self,
        query: &GroupQuery,
        start: SystemTime,
        end: SystemTime,
        step: Duration,
        percentiles: &[f64],
    ) -> Result<HashMap<String, PlotResult>> {
        self.connector.get_plots(query, start, end, step, percentiles).await
    }

    pub async fn get_value(
        &self,
        query: &GroupQuery,
        ref_time: SystemTime,
        percentiles: &[f64],
    ) -> Result<HashMap<String, HashMap<String, PlotValue>>> {
        self.connector.get_value(query, ref_time, percentiles).await
    }
}

impl std::fmt::Debug for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Origin")
            .field("name", &self.name)
            .field("sources", &self.sources.read().len())
            .finish()
    }
}
