use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use dashmap::DashMap;
use metrics::counter;
use regex::Regex;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::catalog::{ConfigError, ConnectorRegistry, ConnectorSettings, Metric};
use crate::query::{self, GroupQuery, PlotResult, PlotValue, QueryError, QueryPlan};
use crate::storage::{DataSource, StorageEngine};
use crate::Result;
use super::{Connector, Discovered, DiscoveryError, DiscoverySender};

/// Type tag the connector registers under
pub const RRD_CONNECTOR_TYPE: &str = "rrd";

const SOURCE_KEYWORD: &str = "source";
const METRIC_KEYWORD: &str = "metric";

/// File-tree connector
///
/// Walks a directory of storage files and recovers the source and the
/// metric of each file from its path relative to the root, using a
/// pattern with `source` and `metric` named groups. Every dataset of a
/// matching file becomes a `metric/dataset` metric. Queries only resolve
/// metrics of the origin the connector was built for.
pub struct RrdConnector {
    origin: String,
    path: PathBuf,
    pattern: String,
    engine: Arc<dyn StorageEngine>,
    metrics: DashMap<(String, String), DataSource>,
}

impl RrdConnector {
    pub fn new(
        origin: impl Into<String>,
        path: impl Into<PathBuf>,
        pattern: impl Into<String>,
        engine: Arc<dyn StorageEngine>,
    ) -> Self {
        Self {
            origin: origin.into(),
            path: path.into(),
            pattern: pattern.into(),
            engine,
            metrics: DashMap::new(),
        }
    }

    /// Build from raw settings; `path` and `pattern` are mandatory
    pub fn from_settings(
        origin: &str,
        settings: &ConnectorSettings,
        engine: Arc<dyn StorageEngine>,
    ) -> std::result::Result<Self, ConfigError> {
        let path = settings.require("path")?;
        let pattern = settings.require("pattern")?;

        Ok(Self::new(origin, path, pattern, engine))
    }

    /// Register the connector constructor under [`RRD_CONNECTOR_TYPE`]
    pub fn register(registry: ConnectorRegistry, engine: Arc<dyn StorageEngine>) -> ConnectorRegistry {
        registry.register(RRD_CONNECTOR_TYPE, move |origin, settings| {
            let connector = RrdConnector::from_settings(origin, settings, Arc::clone(&engine))?;
            debug!("created {} connector for origin `{}`", RRD_CONNECTOR_TYPE, origin);
            Ok(Arc::new(connector) as Arc<dyn Connector>)
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Number of metrics known to the connector
    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    /// Storage handle of a discovered metric
    pub fn data_source(&self, source: &str, metric: &str) -> Option<DataSource> {
        self.metrics
            .get(&(source.to_string(), metric.to_string()))
            .map(|entry| entry.value().clone())
    }

    fn resolve(&self, metric: &Metric) -> Result<DataSource> {
        let data_source = if metric.origin == self.origin {
            self.data_source(&metric.source, &metric.name)
        } else {
            None
        };

        data_source.ok_or_else(|| {
            QueryError::UnknownMetric {
                source_name: metric.source.clone(),
                metric: metric.name.clone(),
            }
            .into()
        })
    }

    async fn get_data(
        &self,
        query: &GroupQuery,
        start: SystemTime,
        end: SystemTime,
        step: Duration,
        percentiles: &[f64],
        info_only: bool,
    ) -> Result<HashMap<String, PlotResult>> {
        let plan = QueryPlan::build(query, percentiles, info_only, |metric| self.resolve(metric))?;
        counter!("connector.query.total", 1, "connector" => RRD_CONNECTOR_TYPE);

        plan.execute(self.engine.as_ref(), start, end, step).await
    }

    async fn walk(&self, pattern: &Regex, discovered: &DiscoverySender) -> Result<usize> {
        let mut count = 0;
        let mut pending = vec![self.path.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| DiscoveryError::walk(&dir, e))?;

            let mut children = Vec::new();
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| DiscoveryError::walk(&dir, e))?
            {
                children.push(entry);
            }
            children.sort_by_key(|entry| entry.file_name());

            let mut subdirs = Vec::new();
            for entry in children {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| DiscoveryError::walk(&path, e))?;

                // symlinks are not followed, special files are skipped
                if file_type.is_dir() {
                    subdirs.push(path);
                } else if file_type.is_file() {
                    count += self.process_file(pattern, &path, discovered).await?;
                }
            }

            // depth-first, in name order
            pending.extend(subdirs.into_iter().rev());
        }

        Ok(count)
    }

    async fn process_file(&self, pattern: &Regex, path: &Path, discovered: &DiscoverySender) -> Result<usize> {
        let relative = path
            .strip_prefix(&self.path)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();

        let (source, metric) = match pattern.captures(&relative) {
            Some(captures) => match (captures.name(SOURCE_KEYWORD), captures.name(METRIC_KEYWORD)) {
                (Some(source), Some(metric)) => (source.as_str().to_string(), metric.as_str().to_string()),
                _ => {
                    warn!("file `{}` does not match pattern", path.display());
                    return Ok(0);
                }
            },
            None => {
                warn!("file `{}` does not match pattern", path.display());
                return Ok(0);
            }
        };

        let datasets = self
            .engine
            .datasets(path)
            .await
            .map_err(|e| DiscoveryError::Metadata {
                path: path.to_path_buf(),
                source: e,
            })?;

        for dataset in &datasets {
            let name = format!("{}/{}", metric, dataset);

            self.metrics.insert(
                (source.clone(), name.clone()),
                DataSource::new(path, dataset.as_str()),
            );
            discovered
                .send(Discovered::new(source.as_str(), name.as_str()))
                .await
                .map_err(|_| DiscoveryError::ChannelClosed)?;

            debug!("discovered metric `{}` for source `{}`", name, source);
        }

        Ok(datasets.len())
    }
}

/// Compile a discovery pattern
///
/// The pattern must name exactly the `source` and `metric` groups.
pub fn compile_pattern(pattern: &str) -> std::result::Result<Regex, ConfigError> {
    let re = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;

    let mut has_source = false;
    let mut has_metric = false;

    for name in re.capture_names().flatten() {
        match name {
            SOURCE_KEYWORD => has_source = true,
            METRIC_KEYWORD => has_metric = true,
            other => return Err(ConfigError::InvalidPatternKeyword(other.to_string())),
        }
    }

    if !has_source {
        return Err(ConfigError::MissingPatternKeyword(SOURCE_KEYWORD.to_string()));
    }
    if !has_metric {
        return Err(ConfigError::MissingPatternKeyword(METRIC_KEYWORD.to_string()));
    }

    Ok(re)
}

#[async_trait]
impl Connector for RrdConnector {
    async fn update(&self, discovered: DiscoverySender) -> Result<()> {
        let pattern = compile_pattern(&self.pattern)?;

        info!("discovering metrics under `{}`", self.path.display());
        let count = self.walk(&pattern, &discovered).await?;
        info!("discovered {} metrics under `{}`", count, self.path.display());

        // dropping `discovered` closes the channel
        Ok(())
    }

    async fn get_plots(
        &self,
        query: &GroupQuery,
        start: SystemTime,
        end: SystemTime,
        step: Duration,
        percentiles: &[f64],
    ) -> Result<HashMap<String, PlotResult>> {
        self.get_data(query, start, end, step, percentiles, false).await
    }

    async fn get_value(
        &self,
        query: &GroupQuery,
        ref_time: SystemTime,
        percentiles: &[f64],
    ) -> Result<HashMap<String, HashMap<String, PlotValue>>> {
        let (start, end, step) = query::value_window(ref_time);
        let data = self.get_data(query, start, end, step, percentiles, true).await?;

        Ok(query::into_values(data))
    }
}
