/*!
# Connector Module

Connectors bridge the catalog and the query engine to one storage
technology. Each backend type implements [`Connector`] and registers a
constructor under its type tag in a
[`ConnectorRegistry`](crate::catalog::ConnectorRegistry).

## Discovery Handshake

`Connector::update` receives the sending half of a discovery channel and
pushes one [`Discovered`] identifier per `(source, metric)` pair it finds.
The sender is consumed by the call, so the channel closes exactly once,
when discovery returns, whether it succeeded or aborted. The origin
drains the receiving half concurrently and only treats discovery as
finished once the channel is closed.
*/

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;

use crate::query::{GroupQuery, PlotResult, PlotValue};
use crate::Result;

pub mod error;
pub mod rrd;

pub use error::DiscoveryError;
pub use rrd::RrdConnector;

/// Buffered identifiers before the producer waits on the consumer
pub const DISCOVERY_CHANNEL_CAPACITY: usize = 1024;

/// Source/metric pair found by a discovery pass
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Discovered {
    pub source: String,
    pub metric: String,
}

impl Discovered {
    pub fn new(source: impl Into<String>, metric: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            metric: metric.into(),
        }
    }
}

pub type DiscoverySender = mpsc::Sender<Discovered>;
pub type DiscoveryReceiver = mpsc::Receiver<Discovered>;

/// Create a discovery channel
pub fn discovery_channel() -> (DiscoverySender, DiscoveryReceiver) {
    mpsc::channel(DISCOVERY_CHANNEL_CAPACITY)
}

/// Storage backend connector
#[async_trait]
pub trait Connector: Send + Sync {
    /// Discover source/metric pairs, sending each one on `discovered`
    async fn update(&self, discovered: DiscoverySender) -> Result<()>;

    /// Samples and statistics of every output series over `(start, end]`
    async fn get_plots(
        &self,
        query: &GroupQuery,
        start: SystemTime,
        end: SystemTime,
        step: Duration,
        percentiles: &[f64],
    ) -> Result<HashMap<String, PlotResult>>;

    /// Statistics of every output series over the minute ending at `ref_time`
    async fn get_value(
        &self,
        query: &GroupQuery,
        ref_time: SystemTime,
        percentiles: &[f64],
    ) -> Result<HashMap<String, HashMap<String, PlotValue>>>;
}
