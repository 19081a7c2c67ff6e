/*!
# Query Module

Group queries and their evaluation against a storage engine.

A [`GroupQuery`] names one or more series, each pointing at a catalog
metric, and combines them with an aggregation operator:

- `None` - one output per serie, keyed by the serie name
- `Sum` - a single output, keyed by the group name, adding every serie
- `Avg` - like `Sum`, divided by the number of contributing series

Each serie carries its own scale factor and the group carries another
one applied last. A zero factor leaves the samples unchanged. A group
holding a single serie is always evaluated as `None`.

Evaluation goes through a [`QueryPlan`]: the plan is built from the
query, then run against a [`StorageEngine`](crate::storage::StorageEngine)
to export the samples and compute the statistics of every output series
(min, avg, max, last and the requested percentiles).
*/

use serde::{Serialize, Deserialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use crate::catalog::Metric;

pub mod error;
pub mod plan;
pub mod stats;

pub use error::QueryError;
pub use plan::QueryPlan;
pub use stats::percentile_label;

/// Numeric sample; unknown samples are `NaN`
pub type PlotValue = f64;

/// Width and step of the window `get_value` evaluates
pub const VALUE_WINDOW: Duration = Duration::from_secs(60);

/// Aggregation operator of a group query
///
/// Serialized as its lowercase name and parsed through [`FromStr`], so an
/// unknown name fails with [`QueryError::UnknownOperator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GroupType {
    #[default]
    None,
    Avg,
    Sum,
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupType::None => f.write_str("none"),
            GroupType::Avg => f.write_str("avg"),
            GroupType::Sum => f.write_str("sum"),
        }
    }
}

impl FromStr for GroupType {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(GroupType::None),
            "avg" | "average" => Ok(GroupType::Avg),
            "sum" => Ok(GroupType::Sum),
            _ => Err(QueryError::UnknownOperator(s.to_string())),
        }
    }
}

impl TryFrom<String> for GroupType {
    type Error = QueryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GroupType> for String {
    fn from(group_type: GroupType) -> Self {
        group_type.to_string()
    }
}

impl TryFrom<u8> for GroupType {
    type Error = QueryError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GroupType::None),
            1 => Ok(GroupType::Avg),
            2 => Ok(GroupType::Sum),
            other => Err(QueryError::UnknownOperator(other.to_string())),
        }
    }
}

/// One input series of a group query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Serie {
    pub name: String,
    /// Resolved catalog metric, series without one are skipped
    pub metric: Option<Metric>,
    /// Per-series multiplier, zero means unscaled
    #[serde(default)]
    pub scale: f64,
}

impl Serie {
    pub fn new(name: impl Into<String>, metric: Option<Metric>) -> Self {
        Self {
            name: name.into(),
            metric,
            scale: 0.0,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }
}

/// Logical query combining series under an aggregation operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupQuery {
    pub name: String,
    pub series: Vec<Serie>,
    #[serde(rename = "type", default)]
    pub group_type: GroupType,
    /// Group-level multiplier, zero means unscaled
    #[serde(default)]
    pub scale: f64,
}

impl GroupQuery {
    pub fn new(name: impl Into<String>, group_type: GroupType, series: Vec<Serie>) -> Self {
        Self {
            name: name.into(),
            series,
            group_type,
            scale: 0.0,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Operator actually applied: a single serie has nothing to combine
    pub fn effective_type(&self) -> GroupType {
        if self.series.len() == 1 {
            GroupType::None
        } else {
            self.group_type
        }
    }
}

/// Samples and statistics of one output series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotResult {
    pub plots: Vec<PlotValue>,
    pub info: HashMap<String, PlotValue>,
}

/// Time range `get_value` evaluates for a reference time
pub fn value_window(ref_time: SystemTime) -> (SystemTime, SystemTime, Duration) {
    let start = ref_time.checked_sub(VALUE_WINDOW).unwrap_or(ref_time);
    (start, ref_time, VALUE_WINDOW)
}

/// Keep only the statistics of each output series
pub fn into_values(plots: HashMap<String, PlotResult>) -> HashMap<String, HashMap<String, PlotValue>> {
    plots
        .into_iter()
        .map(|(name, result)| (name, result.info))
        .collect()
}
