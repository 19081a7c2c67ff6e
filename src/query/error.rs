use thiserror::Error;

/// Group query errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Query carries no series at all
    #[error("group has no series")]
    NoSeries,

    /// Aggregation operator outside of none/avg/sum
    #[error("unknown `{0}` operator type")]
    UnknownOperator(String),

    /// Aggregated query whose series all lack a metric
    #[error("group has no series with a resolved metric")]
    NoContributingSeries,

    /// Serie references a metric the connector has not discovered
    #[error("unknown metric `{metric}` for source `{source_name}`")]
    UnknownMetric {
        source_name: String,
        metric: String,
    },
}
