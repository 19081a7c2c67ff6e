/*!
# Storage Module

Narrow interface to the time-series storage engine. The catalog and the
query engine never touch storage files directly; they describe what they
need as a [`Plan`] and hand it to a [`StorageEngine`].

## Plan Steps

A plan is an ordered list of steps, each naming a series the later
steps may refer to:

1. **Def** - read a dataset out of a storage file with a consolidation function
2. **CDef** - derive a series from an RPN expression over earlier series
3. **VDef** - reduce a series to a single statistic
4. **Print** - render a statistic as text (`%lf` is replaced by the value)
5. **Xport** - export a series' samples under a legend

## Engine Operations

- `datasets` reads the dataset names stored in a file
- `export` evaluates a plan and returns samples on a step grid
- `graph` evaluates a plan and returns its rendered print lines

Every engine failure is returned as a [`StorageError`] and propagated
unchanged by the callers.
*/

use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

pub mod error;
pub mod memory;

pub use error::StorageError;
pub use memory::MemoryEngine;

/// Storage-engine handle for one dataset inside one file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataSource {
    /// Storage file path
    pub path: PathBuf,
    /// Dataset name inside the file
    pub dataset: String,
}

impl DataSource {
    pub fn new(path: impl Into<PathBuf>, dataset: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            dataset: dataset.into(),
        }
    }
}

/// Consolidation function applied when reading a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Consolidation {
    Average,
    Min,
    Max,
    Last,
}

impl Consolidation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Consolidation::Average => "AVERAGE",
            Consolidation::Min => "MIN",
            Consolidation::Max => "MAX",
            Consolidation::Last => "LAST",
        }
    }
}

impl fmt::Display for Consolidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single RPN token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Reference to a previously defined series
    Name(String),
    /// Numeric constant
    Number(f64),
    Add,
    Mul,
    Div,
    /// Pops a value, pushes 1 if it is unknown and 0 otherwise
    Unknown,
    /// Pops `a,b,c`, pushes `b` when `a` is non-zero and `c` otherwise
    If,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Name(name) => f.write_str(name),
            Token::Number(value) => write!(f, "{}", value),
            Token::Add => f.write_str("+"),
            Token::Mul => f.write_str("*"),
            Token::Div => f.write_str("/"),
            Token::Unknown => f.write_str("UN"),
            Token::If => f.write_str("IF"),
        }
    }
}

/// Arithmetic expression in reverse polish notation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rpn(pub Vec<Token>);

impl Rpn {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Expression consisting of a single series reference
    pub fn name(name: impl Into<String>) -> Self {
        Self(vec![Token::Name(name.into())])
    }

    pub fn push(mut self, token: Token) -> Self {
        self.0.push(token);
        self
    }

    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Rpn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, token) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

/// Statistic a VDef step reduces a series to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statistic {
    Minimum,
    Average,
    Maximum,
    Last,
    /// Percentile in the `0..=100` range
    Percent(f64),
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statistic::Minimum => f.write_str("MINIMUM"),
            Statistic::Average => f.write_str("AVERAGE"),
            Statistic::Maximum => f.write_str("MAXIMUM"),
            Statistic::Last => f.write_str("LAST"),
            Statistic::Percent(p) => write!(f, "{},PERCENT", p),
        }
    }
}

/// One step of a storage request plan
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Def {
        name: String,
        source: DataSource,
        cf: Consolidation,
    },
    CDef {
        name: String,
        expr: Rpn,
    },
    VDef {
        name: String,
        series: String,
        stat: Statistic,
    },
    Print {
        name: String,
        format: String,
    },
    Xport {
        name: String,
        legend: String,
    },
}

/// Ordered storage request plan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    steps: Vec<Step>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn def(&mut self, name: impl Into<String>, source: DataSource, cf: Consolidation) -> &mut Self {
        self.steps.push(Step::Def {
            name: name.into(),
            source,
            cf,
        });
        self
    }

    pub fn cdef(&mut self, name: impl Into<String>, expr: Rpn) -> &mut Self {
        self.steps.push(Step::CDef {
            name: name.into(),
            expr,
        });
        self
    }

    pub fn vdef(&mut self, name: impl Into<String>, series: impl Into<String>, stat: Statistic) -> &mut Self {
        self.steps.push(Step::VDef {
            name: name.into(),
            series: series.into(),
            stat,
        });
        self
    }

    pub fn print(&mut self, name: impl Into<String>, format: impl Into<String>) -> &mut Self {
        self.steps.push(Step::Print {
            name: name.into(),
            format: format.into(),
        });
        self
    }

    pub fn xport(&mut self, name: impl Into<String>, legend: impl Into<String>) -> &mut Self {
        self.steps.push(Step::Xport {
            name: name.into(),
            legend: legend.into(),
        });
        self
    }

    /// Append every step of another plan
    pub fn extend(&mut self, other: &Plan) -> &mut Self {
        self.steps.extend(other.steps.iter().cloned());
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Samples exported for a time range, stored row-major
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Export {
    /// Exported legends, in column order
    pub legends: Vec<String>,
    /// Number of rows (time steps)
    pub rows: usize,
    /// `rows * legends.len()` values
    pub values: Vec<f64>,
}

impl Export {
    /// Value for a legend column at a row, unknown when out of range
    pub fn value_at(&self, legend: usize, row: usize) -> f64 {
        if legend >= self.legends.len() || row >= self.rows {
            return f64::NAN;
        }
        self.values
            .get(row * self.legends.len() + legend)
            .copied()
            .unwrap_or(f64::NAN)
    }

    /// All values of one legend column
    pub fn column(&self, legend: usize) -> Vec<f64> {
        (0..self.rows).map(|row| self.value_at(legend, row)).collect()
    }
}

/// Time-series storage engine
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Names of the datasets stored in a file
    async fn datasets(&self, path: &Path) -> Result<Vec<String>, StorageError>;

    /// Evaluate a plan and export its Xport series over `(start, end]`
    async fn export(
        &self,
        plan: &Plan,
        start: SystemTime,
        end: SystemTime,
        step: Duration,
    ) -> Result<Export, StorageError>;

    /// Evaluate a plan over `(start, end]` and return its rendered print lines
    async fn graph(
        &self,
        plan: &Plan,
        start: SystemTime,
        end: SystemTime,
    ) -> Result<Vec<String>, StorageError>;
}
