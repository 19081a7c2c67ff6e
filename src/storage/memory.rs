use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{
    Consolidation,
    Export,
    Plan,
    Statistic,
    Step,
    StorageEngine,
    StorageError,
    Token,
};

const DEFAULT_RESOLUTION: Duration = Duration::from_secs(60);

/// Most rows a single evaluation may produce
pub const MAX_ROWS: u64 = 100_000;

type Samples = BTreeMap<u64, f64>;

/// In-memory storage engine
///
/// Files are keyed by path and hold named datasets of samples indexed by
/// unix seconds. Plans are evaluated on a step grid covering `(start, end]`;
/// `graph` uses the engine resolution as its step.
pub struct MemoryEngine {
    files: RwLock<HashMap<PathBuf, BTreeMap<String, Samples>>>,
    resolution: Duration,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new(DEFAULT_RESOLUTION)
    }
}

impl MemoryEngine {
    pub fn new(resolution: Duration) -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            resolution,
        }
    }

    pub fn resolution(&self) -> Duration {
        self.resolution
    }

    /// Declare an empty dataset in a file
    pub fn add_dataset(&self, path: impl Into<PathBuf>, dataset: impl Into<String>) {
        self.files
            .write()
            .entry(path.into())
            .or_default()
            .entry(dataset.into())
            .or_default();
    }

    /// Store one sample
    pub fn insert(&self, path: impl AsRef<Path>, dataset: &str, at: SystemTime, value: f64) {
        let ts = at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        self.files
            .write()
            .entry(path.as_ref().to_path_buf())
            .or_default()
            .entry(dataset.to_string())
            .or_default()
            .insert(ts, value);
    }

    /// Store consecutive samples starting at `start`, one per `step`
    pub fn insert_series(
        &self,
        path: impl AsRef<Path>,
        dataset: &str,
        start: SystemTime,
        step: Duration,
        values: &[f64],
    ) {
        let mut at = start;
        for value in values {
            self.insert(path.as_ref(), dataset, at, *value);
            at += step;
        }
    }

    fn evaluate(
        &self,
        plan: &Plan,
        start: SystemTime,
        end: SystemTime,
        step: Duration,
    ) -> Result<Evaluation, StorageError> {
        let start = unix_secs(start)?;
        let end = unix_secs(end)?;
        let step = step.as_secs();
        if step == 0 {
            return Err(StorageError::Engine("step must be at least one second".into()));
        }

        let rows = end.saturating_sub(start) / step;
        if rows > MAX_ROWS {
            return Err(StorageError::Engine(format!(
                "{} rows requested, at most {} allowed",
                rows, MAX_ROWS
            )));
        }

        let grid: Vec<u64> = (1..)
            .map(|k| start + k * step)
            .take_while(|ts| *ts <= end)
            .collect();

        let files = self.files.read();
        let mut eval = Evaluation {
            rows: grid.len(),
            ..Default::default()
        };

        for plan_step in plan.steps() {
            match plan_step {
                Step::Def { name, source, cf } => {
                    let samples = files
                        .get(&source.path)
                        .ok_or_else(|| StorageError::NotFound(source.path.display().to_string()))?
                        .get(&source.dataset)
                        .ok_or_else(|| {
                            StorageError::NotFound(format!(
                                "{}:{}",
                                source.path.display(),
                                source.dataset
                            ))
                        })?;
                    let values = grid
                        .iter()
                        .map(|ts| consolidate(samples, ts.saturating_sub(step), *ts, *cf))
                        .collect();
                    eval.series.insert(name.clone(), values);
                }
                Step::CDef { name, expr } => {
                    let mut values = Vec::with_capacity(grid.len());
                    for row in 0..grid.len() {
                        values.push(eval.rpn(expr.tokens(), row)?);
                    }
                    eval.series.insert(name.clone(), values);
                }
                Step::VDef { name, series, stat } => {
                    let values = eval
                        .series
                        .get(series)
                        .ok_or_else(|| StorageError::Expression(format!("unknown series `{}`", series)))?;
                    eval.scalars.insert(name.clone(), reduce(values, *stat));
                }
                Step::Print { name, format } => {
                    let value = eval
                        .scalars
                        .get(name)
                        .ok_or_else(|| StorageError::Expression(format!("unknown statistic `{}`", name)))?;
                    eval.prints.push(format.replace("%lf", &format!("{:.6}", value)));
                }
                Step::Xport { name, legend } => {
                    if !eval.series.contains_key(name) {
                        return Err(StorageError::Expression(format!("unknown series `{}`", name)));
                    }
                    eval.xports.push((legend.clone(), name.clone()));
                }
            }
        }

        Ok(eval)
    }
}

#[async_trait]
impl StorageEngine for MemoryEngine {
    async fn datasets(&self, path: &Path) -> Result<Vec<String>, StorageError> {
        self.files
            .read()
            .get(path)
            .map(|datasets| datasets.keys().cloned().collect())
            .ok_or_else(|| StorageError::NotFound(path.display().to_string()))
    }

    async fn export(
        &self,
        plan: &Plan,
        start: SystemTime,
        end: SystemTime,
        step: Duration,
    ) -> Result<Export, StorageError> {
        let eval = self.evaluate(plan, start, end, step)?;

        let mut export = Export {
            legends: eval.xports.iter().map(|(legend, _)| legend.clone()).collect(),
            rows: eval.rows,
            values: Vec::with_capacity(eval.rows * eval.xports.len()),
        };
        for row in 0..eval.rows {
            for (_, name) in &eval.xports {
                export.values.push(eval.series[name][row]);
            }
        }

        Ok(export)
    }

    async fn graph(
        &self,
        plan: &Plan,
        start: SystemTime,
        end: SystemTime,
    ) -> Result<Vec<String>, StorageError> {
        Ok(self.evaluate(plan, start, end, self.resolution)?.prints)
    }
}

#[derive(Default)]
struct Evaluation {
    rows: usize,
    series: HashMap<String, Vec<f64>>,
    scalars: HashMap<String, f64>,
    prints: Vec<String>,
    xports: Vec<(String, String)>,
}

impl Evaluation {
    fn rpn(&self, tokens: &[Token], row: usize) -> Result<f64, StorageError> {
        let mut stack: Vec<f64> = Vec::new();
        let underflow = || StorageError::Expression("stack underflow".into());

        for token in tokens {
            match token {
                Token::Name(name) => {
                    let values = self
                        .series
                        .get(name)
                        .ok_or_else(|| StorageError::Expression(format!("unknown series `{}`", name)))?;
                    stack.push(values[row]);
                }
                Token::Number(value) => stack.push(*value),
                Token::Add | Token::Mul | Token::Div => {
                    let b = stack.pop().ok_or_else(underflow)?;
                    let a = stack.pop().ok_or_else(underflow)?;
                    stack.push(match token {
                        Token::Add => a + b,
                        Token::Mul => a * b,
                        _ => a / b,
                    });
                }
                Token::Unknown => {
                    let a = stack.pop().ok_or_else(underflow)?;
                    stack.push(if a.is_nan() { 1.0 } else { 0.0 });
                }
                Token::If => {
                    let c = stack.pop().ok_or_else(underflow)?;
                    let b = stack.pop().ok_or_else(underflow)?;
                    let a = stack.pop().ok_or_else(underflow)?;
                    stack.push(if a != 0.0 && !a.is_nan() { b } else { c });
                }
            }
        }

        match stack.as_slice() {
            [value] => Ok(*value),
            _ => Err(StorageError::Expression(format!(
                "expression leaves {} values on the stack",
                stack.len()
            ))),
        }
    }
}

fn unix_secs(at: SystemTime) -> Result<u64, StorageError> {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| StorageError::Engine(e.to_string()))
}

// Samples in (from, to]
fn consolidate(samples: &Samples, from: u64, to: u64, cf: Consolidation) -> f64 {
    let mut values = samples
        .range(from + 1..=to)
        .map(|(_, v)| *v)
        .filter(|v| !v.is_nan())
        .peekable();

    if values.peek().is_none() {
        return f64::NAN;
    }

    match cf {
        Consolidation::Average => {
            let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
            sum / count as f64
        }
        Consolidation::Min => values.fold(f64::INFINITY, f64::min),
        Consolidation::Max => values.fold(f64::NEG_INFINITY, f64::max),
        Consolidation::Last => values.last().unwrap_or(f64::NAN),
    }
}

fn reduce(values: &[f64], stat: Statistic) -> f64 {
    let mut known: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if known.is_empty() {
        return f64::NAN;
    }

    match stat {
        Statistic::Minimum => known.iter().copied().fold(f64::INFINITY, f64::min),
        Statistic::Maximum => known.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        Statistic::Average => known.iter().sum::<f64>() / known.len() as f64,
        Statistic::Last => known[known.len() - 1],
        Statistic::Percent(p) => {
            known.sort_by(|a, b| a.total_cmp(b));
            // nearest rank
            let rank = ((p / 100.0) * known.len() as f64).ceil() as usize;
            known[rank.clamp(1, known.len()) - 1]
        }
    }
}
