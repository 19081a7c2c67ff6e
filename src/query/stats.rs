use std::collections::HashMap;
use tracing::warn;

use crate::storage::{Plan, Rpn, Statistic, Token};
use super::{PlotResult, PlotValue};

/// Label of a percentile statistic
///
/// Whole percentiles render without decimals (`50th`), fractional ones
/// with two (`95.50th`).
pub fn percentile_label(percentile: f64) -> String {
    if percentile.fract() != 0.0 {
        format!("{:.2}th", percentile)
    } else {
        format!("{:.0}th", percentile)
    }
}

/// Append min/avg/max/last and percentile requests for `series`,
/// printed under the `output` name
pub(crate) fn request_statistics(plan: &mut Plan, series: &str, output: &str, percentiles: &[f64]) {
    let basic = [
        ("min", Statistic::Minimum),
        ("avg", Statistic::Average),
        ("max", Statistic::Maximum),
        ("last", Statistic::Last),
    ];

    for (label, stat) in basic {
        let vname = format!("{}-{}", series, label);
        plan.vdef(vname.clone(), series, stat)
            .print(vname, format!("{},{},%lf", output, label));
    }

    for (index, percentile) in percentiles.iter().enumerate() {
        // unknown samples count as zero
        let guarded = format!("{}-cdef{}", series, index);
        let vname = format!("{}-vdef{}", series, index);

        plan.cdef(
            guarded.clone(),
            Rpn::name(series)
                .push(Token::Unknown)
                .push(Token::Number(0.0))
                .push(Token::Name(series.to_string()))
                .push(Token::If),
        )
        .vdef(vname.clone(), guarded, Statistic::Percent(*percentile))
        .print(vname, format!("{},{},%lf", output, percentile_label(*percentile)));
    }
}

/// Split a print line into `(output, label, value)`
///
/// Unparsable values yield `NaN`. The label and value never contain
/// commas, so the line is split from the right.
pub fn parse_print_line(line: &str) -> Option<(&str, &str, PlotValue)> {
    let mut chunks = line.rsplitn(3, ',');
    let value = chunks.next()?;
    let label = chunks.next()?;
    let output = chunks.next()?;

    let value = value.trim().parse::<f64>().unwrap_or(f64::NAN);
    Some((output, label, value))
}

/// Merge print lines into the per-output statistics
pub(crate) fn apply_prints(prints: &[String], results: &mut HashMap<String, PlotResult>) {
    for line in prints {
        match parse_print_line(line) {
            Some((output, label, value)) => {
                results
                    .entry(output.to_string())
                    .or_default()
                    .info
                    .insert(label.to_string(), value);
            }
            None => warn!("ignoring malformed statistics line `{}`", line),
        }
    }
}
