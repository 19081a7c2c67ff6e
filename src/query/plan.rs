use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use tracing::debug;

use crate::catalog::Metric;
use crate::storage::{Consolidation, DataSource, Plan, Rpn, StorageEngine, Token};
use crate::Result;
use super::{
    GroupQuery,
    GroupType,
    PlotResult,
    QueryError,
    stats::{apply_prints, request_statistics},
};

/// Storage requests for one group query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// Definitions plus statistics requests
    graph: Plan,
    /// Definitions plus sample exports, absent for statistics-only plans
    export: Option<Plan>,
    /// Internal series name -> output series name
    outputs: HashMap<String, String>,
}

impl QueryPlan {
    /// Build the plan of a query
    ///
    /// `resolve` maps a catalog metric to its storage handle. When
    /// `info_only` is set no samples are exported.
    pub fn build<F>(
        query: &GroupQuery,
        percentiles: &[f64],
        info_only: bool,
        mut resolve: F,
    ) -> Result<Self>
    where
        F: FnMut(&Metric) -> Result<DataSource>,
    {
        if query.series.is_empty() {
            return Err(QueryError::NoSeries.into());
        }

        let mut defs = Plan::new();
        let mut stats = Plan::new();
        let mut xports = Plan::new();
        let mut outputs = HashMap::new();

        match query.effective_type() {
            GroupType::None => {
                let mut count = 0;
                for serie in &query.series {
                    let Some(metric) = &serie.metric else {
                        continue;
                    };

                    let name = format!("serie{}", count);
                    count += 1;

                    defs.def(format!("{}-orig0", name), resolve(metric)?, Consolidation::Average)
                        .cdef(format!("{}-orig1", name), scaled(&format!("{}-orig0", name), serie.scale))
                        .cdef(name.clone(), scaled(&format!("{}-orig1", name), query.scale));

                    request_statistics(&mut stats, &name, &serie.name, percentiles);
                    xports.xport(name.clone(), name.clone());
                    outputs.insert(name, serie.name.clone());
                }
            }
            group_type @ (GroupType::Sum | GroupType::Avg) => {
                let name = "serie0".to_string();
                let mut stack = Rpn::new();
                let mut contributing = 0usize;

                for (index, serie) in query.series.iter().enumerate() {
                    let Some(metric) = &serie.metric else {
                        continue;
                    };

                    let input = format!("{}-tmp{}", name, index);
                    defs.def(input.clone(), resolve(metric)?, Consolidation::Average);

                    stack = stack.push(Token::Name(input));
                    if contributing > 0 {
                        stack = stack.push(Token::Add);
                    }
                    contributing += 1;
                }

                if contributing == 0 {
                    return Err(QueryError::NoContributingSeries.into());
                }

                if group_type == GroupType::Avg {
                    stack = stack
                        .push(Token::Number(contributing as f64))
                        .push(Token::Div);
                }

                defs.cdef(format!("{}-orig", name), stack)
                    .cdef(name.clone(), scaled(&format!("{}-orig", name), query.scale));

                request_statistics(&mut stats, &name, &query.name, percentiles);
                xports.xport(name.clone(), name.clone());
                outputs.insert(name, query.name.clone());
            }
        }

        let mut graph = defs.clone();
        graph.extend(&stats);

        let export = if info_only {
            None
        } else {
            let mut export = defs;
            export.extend(&xports);
            Some(export)
        };

        debug!(
            "planned group `{}` with {} output series",
            query.name,
            outputs.len()
        );

        Ok(Self {
            graph,
            export,
            outputs,
        })
    }

    pub fn graph(&self) -> &Plan {
        &self.graph
    }

    pub fn export(&self) -> Option<&Plan> {
        self.export.as_ref()
    }

    pub fn outputs(&self) -> &HashMap<String, String> {
        &self.outputs
    }

    pub fn is_info_only(&self) -> bool {
        self.export.is_none()
    }

    /// Run the plan against a storage engine
    ///
    /// Samples are exported first and any export failure aborts the
    /// call; statistics are then parsed from the engine's print lines.
    pub async fn execute(
        &self,
        engine: &dyn StorageEngine,
        start: SystemTime,
        end: SystemTime,
        step: Duration,
    ) -> Result<HashMap<String, PlotResult>> {
        let mut results: HashMap<String, PlotResult> = HashMap::new();

        if let Some(export_plan) = &self.export {
            let export = engine.export(export_plan, start, end, step).await?;

            for (index, legend) in export.legends.iter().enumerate() {
                let output = self
                    .outputs
                    .get(legend)
                    .cloned()
                    .unwrap_or_else(|| legend.clone());

                results.insert(output, PlotResult {
                    plots: export.column(index),
                    info: HashMap::new(),
                });
            }
        }

        let prints = engine.graph(&self.graph, start, end).await?;
        apply_prints(&prints, &mut results);

        Ok(results)
    }
}

// Multiply by a non-zero factor, pass through otherwise
fn scaled(series: &str, factor: f64) -> Rpn {
    if factor != 0.0 {
        Rpn::name(series)
            .push(Token::Number(factor))
            .push(Token::Mul)
    } else {
        Rpn::name(series)
    }
}
