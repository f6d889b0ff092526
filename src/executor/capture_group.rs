use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::assembler::assemble_dynamic;
use crate::collaborators::GroupedSearch;
use crate::executor::{ExecutorContext, HistoricalSampler, SamplingStrategy};
use crate::metrics::{self, ExecuteTimer};
use crate::models::{Execution, GeneratedTimeSeries, GroupedResult, SearchDiagnostics};
use crate::pivot::{sort_by_value, PivotAccumulator};
use crate::timeseries::TimeInterval;
use crate::Result;

const STRATEGY: &str = "capture_group";

/// Labels come from capture groups; each label becomes its own series.
pub struct CaptureGroupStrategy {
    search: Arc<dyn GroupedSearch>,
}

impl CaptureGroupStrategy {
    pub fn new(search: Arc<dyn GroupedSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl SamplingStrategy for CaptureGroupStrategy {
    type Output = Vec<GroupedResult>;
    type Accumulator = PivotAccumulator;

    fn name(&self) -> &'static str {
        STRATEGY
    }

    async fn execute_search(
        &self,
        cancel: &CancellationToken,
        query: &str,
    ) -> Result<(Vec<GroupedResult>, SearchDiagnostics)> {
        let mut response = self.search.search_grouped(cancel, query).await?;
        sort_by_value(&mut response.groups);
        Ok((response.groups, response.diagnostics))
    }

    fn fold_result(&self, acc: &mut PivotAccumulator, execution: &Execution, output: Vec<GroupedResult>) {
        for group in &output {
            acc.add_execution(execution, group);
        }
    }
}

pub struct CaptureGroupExecutor {
    ctx: ExecutorContext,
    strategy: CaptureGroupStrategy,
}

impl CaptureGroupExecutor {
    pub fn new(ctx: ExecutorContext, search: Arc<dyn GroupedSearch>) -> Self {
        Self {
            ctx,
            strategy: CaptureGroupStrategy::new(search),
        }
    }

    /// Historical capture-group series, one per distinct captured value.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        query: &str,
        repositories: &[String],
        interval: TimeInterval,
    ) -> Result<Vec<GeneratedTimeSeries>> {
        let _timer = ExecuteTimer::new(STRATEGY);
        let pivot = HistoricalSampler::new(&self.ctx, &self.strategy)
            .run(cancel, query, repositories, interval)
            .await?;

        let series = assemble_dynamic(pivot);
        info!(strategy = STRATEGY, series = series.len(), "capture group execution complete");
        metrics::record_series(STRATEGY, series.len());
        Ok(series)
    }
}
