use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::assembler::assemble_single;
use crate::collaborators::CountSearch;
use crate::executor::{ExecutorContext, HistoricalSampler, SamplingStrategy};
use crate::metrics::{self, ExecuteTimer};
use crate::models::{Execution, GeneratedTimeSeries, SearchDiagnostics};
use crate::pivot::PointAccumulator;
use crate::timeseries::TimeInterval;
use crate::Result;

const STRATEGY: &str = "streaming_count";

/// One scalar match count per execution, all folded into a single series.
pub struct StreamingCountStrategy {
    search: Arc<dyn CountSearch>,
}

impl StreamingCountStrategy {
    pub fn new(search: Arc<dyn CountSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl SamplingStrategy for StreamingCountStrategy {
    type Output = u64;
    type Accumulator = PointAccumulator;

    fn name(&self) -> &'static str {
        STRATEGY
    }

    async fn execute_search(
        &self,
        cancel: &CancellationToken,
        query: &str,
    ) -> Result<(u64, SearchDiagnostics)> {
        let response = self.search.search_count(cancel, query).await?;
        Ok((response.total, response.diagnostics))
    }

    fn fold_result(&self, acc: &mut PointAccumulator, execution: &Execution, total: u64) {
        acc.add_execution(execution, total);
    }
}

pub struct StreamingCountExecutor {
    ctx: ExecutorContext,
    strategy: StreamingCountStrategy,
}

impl StreamingCountExecutor {
    pub fn new(ctx: ExecutorContext, search: Arc<dyn CountSearch>) -> Self {
        Self {
            ctx,
            strategy: StreamingCountStrategy::new(search),
        }
    }

    /// Always returns exactly one series carrying the caller's label and id,
    /// even when every repository was skipped.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        query: &str,
        series_label: &str,
        series_id: &str,
        repositories: &[String],
        interval: TimeInterval,
    ) -> Result<Vec<GeneratedTimeSeries>> {
        let _timer = ExecuteTimer::new(STRATEGY);
        let points = HistoricalSampler::new(&self.ctx, &self.strategy)
            .run(cancel, query, repositories, interval)
            .await?;

        let series = assemble_single(series_label, series_id, points);
        info!(strategy = STRATEGY, series_id, points = series.points.len(), "streaming count execution complete");
        metrics::record_series(STRATEGY, 1);
        Ok(vec![series])
    }
}
