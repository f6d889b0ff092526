use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::assembler::assemble_ranked;
use crate::collaborators::GroupedSearch;
use crate::executor::{
    cancellable, check_diagnostics, resolve_repositories, rewrite_failure, search_failure,
    ExecutorContext,
};
use crate::metrics::{self, ExecuteTimer};
use crate::models::{GeneratedTimeSeries, GroupedResult, Repository};
use crate::pivot::{sort_by_value, FlatAccumulator};
use crate::querybuilder::GroupBy;
use crate::Result;

const STRATEGY: &str = "compute_grouping";

/// Groups matches at the current index state; not historical.
pub struct ComputeExecutor {
    ctx: ExecutorContext,
    search: Arc<dyn GroupedSearch>,
}

impl ComputeExecutor {
    pub fn new(ctx: ExecutorContext, search: Arc<dyn GroupedSearch>) -> Self {
        Self { ctx, search }
    }

    /// One single-point series per group value, ranked by count and capped at
    /// `max_grouped_series`.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        query: &str,
        group_by: GroupBy,
        repositories: &[String],
    ) -> Result<Vec<GeneratedTimeSeries>> {
        let _timer = ExecuteTimer::new(STRATEGY);
        let repos = resolve_repositories(&self.ctx, cancel, repositories).await?;

        let mut totals = FlatAccumulator::default();
        let mut grouped = stream::iter(repos.iter())
            .map(|repo| self.search_repository(cancel, query, group_by, repo))
            .buffered(self.ctx.concurrency());
        while let Some(groups) = grouped.next().await {
            for group in groups? {
                totals.add(&group);
            }
        }

        let labels = totals.len();
        let series = assemble_ranked(totals, self.ctx.now(), self.ctx.config.max_grouped_series);
        info!(strategy = STRATEGY, %group_by, labels, series = series.len(), "compute grouping execution complete");
        metrics::record_series(STRATEGY, series.len());
        Ok(series)
    }

    async fn search_repository(
        &self,
        cancel: &CancellationToken,
        query: &str,
        group_by: GroupBy,
        repo: &Repository,
    ) -> Result<Vec<GroupedResult>> {
        let grouped_query = self
            .ctx
            .rewriter
            .grouped(query, &repo.name, group_by)
            .map_err(|err| rewrite_failure(&repo.name, None, err))?;
        debug!(repository = %repo.name, repo_id = repo.id, query = %grouped_query, "running grouped search");

        metrics::record_search(STRATEGY);
        let mut response = cancellable(cancel, self.search.search_grouped(cancel, &grouped_query))
            .await?
            .map_err(|err| search_failure(STRATEGY, &repo.name, None, err))?;
        check_diagnostics(STRATEGY, &repo.name, None, &response.diagnostics)?;

        sort_by_value(&mut response.groups);
        Ok(response.groups)
    }
}
