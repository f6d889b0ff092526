//! Orchestrators that turn a query and a repository list into time series.
//!
//! The two historical strategies (capture groups and streaming counts) share
//! [`HistoricalSampler`], which walks repositories, plans executions, pins the
//! query to a commit and hands each search result to the strategy's fold.
//! Compute grouping and the repository list only reuse the resolution and
//! validation helpers.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::collaborators::{
    BackfillPlanner, CommitResolver, NoopPlanner, QueryRewriter, RepoResolver,
};
use crate::config::EngineConfig;
use crate::error::GitError;
use crate::metrics;
use crate::models::{Execution, Repository, SampleTime, SearchDiagnostics};
use crate::querybuilder::DefaultQueryRewriter;
use crate::timeseries::{sample_times, TimeInterval};
use crate::{InsightsError, Result};

pub mod capture_group;
pub mod compute;
pub mod repo_list;
pub mod streaming;

pub use capture_group::{CaptureGroupExecutor, CaptureGroupStrategy};
pub use compute::ComputeExecutor;
pub use repo_list::RepoListExecutor;
pub use streaming::{StreamingCountExecutor, StreamingCountStrategy};

pub type Clock = Arc<dyn Fn() -> SampleTime + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Collaborators and settings shared by every orchestrator.
#[derive(Clone)]
pub struct ExecutorContext {
    pub repos: Arc<dyn RepoResolver>,
    pub commits: Arc<dyn CommitResolver>,
    pub planner: Arc<dyn BackfillPlanner>,
    pub rewriter: Arc<dyn QueryRewriter>,
    pub clock: Clock,
    pub config: EngineConfig,
}

impl ExecutorContext {
    /// Context with the no-op planner, the default rewriter, the system clock
    /// and default configuration.
    pub fn new(repos: Arc<dyn RepoResolver>, commits: Arc<dyn CommitResolver>) -> Self {
        Self {
            repos,
            commits,
            planner: Arc::new(NoopPlanner),
            rewriter: Arc::new(DefaultQueryRewriter),
            clock: system_clock(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_planner(mut self, planner: Arc<dyn BackfillPlanner>) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_rewriter(mut self, rewriter: Arc<dyn QueryRewriter>) -> Self {
        self.rewriter = rewriter;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn now(&self) -> SampleTime {
        (self.clock)()
    }

    fn concurrency(&self) -> usize {
        self.config.repo_concurrency.max(1)
    }
}

/// Races `fut` against cancellation of `cancel`.
pub(crate) async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(InsightsError::Cancelled),
        output = fut => Ok(output),
    }
}

/// Resolves every name up front; the IDs are only used for bookkeeping.
pub(crate) async fn resolve_repositories(
    ctx: &ExecutorContext,
    cancel: &CancellationToken,
    names: &[String],
) -> Result<Vec<Repository>> {
    let mut resolved = Vec::with_capacity(names.len());
    for name in names {
        let id = cancellable(cancel, ctx.repos.resolve(cancel, name))
            .await?
            .map_err(|err| match err {
                InsightsError::Cancelled => InsightsError::Cancelled,
                other => InsightsError::RepoResolution {
                    repository: name.clone(),
                    message: other.to_string(),
                },
            })?;
        resolved.push(Repository { id, name: name.clone() });
    }
    Ok(resolved)
}

const TERMINAL_SEARCH_ERRORS: &[&str] = &["invalid query"];

/// A search error that will recur on every retry of the same query.
fn is_terminal_search_error(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    TERMINAL_SEARCH_ERRORS.iter().any(|marker| message.contains(marker))
}

/// Errors and alerts fail the call; skipped reasons are only logged. An error
/// the backend marks as a rejected query makes the whole failure terminal.
pub(crate) fn check_diagnostics(
    strategy: &str,
    target: &str,
    revision: Option<&str>,
    diagnostics: &SearchDiagnostics,
) -> Result<()> {
    for reason in &diagnostics.skipped_reasons {
        warn!(strategy, repository = target, revision, reason = %reason, "search skipped part of the corpus");
    }
    if !diagnostics.errors.is_empty() {
        metrics::record_search_failure(strategy);
        error!(strategy, repository = target, revision, errors = ?diagnostics.errors, "search returned errors");
        if diagnostics.errors.iter().any(|message| is_terminal_search_error(message)) {
            return Err(InsightsError::TerminalSearch {
                repository: target.to_string(),
                revision: revision.map(str::to_string),
                messages: diagnostics.errors.clone(),
            });
        }
        return Err(InsightsError::Search {
            repository: target.to_string(),
            revision: revision.map(str::to_string),
            messages: diagnostics.errors.clone(),
        });
    }
    if !diagnostics.alerts.is_empty() {
        metrics::record_search_failure(strategy);
        error!(strategy, repository = target, revision, alerts = ?diagnostics.alerts, "search returned alerts");
        return Err(InsightsError::SearchAlert {
            repository: target.to_string(),
            revision: revision.map(str::to_string),
            alerts: diagnostics.alerts.clone(),
        });
    }
    Ok(())
}

/// Wraps a failed search call with the repository and revision it ran against.
pub(crate) fn search_failure(
    strategy: &str,
    target: &str,
    revision: Option<&str>,
    err: InsightsError,
) -> InsightsError {
    match err {
        InsightsError::Cancelled => InsightsError::Cancelled,
        other => {
            metrics::record_search_failure(strategy);
            InsightsError::Search {
                repository: target.to_string(),
                revision: revision.map(str::to_string),
                messages: vec![other.to_string()],
            }
        }
    }
}

pub(crate) fn rewrite_failure(target: &str, revision: Option<&str>, err: InsightsError) -> InsightsError {
    match err {
        err @ InsightsError::QueryRewrite { .. } => err,
        other => InsightsError::QueryRewrite {
            repository: target.to_string(),
            revision: revision.map(str::to_string),
            message: other.to_string(),
        },
    }
}

fn skip_reason(err: &GitError) -> &'static str {
    match err {
        GitError::EmptyRepository => "empty_repository",
        GitError::RepositoryNotFound => "repository_not_found",
        GitError::RevisionNotFound => "revision_not_found",
        GitError::Backend(_) => "backend",
    }
}

/// What varies between the historical strategies.
#[async_trait]
pub trait SamplingStrategy: Send + Sync {
    /// Payload of one search, already stripped of diagnostics.
    type Output: Send;
    type Accumulator: Default + Send;

    fn name(&self) -> &'static str;

    fn rewrite_query(
        &self,
        rewriter: &dyn QueryRewriter,
        query: &str,
        repository: &str,
        revision: &str,
    ) -> Result<String> {
        rewriter.pin_to_commit(query, repository, revision)
    }

    async fn execute_search(
        &self,
        cancel: &CancellationToken,
        query: &str,
    ) -> Result<(Self::Output, SearchDiagnostics)>;

    fn fold_result(&self, acc: &mut Self::Accumulator, execution: &Execution, output: Self::Output);
}

/// Drives a [`SamplingStrategy`] over every repository and planned execution.
pub struct HistoricalSampler<'a, S> {
    ctx: &'a ExecutorContext,
    strategy: &'a S,
}

impl<'a, S: SamplingStrategy> HistoricalSampler<'a, S> {
    pub fn new(ctx: &'a ExecutorContext, strategy: &'a S) -> Self {
        Self { ctx, strategy }
    }

    /// Samples all repositories and folds the results in caller order.
    ///
    /// Repositories may be sampled concurrently, but results are consumed in
    /// the order of `repositories`, so the accumulator sees the same sequence
    /// as a sequential run. The first error drops the remaining work.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        query: &str,
        repositories: &[String],
        interval: TimeInterval,
    ) -> Result<S::Accumulator> {
        let repos = resolve_repositories(self.ctx, cancel, repositories).await?;
        let times = sample_times(interval, self.ctx.now(), self.ctx.config.sample_points)?;
        debug!(strategy = self.strategy.name(), samples = times.len(), repositories = repos.len(), "sampling repositories");

        let mut acc = S::Accumulator::default();
        let mut sampled = stream::iter(repos.iter())
            .map(|repo| self.sample_repository(cancel, query, repo, &times))
            .buffered(self.ctx.concurrency());

        while let Some(result) = sampled.next().await {
            for (execution, output) in result? {
                self.strategy.fold_result(&mut acc, &execution, output);
            }
        }
        Ok(acc)
    }

    async fn sample_repository(
        &self,
        cancel: &CancellationToken,
        query: &str,
        repo: &Repository,
        times: &[SampleTime],
    ) -> Result<Vec<(Execution, S::Output)>> {
        let strategy = self.strategy.name();
        let first_commit =
            match cancellable(cancel, self.ctx.commits.first_commit_time(cancel, &repo.name)).await? {
                Ok(time) => time,
                Err(err) if err.is_skippable() => {
                    info!(repository = %repo.name, repo_id = repo.id, reason = %err, "skipping repository");
                    metrics::record_skip(skip_reason(&err));
                    return Ok(Vec::new());
                }
                Err(err) => {
                    return Err(InsightsError::CommitLookup {
                        repository: repo.name.clone(),
                        source: err,
                    })
                }
            };

        let plan = self.ctx.planner.plan(times, &repo.name);
        let mut sampled = Vec::with_capacity(plan.executions.len());
        for execution in plan.executions {
            // Only the recording time is compared; shared recordings that fall
            // before the first commit still receive this execution's value.
            if execution.recording_time < first_commit {
                debug!(repository = %repo.name, recording_time = %execution.recording_time, first_commit = %first_commit, "execution precedes first commit");
                metrics::record_skip("pre_inception");
                continue;
            }

            let nearest = cancellable(
                cancel,
                self.ctx
                    .commits
                    .nearest_commit(cancel, &repo.name, execution.recording_time),
            )
            .await?;
            let revision = match nearest {
                Ok(Some(revision)) => revision,
                Ok(None) => {
                    debug!(repository = %repo.name, recording_time = %execution.recording_time, "no commit at recording time");
                    metrics::record_skip("no_commit");
                    continue;
                }
                Err(err) if err.is_skippable() => {
                    debug!(repository = %repo.name, recording_time = %execution.recording_time, reason = %err, "nearest commit unavailable");
                    metrics::record_skip(skip_reason(&err));
                    continue;
                }
                Err(err) => {
                    return Err(InsightsError::CommitLookup {
                        repository: repo.name.clone(),
                        source: err,
                    })
                }
            };

            if let Some(planned) = execution.revision.as_deref() {
                if planned != revision {
                    warn!(repository = %repo.name, planned_revision = planned, fetched_revision = %revision, recording_time = %execution.recording_time, "revision mismatch from commit index");
                }
            }

            let pinned = self
                .strategy
                .rewrite_query(self.ctx.rewriter.as_ref(), query, &repo.name, &revision)
                .map_err(|err| rewrite_failure(&repo.name, Some(&revision), err))?;

            metrics::record_search(strategy);
            let (output, diagnostics) =
                cancellable(cancel, self.strategy.execute_search(cancel, &pinned))
                    .await?
                    .map_err(|err| search_failure(strategy, &repo.name, Some(&revision), err))?;
            check_diagnostics(strategy, &repo.name, Some(&revision), &diagnostics)?;

            sampled.push((execution, output));
        }
        Ok(sampled)
    }
}
