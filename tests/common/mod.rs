#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use insights_engine::collaborators::{
    BackfillPlanner, CommitResolver, CountSearch, GroupedSearch, QueryRewriter, RepoListSearch,
    RepoResolver,
};
use insights_engine::executor::Clock;
use insights_engine::models::{
    CommitId, CountSearchResponse, GroupedSearchResponse, Plan, RepoId, RepoListResponse,
    SampleTime,
};
use insights_engine::{EngineConfig, ExecutorContext, GitError, GroupBy, InsightsError, Result};

pub fn now() -> SampleTime {
    Utc.with_ymd_and_hms(2022, 4, 1, 0, 0, 0).unwrap()
}

pub fn months_ago(n: u32) -> SampleTime {
    now().checked_sub_months(chrono::Months::new(n)).unwrap()
}

pub fn fixed_clock() -> Clock {
    Arc::new(now)
}

pub fn names(repos: &[&str]) -> Vec<String> {
    repos.iter().map(|r| r.to_string()).collect()
}

#[derive(Default)]
pub struct MockRepos {
    ids: HashMap<String, RepoId>,
}

impl MockRepos {
    pub fn with(repos: &[(&str, RepoId)]) -> Self {
        Self {
            ids: repos.iter().map(|(n, id)| (n.to_string(), *id)).collect(),
        }
    }
}

#[async_trait]
impl RepoResolver for MockRepos {
    async fn resolve(&self, _cancel: &CancellationToken, name: &str) -> Result<RepoId> {
        self.ids
            .get(name)
            .copied()
            .ok_or_else(|| InsightsError::Internal("repo not found in database".to_string()))
    }
}

#[derive(Clone)]
pub enum RepoHistory {
    Empty,
    Broken(String),
    Commits(Vec<(SampleTime, &'static str)>),
}

#[derive(Default)]
pub struct MockGit {
    histories: HashMap<String, RepoHistory>,
}

impl MockGit {
    pub fn with(mut self, repo: &str, history: RepoHistory) -> Self {
        self.histories.insert(repo.to_string(), history);
        self
    }

    fn history(&self, repo: &str) -> std::result::Result<&Vec<(SampleTime, &'static str)>, GitError> {
        match self.histories.get(repo) {
            None => Err(GitError::RepositoryNotFound),
            Some(RepoHistory::Empty) => Err(GitError::EmptyRepository),
            Some(RepoHistory::Broken(msg)) => Err(GitError::Backend(msg.clone())),
            Some(RepoHistory::Commits(commits)) => Ok(commits),
        }
    }
}

#[async_trait]
impl CommitResolver for MockGit {
    async fn first_commit_time(
        &self,
        _cancel: &CancellationToken,
        repository: &str,
    ) -> std::result::Result<SampleTime, GitError> {
        let commits = self.history(repository)?;
        commits.iter().map(|(t, _)| *t).min().ok_or(GitError::EmptyRepository)
    }

    async fn nearest_commit(
        &self,
        _cancel: &CancellationToken,
        repository: &str,
        at: SampleTime,
    ) -> std::result::Result<Option<CommitId>, GitError> {
        let commits = self.history(repository)?;
        Ok(commits
            .iter()
            .filter(|(t, _)| *t <= at)
            .max_by_key(|(t, _)| *t)
            .map(|(_, id)| id.to_string()))
    }
}

/// Rewrites to `repo@revision|query` so searches can be keyed per commit.
pub struct KeyRewriter;

impl QueryRewriter for KeyRewriter {
    fn pin_to_commit(&self, query: &str, repository: &str, revision: &str) -> Result<String> {
        if query.is_empty() {
            return Err(InsightsError::Internal("empty".into()));
        }
        Ok(format!("{}@{}|{}", repository, revision, query))
    }

    fn grouped(&self, query: &str, repository: &str, group_by: GroupBy) -> Result<String> {
        Ok(format!("{}|{}|{}", repository, group_by, query))
    }
}

/// Planner returning a fixed plan regardless of the sample times.
pub struct FixedPlanner(pub Plan);

impl BackfillPlanner for FixedPlanner {
    fn plan(&self, _sample_times: &[SampleTime], _repository: &str) -> Plan {
        self.0.clone()
    }
}

type Responder<T> = Box<dyn Fn(&str) -> Result<T> + Send + Sync>;

/// Search mock answering through a closure and recording every query.
pub struct MockSearch<T> {
    respond: Responder<T>,
    pub queries: Mutex<Vec<String>>,
}

impl<T> MockSearch<T> {
    pub fn new(respond: impl Fn(&str) -> Result<T> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            queries: Mutex::new(Vec::new()),
        }
    }

    fn answer(&self, query: &str) -> Result<T> {
        self.queries.lock().push(query.to_string());
        (self.respond)(query)
    }

    pub fn recorded(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl GroupedSearch for MockSearch<GroupedSearchResponse> {
    async fn search_grouped(
        &self,
        _cancel: &CancellationToken,
        query: &str,
    ) -> Result<GroupedSearchResponse> {
        self.answer(query)
    }
}

#[async_trait]
impl CountSearch for MockSearch<CountSearchResponse> {
    async fn search_count(&self, _cancel: &CancellationToken, query: &str) -> Result<CountSearchResponse> {
        self.answer(query)
    }
}

#[async_trait]
impl RepoListSearch for MockSearch<RepoListResponse> {
    async fn search_repositories(
        &self,
        _cancel: &CancellationToken,
        query: &str,
    ) -> Result<RepoListResponse> {
        self.answer(query)
    }
}

/// Search that never answers, for cancellation tests.
pub struct HangingSearch;

#[async_trait]
impl GroupedSearch for HangingSearch {
    async fn search_grouped(
        &self,
        _cancel: &CancellationToken,
        _query: &str,
    ) -> Result<GroupedSearchResponse> {
        futures::future::pending().await
    }
}

pub fn context(repos: MockRepos, git: MockGit, sample_points: usize) -> ExecutorContext {
    ExecutorContext::new(Arc::new(repos), Arc::new(git))
        .with_rewriter(Arc::new(KeyRewriter))
        .with_clock(fixed_clock())
        .with_config(EngineConfig {
            sample_points,
            ..EngineConfig::default()
        })
}

pub fn long_history(id: &'static str) -> RepoHistory {
    RepoHistory::Commits(vec![(now() - Duration::days(3650), id)])
}
