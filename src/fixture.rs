//! Collaborators backed by a JSON file of recorded responses.
//!
//! Used by the `insights-replay` binary to rerun an insight offline against
//! what gitserver and the search backend answered at recording time. Search
//! responses are keyed by the final query string; unknown queries get an
//! empty response.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::collaborators::{CommitResolver, CountSearch, GroupedSearch, RepoListSearch, RepoResolver};
use crate::error::GitError;
use crate::models::{
    CommitId, CountSearchResponse, GroupedSearchResponse, RepoId, RepoListResponse, SampleTime,
};
use crate::{InsightsError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedCommit {
    pub id: CommitId,
    pub time: SampleTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedRepository {
    pub id: RepoId,
    pub name: String,
    #[serde(default)]
    pub commits: Vec<RecordedCommit>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub repositories: Vec<RecordedRepository>,
    #[serde(default)]
    pub grouped: HashMap<String, GroupedSearchResponse>,
    #[serde(default)]
    pub counts: HashMap<String, CountSearchResponse>,
    #[serde(default)]
    pub repo_lists: HashMap<String, RepoListResponse>,
}

impl Fixture {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| InsightsError::Fixture(format!("reading {}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    fn repository(&self, name: &str) -> Option<&RecordedRepository> {
        self.repositories.iter().find(|repo| repo.name == name)
    }
}

#[async_trait]
impl RepoResolver for Fixture {
    async fn resolve(&self, _cancel: &CancellationToken, name: &str) -> Result<RepoId> {
        self.repository(name)
            .map(|repo| repo.id)
            .ok_or_else(|| InsightsError::Fixture(format!("no recorded repository named {}", name)))
    }
}

#[async_trait]
impl CommitResolver for Fixture {
    async fn first_commit_time(
        &self,
        _cancel: &CancellationToken,
        repository: &str,
    ) -> std::result::Result<SampleTime, GitError> {
        let repo = self.repository(repository).ok_or(GitError::RepositoryNotFound)?;
        repo.commits
            .iter()
            .map(|commit| commit.time)
            .min()
            .ok_or(GitError::EmptyRepository)
    }

    async fn nearest_commit(
        &self,
        _cancel: &CancellationToken,
        repository: &str,
        at: SampleTime,
    ) -> std::result::Result<Option<CommitId>, GitError> {
        let repo = self.repository(repository).ok_or(GitError::RepositoryNotFound)?;
        Ok(repo
            .commits
            .iter()
            .filter(|commit| commit.time <= at)
            .max_by_key(|commit| commit.time)
            .map(|commit| commit.id.clone()))
    }
}

#[async_trait]
impl GroupedSearch for Fixture {
    async fn search_grouped(
        &self,
        _cancel: &CancellationToken,
        query: &str,
    ) -> Result<GroupedSearchResponse> {
        let response = self.grouped.get(query).cloned();
        if response.is_none() {
            debug!(query, "no recorded grouped response");
        }
        Ok(response.unwrap_or_default())
    }
}

#[async_trait]
impl CountSearch for Fixture {
    async fn search_count(&self, _cancel: &CancellationToken, query: &str) -> Result<CountSearchResponse> {
        let response = self.counts.get(query).cloned();
        if response.is_none() {
            debug!(query, "no recorded count response");
        }
        Ok(response.unwrap_or_default())
    }
}

#[async_trait]
impl RepoListSearch for Fixture {
    async fn search_repositories(
        &self,
        _cancel: &CancellationToken,
        query: &str,
    ) -> Result<RepoListResponse> {
        Ok(self.repo_lists.get(query).cloned().unwrap_or_default())
    }
}
