//! Contracts for the services the orchestrators drive.
//!
//! Everything here is implemented outside the engine (gitserver, the search
//! backend, the backfill planner). Async calls receive the caller's
//! cancellation token so they can abort their own I/O.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::GitError;
use crate::models::{
    CommitId, CountSearchResponse, GroupedSearchResponse, Plan, RepoId, RepoListResponse,
    SampleTime,
};
use crate::querybuilder::GroupBy;
use crate::Result;

pub mod cache;
pub mod planner;

pub use cache::CachedCommitResolver;
pub use planner::NoopPlanner;

#[async_trait]
pub trait RepoResolver: Send + Sync {
    async fn resolve(&self, cancel: &CancellationToken, name: &str) -> Result<RepoId>;
}

#[async_trait]
pub trait CommitResolver: Send + Sync {
    /// Time of the first commit on the default branch.
    async fn first_commit_time(
        &self,
        cancel: &CancellationToken,
        repository: &str,
    ) -> std::result::Result<SampleTime, GitError>;

    /// Most recent commit at or before `at`, if any.
    async fn nearest_commit(
        &self,
        cancel: &CancellationToken,
        repository: &str,
        at: SampleTime,
    ) -> std::result::Result<Option<CommitId>, GitError>;
}

pub trait BackfillPlanner: Send + Sync {
    fn plan(&self, sample_times: &[SampleTime], repository: &str) -> Plan;
}

pub trait QueryRewriter: Send + Sync {
    fn pin_to_commit(&self, query: &str, repository: &str, revision: &str) -> Result<String>;

    fn grouped(&self, query: &str, repository: &str, group_by: GroupBy) -> Result<String>;
}

#[async_trait]
pub trait GroupedSearch: Send + Sync {
    async fn search_grouped(
        &self,
        cancel: &CancellationToken,
        query: &str,
    ) -> Result<GroupedSearchResponse>;
}

#[async_trait]
pub trait CountSearch: Send + Sync {
    async fn search_count(&self, cancel: &CancellationToken, query: &str) -> Result<CountSearchResponse>;
}

#[async_trait]
pub trait RepoListSearch: Send + Sync {
    async fn search_repositories(
        &self,
        cancel: &CancellationToken,
        query: &str,
    ) -> Result<RepoListResponse>;
}
