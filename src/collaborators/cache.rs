use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::collaborators::CommitResolver;
use crate::error::GitError;
use crate::models::{CommitId, SampleTime};

/// Memoizes first-commit lookups per repository name.
///
/// First commits do not change once a repository has history, so entries are
/// never evicted. Failed lookups are not cached.
pub struct CachedCommitResolver {
    inner: Arc<dyn CommitResolver>,
    first_commits: Mutex<HashMap<String, SampleTime>>,
}

impl CachedCommitResolver {
    pub fn new(inner: Arc<dyn CommitResolver>) -> Self {
        Self {
            inner,
            first_commits: Mutex::new(HashMap::new()),
        }
    }

    pub fn cached_len(&self) -> usize {
        self.first_commits.lock().len()
    }
}

#[async_trait]
impl CommitResolver for CachedCommitResolver {
    async fn first_commit_time(
        &self,
        cancel: &CancellationToken,
        repository: &str,
    ) -> Result<SampleTime, GitError> {
        let cached = self.first_commits.lock().get(repository).copied();
        if let Some(cached) = cached {
            debug!(repository, "first commit cache hit");
            return Ok(cached);
        }

        let first = self.inner.first_commit_time(cancel, repository).await?;
        self.first_commits.lock().insert(repository.to_string(), first);
        Ok(first)
    }

    async fn nearest_commit(
        &self,
        cancel: &CancellationToken,
        repository: &str,
        at: SampleTime,
    ) -> Result<Option<CommitId>, GitError> {
        self.inner.nearest_commit(cancel, repository, at).await
    }
}
