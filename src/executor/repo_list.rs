use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::collaborators::RepoListSearch;
use crate::executor::{cancellable, check_diagnostics, search_failure};
use crate::metrics::{self, ExecuteTimer};
use crate::models::Repository;
use crate::Result;

const STRATEGY: &str = "repo_list";
const TARGET: &str = "repository list";

/// Materializes the repositories a repo-search query matches.
pub struct RepoListExecutor {
    search: Arc<dyn RepoListSearch>,
}

impl RepoListExecutor {
    pub fn new(search: Arc<dyn RepoListSearch>) -> Self {
        Self { search }
    }

    /// Repositories in backend order, each ID at most once.
    pub async fn execute_repo_list(
        &self,
        cancel: &CancellationToken,
        query: &str,
    ) -> Result<Vec<Repository>> {
        let _timer = ExecuteTimer::new(STRATEGY);
        metrics::record_search(STRATEGY);
        let response = cancellable(cancel, self.search.search_repositories(cancel, query))
            .await?
            .map_err(|err| search_failure(STRATEGY, TARGET, None, err))?;
        check_diagnostics(STRATEGY, TARGET, None, &response.diagnostics)?;

        let mut seen = HashSet::new();
        let repositories: Vec<Repository> = response
            .repositories
            .into_iter()
            .filter(|repo| seen.insert(repo.id))
            .collect();
        debug!(query, repositories = repositories.len(), "resolved repository list");
        Ok(repositories)
    }
}
