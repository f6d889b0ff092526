use thiserror::Error;

/// Conditions reported by the commit collaborator.
///
/// The first three variants are expected states during a backfill (a repository
/// that was never pushed, an empty one, a revision that is gone) and are treated
/// as skips by the orchestrators. `Backend` is a real failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GitError {
    #[error("repository is empty")]
    EmptyRepository,

    #[error("repository not found")]
    RepositoryNotFound,

    #[error("revision not found")]
    RevisionNotFound,

    #[error("git backend error: {0}")]
    Backend(String),
}

impl GitError {
    /// Whether the condition means "no data here" rather than a failure.
    pub fn is_skippable(&self) -> bool {
        !matches!(self, GitError::Backend(_))
    }
}

#[derive(Debug, Error)]
pub enum InsightsError {
    #[error("resolving repository {repository}: {message}")]
    RepoResolution { repository: String, message: String },

    #[error("commit lookup for {repository}: {source}")]
    CommitLookup {
        repository: String,
        #[source]
        source: GitError,
    },

    #[error("rewriting query for {repository}{}: {message}", revision_suffix(.revision))]
    QueryRewrite {
        repository: String,
        revision: Option<String>,
        message: String,
    },

    #[error("search failed for {repository}{}: {}", revision_suffix(.revision), .messages.join("; "))]
    Search {
        repository: String,
        revision: Option<String>,
        messages: Vec<String>,
    },

    /// The backend rejected the query itself; running it again cannot succeed.
    #[error("terminal search error for {repository}{}: {}", revision_suffix(.revision), .messages.join("; "))]
    TerminalSearch {
        repository: String,
        revision: Option<String>,
        messages: Vec<String>,
    },

    #[error("search alert for {repository}{}: {}", revision_suffix(.revision), .alerts.join("; "))]
    SearchAlert {
        repository: String,
        revision: Option<String>,
        alerts: Vec<String>,
    },

    #[error("invalid group by: {0}")]
    InvalidGroupBy(String),

    #[error("invalid time interval: {0}")]
    InvalidInterval(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("fixture error: {0}")]
    Fixture(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl InsightsError {
    /// Whether the caller's job queue may run the same work again.
    ///
    /// Backend and transport trouble is retryable; a rejected query, a bad
    /// argument or a cancellation is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            InsightsError::CommitLookup { source, .. } => !source.is_skippable(),
            InsightsError::RepoResolution { .. }
            | InsightsError::Search { .. }
            | InsightsError::SearchAlert { .. } => true,
            _ => false,
        }
    }
}

fn revision_suffix(revision: &Option<String>) -> String {
    match revision {
        Some(rev) => format!("@{}", rev),
        None => String::new(),
    }
}

impl From<serde_json::Error> for InsightsError {
    fn from(err: serde_json::Error) -> Self {
        InsightsError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InsightsError>;
