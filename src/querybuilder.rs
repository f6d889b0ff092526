//! Query rewriting for pinning a user query to one repository.
//!
//! The orchestrators only depend on the [`QueryRewriter`] contract; this is the
//! rewriter used when the caller does not inject its own.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::collaborators::QueryRewriter;
use crate::{InsightsError, Result};

/// Large enough that historical searches are never truncated by the backend.
pub const MAX_RESULT_COUNT: u64 = 99_999_999;

const KNOWN_FIELDS: &[&str] = &[
    "after", "archived", "author", "before", "case", "committer", "content", "context", "count",
    "file", "fork", "lang", "message", "patterntype", "repo", "repohasfile", "rev", "select",
    "timeout", "type", "visibility",
];

/// Dimension the compute-grouping strategy groups matches by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Lang,
    Repo,
    Path,
    Author,
    Date,
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GroupBy::Lang => "lang",
            GroupBy::Repo => "repo",
            GroupBy::Path => "path",
            GroupBy::Author => "author",
            GroupBy::Date => "date",
        };
        f.write_str(name)
    }
}

impl FromStr for GroupBy {
    type Err = InsightsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lang" => Ok(GroupBy::Lang),
            "repo" => Ok(GroupBy::Repo),
            "path" => Ok(GroupBy::Path),
            "author" => Ok(GroupBy::Author),
            "date" => Ok(GroupBy::Date),
            _ => Err(InsightsError::InvalidGroupBy(s.to_string())),
        }
    }
}

/// Parameter defaults applied to insight queries. Historical searches scoped to
/// a specific repository include forks and archived repositories.
pub fn code_insights_query_defaults(all_repos: bool) -> Vec<(&'static str, &'static str)> {
    let value = if all_repos { "no" } else { "yes" };
    vec![("fork", value), ("archived", value)]
}

/// Escapes regex metacharacters so a repository name matches literally.
pub fn quote_meta(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn field_of(token: &str) -> Option<&str> {
    let (field, _) = token.split_once(':')?;
    let field = field.strip_prefix('-').unwrap_or(field);
    let field = field.to_ascii_lowercase();
    KNOWN_FIELDS
        .iter()
        .find(|known| **known == field)
        .copied()
}

/// Splits `query` on whitespace, keeping `"..."`, `'...'` and `/.../` runs
/// (including a `field:` prefix glued to them) together as one token.
fn tokenize(query: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    let mut delimiter: Option<char> = None;
    let mut escaped = false;
    let mut prev: Option<char> = None;

    for (i, c) in query.char_indices() {
        if let Some(open) = delimiter {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                delimiter = None;
            }
        } else if c.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push(&query[s..i]);
            }
        } else {
            let at_token_start = start.is_none();
            if at_token_start {
                start = Some(i);
            }
            if matches!(c, '"' | '\'' | '/') && (at_token_start || prev == Some(':')) {
                delimiter = Some(c);
            }
        }
        prev = Some(c);
    }
    if let Some(s) = start {
        tokens.push(&query[s..]);
    }
    tokens
}

fn has_field(query: &str, field: &str) -> bool {
    tokenize(query).into_iter().any(|token| field_of(token) == Some(field))
}

/// Prepends each default whose field the query does not already set.
pub fn with_defaults(query: &str, defaults: &[(&str, &str)]) -> String {
    let mut parts: Vec<String> = defaults
        .iter()
        .filter(|(field, _)| !has_field(query, field))
        .map(|(field, value)| format!("{}:{}", field, value))
        .collect();
    parts.push(query.to_string());
    parts.join(" ")
}

fn repo_filter(repository: &str, revision: Option<&str>) -> String {
    match revision {
        Some(rev) => format!("repo:^({})$@{}", quote_meta(repository), rev),
        None => format!("repo:^({})$", quote_meta(repository)),
    }
}

/// `query` scoped to exactly one repository at one revision, unindexed.
pub fn single_repo_query(query: &str, repository: &str, revision: &str) -> Result<String> {
    let query = query.trim();
    if query.is_empty() {
        return Err(InsightsError::QueryRewrite {
            repository: repository.to_string(),
            revision: Some(revision.to_string()),
            message: "query is empty".to_string(),
        });
    }
    let scoped = if has_field(query, "count") {
        format!("{} {}", query, repo_filter(repository, Some(revision)))
    } else {
        format!(
            "count:{} {} {}",
            MAX_RESULT_COUNT,
            query,
            repo_filter(repository, Some(revision))
        )
    };
    Ok(with_defaults(&scoped, &code_insights_query_defaults(false)))
}

/// `query` scoped to one repository at its indexed head.
pub fn single_repo_query_indexed(query: &str, repository: &str) -> Result<String> {
    let query = query.trim();
    if query.is_empty() {
        return Err(InsightsError::QueryRewrite {
            repository: repository.to_string(),
            revision: None,
            message: "query is empty".to_string(),
        });
    }
    let scoped = format!("{} {}", query, repo_filter(repository, None));
    Ok(with_defaults(&scoped, &code_insights_query_defaults(false)))
}

/// Turns the pattern part of `query` into a compute `output.extra` command
/// grouping matches by `group_by`. Parameters keep their relative order ahead
/// of the command; the value of a `content:` field counts as pattern.
pub fn compute_insight_command_query(query: &str, group_by: GroupBy) -> Result<String> {
    let mut params = Vec::new();
    let mut pattern = Vec::new();
    for token in tokenize(query) {
        match field_of(token) {
            Some("content") if !token.starts_with('-') => {
                if let Some((_, value)) = token.split_once(':') {
                    pattern.push(value);
                }
            }
            Some(_) => params.push(token),
            None => pattern.push(token),
        }
    }
    pattern.retain(|token| !token.is_empty());
    if pattern.is_empty() {
        return Err(InsightsError::QueryRewrite {
            repository: String::new(),
            revision: None,
            message: format!("query {:?} has no search pattern", query),
        });
    }
    let command = format!("content:output.extra({} -> ${})", pattern.join(" "), group_by);
    if params.is_empty() {
        Ok(command)
    } else {
        Ok(format!("{} {}", params.join(" "), command))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultQueryRewriter;

impl QueryRewriter for DefaultQueryRewriter {
    fn pin_to_commit(&self, query: &str, repository: &str, revision: &str) -> Result<String> {
        single_repo_query(query, repository, revision)
    }

    fn grouped(&self, query: &str, repository: &str, group_by: GroupBy) -> Result<String> {
        let scoped = single_repo_query_indexed(query, repository)?;
        compute_insight_command_query(&scoped, group_by).map_err(|err| match err {
            InsightsError::QueryRewrite { revision, message, .. } => InsightsError::QueryRewrite {
                repository: repository.to_string(),
                revision,
                message,
            },
            other => other,
        })
    }
}
