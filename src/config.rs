use std::env;
use std::str::FromStr;

use crate::{InsightsError, Result};

pub const DEFAULT_SAMPLE_POINTS: usize = 7;
pub const DEFAULT_MAX_GROUPED_SERIES: usize = 20;

/// Tunables shared by every orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of historical sample times per insight.
    pub sample_points: usize,
    /// Upper bound on series returned by compute grouping.
    pub max_grouped_series: usize,
    /// Repositories sampled concurrently. 1 keeps the strictly sequential model.
    pub repo_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_points: DEFAULT_SAMPLE_POINTS,
            max_grouped_series: DEFAULT_MAX_GROUPED_SERIES,
            repo_concurrency: 1,
        }
    }
}

impl EngineConfig {
    /// Reads overrides from `INSIGHTS_SAMPLE_POINTS`, `INSIGHTS_MAX_GROUPED_SERIES`
    /// and `INSIGHTS_REPO_CONCURRENCY`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            sample_points: read_positive(&lookup, "INSIGHTS_SAMPLE_POINTS", defaults.sample_points)?,
            max_grouped_series: read_positive(
                &lookup,
                "INSIGHTS_MAX_GROUPED_SERIES",
                defaults.max_grouped_series,
            )?,
            repo_concurrency: read_positive(
                &lookup,
                "INSIGHTS_REPO_CONCURRENCY",
                defaults.repo_concurrency,
            )?,
        };
        Ok(config)
    }
}

fn read_positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let value: T = raw
        .trim()
        .parse()
        .map_err(|_| InsightsError::Config(format!("{} must be a positive integer, got {:?}", key, raw)))?;
    if value <= T::default() {
        return Err(InsightsError::Config(format!("{} must be greater than zero", key)));
    }
    Ok(value)
}
