use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type SampleTime = DateTime<Utc>;
pub type RepoId = i64;
pub type CommitId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepoId,
    pub name: String,
}

/// One sampled instant that needs a real backend query.
///
/// `shared_recordings` are other sample times whose value is defined to be
/// equal to this execution's value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub recording_time: SampleTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<CommitId>,
    #[serde(default)]
    pub shared_recordings: Vec<SampleTime>,
}

impl Execution {
    pub fn at(recording_time: SampleTime) -> Self {
        Self {
            recording_time,
            revision: None,
            shared_recordings: Vec::new(),
        }
    }

    /// The recording time followed by every shared recording.
    pub fn all_times(&self) -> impl Iterator<Item = SampleTime> + '_ {
        std::iter::once(self.recording_time).chain(self.shared_recordings.iter().copied())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub executions: Vec<Execution>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedResult {
    pub value: String,
    pub count: u64,
}

impl GroupedResult {
    pub fn new(value: impl Into<String>, count: u64) -> Self {
        Self {
            value: value.into(),
            count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeDataPoint {
    pub time: SampleTime,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedTimeSeries {
    pub label: String,
    pub series_id: String,
    pub points: Vec<TimeDataPoint>,
}

/// Diagnostics every search variant carries next to its payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDiagnostics {
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub alerts: Vec<String>,
    #[serde(default)]
    pub skipped_reasons: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedSearchResponse {
    #[serde(default)]
    pub groups: Vec<GroupedResult>,
    #[serde(flatten)]
    pub diagnostics: SearchDiagnostics,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountSearchResponse {
    #[serde(default)]
    pub total: u64,
    #[serde(flatten)]
    pub diagnostics: SearchDiagnostics,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoListResponse {
    #[serde(default)]
    pub repositories: Vec<Repository>,
    #[serde(flatten)]
    pub diagnostics: SearchDiagnostics,
}
