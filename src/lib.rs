pub mod assembler;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod executor;
pub mod fixture;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod pivot;
pub mod querybuilder;
pub mod timeseries;

pub use config::EngineConfig;
pub use error::{GitError, InsightsError, Result};
pub use executor::{
    CaptureGroupExecutor, ComputeExecutor, ExecutorContext, RepoListExecutor,
    StreamingCountExecutor,
};
pub use models::{GeneratedTimeSeries, GroupedResult, TimeDataPoint};
pub use querybuilder::GroupBy;
pub use timeseries::{IntervalUnit, TimeInterval};
