use std::env;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use insights_engine::{
    collaborators::CachedCommitResolver,
    fixture::Fixture,
    logging::{self, LogFormat},
    CaptureGroupExecutor, ComputeExecutor, EngineConfig, ExecutorContext, GroupBy, InsightsError,
    RepoListExecutor, Result, StreamingCountExecutor, TimeInterval,
};

#[tokio::main]
async fn main() {
    // Initialize logging
    let format = LogFormat::from_name(&env::var("INSIGHTS_LOG_FORMAT").unwrap_or_default());
    if let Err(e) = logging::init_logger(&["insights_engine", "insights_replay"], format) {
        eprintln!("{}", e);
    }

    if let Err(e) = run().await {
        error!(error = %e, "replay failed");
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| InsightsError::Config(format!("{} must be set", key)))
}

fn repositories_from_env() -> Vec<String> {
    env::var("INSIGHTS_REPOS")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

async fn run() -> Result<()> {
    let fixture_path = required("INSIGHTS_FIXTURE")?;
    let query = required("INSIGHTS_QUERY")?;
    let strategy = env::var("INSIGHTS_STRATEGY").unwrap_or_else(|_| "capture".to_string());
    let repositories = repositories_from_env();
    let config = EngineConfig::from_env()?;

    let fixture = Arc::new(Fixture::load(&fixture_path)?);
    let mut ctx = ExecutorContext::new(
        fixture.clone(),
        Arc::new(CachedCommitResolver::new(fixture.clone())),
    )
    .with_config(config);

    // Pin "now" so a replay matches the recording
    if let Ok(raw) = env::var("INSIGHTS_NOW") {
        let now: DateTime<Utc> = DateTime::parse_from_rfc3339(&raw)
            .map_err(|e| InsightsError::Config(format!("INSIGHTS_NOW: {}", e)))?
            .with_timezone(&Utc);
        ctx = ctx.with_clock(Arc::new(move || now));
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    info!(strategy = %strategy, repositories = repositories.len(), fixture = %fixture_path, "starting replay");

    let output = match strategy.as_str() {
        "capture" => {
            let interval = interval_from_env()?;
            let series = CaptureGroupExecutor::new(ctx, fixture)
                .execute(&cancel, &query, &repositories, interval)
                .await?;
            serde_json::to_string_pretty(&series)?
        }
        "count" => {
            let interval = interval_from_env()?;
            let label = env::var("INSIGHTS_SERIES_LABEL").unwrap_or_else(|_| query.clone());
            let series_id =
                env::var("INSIGHTS_SERIES_ID").unwrap_or_else(|_| "replay-series".to_string());
            let series = StreamingCountExecutor::new(ctx, fixture)
                .execute(&cancel, &query, &label, &series_id, &repositories, interval)
                .await?;
            serde_json::to_string_pretty(&series)?
        }
        "compute" => {
            let group_by: GroupBy = env::var("INSIGHTS_GROUP_BY")
                .unwrap_or_else(|_| "lang".to_string())
                .parse()?;
            let series = ComputeExecutor::new(ctx, fixture)
                .execute(&cancel, &query, group_by, &repositories)
                .await?;
            serde_json::to_string_pretty(&series)?
        }
        "repos" => {
            let repos = RepoListExecutor::new(fixture)
                .execute_repo_list(&cancel, &query)
                .await?;
            serde_json::to_string_pretty(&repos)?
        }
        other => {
            return Err(InsightsError::Config(format!(
                "INSIGHTS_STRATEGY must be capture, count, compute or repos, got {:?}",
                other
            )))
        }
    };

    println!("{}", output);
    Ok(())
}

fn interval_from_env() -> Result<TimeInterval> {
    env::var("INSIGHTS_INTERVAL")
        .unwrap_or_else(|_| "1 month".to_string())
        .parse()
}
