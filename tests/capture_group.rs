mod common;

use std::sync::Arc;

use chrono::Duration;
use pretty_assertions::assert_eq;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use common::*;
use insights_engine::models::{Execution, GroupedSearchResponse, Plan, SearchDiagnostics, TimeDataPoint};
use insights_engine::{
    CaptureGroupExecutor, EngineConfig, GroupedResult, InsightsError, IntervalUnit, TimeInterval,
};

fn monthly() -> TimeInterval {
    TimeInterval::new(IntervalUnit::Month, 1).unwrap()
}

fn groups(pairs: &[(&str, u64)]) -> GroupedSearchResponse {
    GroupedSearchResponse {
        groups: pairs.iter().map(|(v, c)| GroupedResult::new(*v, *c)).collect(),
        diagnostics: SearchDiagnostics::default(),
    }
}

#[test_log::test(tokio::test)]
async fn test_empty_repository_is_skipped() {
    let ctx = context(
        MockRepos::with(&[("A", 1), ("B", 2)]),
        MockGit::default()
            .with("A", long_history("c1"))
            .with("B", RepoHistory::Empty),
        3,
    );
    let search = Arc::new(MockSearch::new(|_| Ok(groups(&[("x", 2)]))));
    let executor = CaptureGroupExecutor::new(ctx, search.clone());

    let series = executor
        .execute(&CancellationToken::new(), "q", &names(&["A", "B"]), monthly())
        .await
        .unwrap();

    assert_eq!(series.len(), 1);
    assert_eq!(series[0].label, "x");
    assert_eq!(series[0].series_id, "dynamic-series-1");
    assert_eq!(
        series[0].points,
        vec![
            TimeDataPoint { time: months_ago(2), count: 2 },
            TimeDataPoint { time: months_ago(1), count: 2 },
            TimeDataPoint { time: now(), count: 2 },
        ]
    );
    assert!(search.recorded().iter().all(|q| q == "A@c1|q"));
    assert_eq!(search.recorded().len(), 3);
}

#[tokio::test]
async fn test_only_empty_repositories_yield_no_series() {
    let ctx = context(
        MockRepos::with(&[("B", 2)]),
        MockGit::default().with("B", RepoHistory::Empty),
        7,
    );
    let search = Arc::new(MockSearch::new(|_| Ok(groups(&[("x", 2)]))));
    let executor = CaptureGroupExecutor::new(ctx, search.clone());

    let series = assert_ok!(
        executor
            .execute(&CancellationToken::new(), "q", &names(&["B"]), monthly())
            .await
    );
    assert!(series.is_empty());
    assert!(search.recorded().is_empty());
}

#[tokio::test]
async fn test_samples_before_first_commit_are_dropped() {
    let first = months_ago(1) - Duration::days(1);
    let ctx = context(
        MockRepos::with(&[("A", 1)]),
        MockGit::default().with(
            "A",
            RepoHistory::Commits(vec![(first, "c1"), (now() - Duration::days(1), "c2")]),
        ),
        3,
    );
    let search = Arc::new(MockSearch::new(|q| match q {
        "A@c1|q" => Ok(groups(&[("x", 1)])),
        "A@c2|q" => Ok(groups(&[("x", 5)])),
        other => panic!("unexpected query {}", other),
    }));
    let executor = CaptureGroupExecutor::new(ctx, search);

    let series = executor
        .execute(&CancellationToken::new(), "q", &names(&["A"]), monthly())
        .await
        .unwrap();

    assert_eq!(
        series[0].points,
        vec![
            TimeDataPoint { time: months_ago(1), count: 1 },
            TimeDataPoint { time: now(), count: 5 },
        ]
    );
    assert!(series[0].points.iter().all(|p| p.time >= first));
}

#[tokio::test]
async fn test_shared_recordings_get_the_execution_value() {
    // The first commit falls between the two oldest samples. Only the recording
    // time is compared against it, so the oldest shared recording still gets a
    // value.
    let first = months_ago(2) + Duration::days(3);
    let plan = Plan {
        executions: vec![Execution {
            recording_time: now(),
            revision: None,
            shared_recordings: vec![months_ago(2), months_ago(1)],
        }],
    };
    let ctx = context(
        MockRepos::with(&[("A", 1)]),
        MockGit::default().with("A", RepoHistory::Commits(vec![(first, "c1")])),
        3,
    )
    .with_planner(Arc::new(FixedPlanner(plan)));
    let search = Arc::new(MockSearch::new(|_| Ok(groups(&[("x", 4)]))));
    let executor = CaptureGroupExecutor::new(ctx, search.clone());

    let series = executor
        .execute(&CancellationToken::new(), "q", &names(&["A"]), monthly())
        .await
        .unwrap();

    assert_eq!(search.recorded().len(), 1);
    let times: Vec<_> = series[0].points.iter().map(|p| p.time).collect();
    assert_eq!(times, vec![months_ago(2), months_ago(1), now()]);
    let total: u64 = series[0].points.iter().map(|p| p.count).sum();
    assert_eq!(total, 12);
}

#[tokio::test]
async fn test_labels_are_summed_across_repositories() {
    let ctx = context(
        MockRepos::with(&[("A", 1), ("B", 2)]),
        MockGit::default()
            .with("A", long_history("a1"))
            .with("B", long_history("b1")),
        2,
    );
    let search = Arc::new(MockSearch::new(|q| {
        if q.starts_with("A@") {
            Ok(groups(&[("b", 1), ("a", 2)]))
        } else {
            Ok(groups(&[("c", 1), ("a", 1)]))
        }
    }));
    let executor = CaptureGroupExecutor::new(ctx, search);

    let series = executor
        .execute(&CancellationToken::new(), "q", &names(&["A", "B"]), monthly())
        .await
        .unwrap();

    let summary: Vec<(String, String, Vec<u64>)> = series
        .iter()
        .map(|s| {
            (
                s.label.clone(),
                s.series_id.clone(),
                s.points.iter().map(|p| p.count).collect(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("a".to_string(), "dynamic-series-1".to_string(), vec![3, 3]),
            ("b".to_string(), "dynamic-series-2".to_string(), vec![1, 1]),
            ("c".to_string(), "dynamic-series-3".to_string(), vec![1, 1]),
        ]
    );
}

#[tokio::test]
async fn test_output_is_deterministic_across_runs_and_concurrency() {
    let repos = ["A", "B", "C", "D"];
    let run = |concurrency: usize| async move {
        let mut git = MockGit::default();
        for (i, repo) in repos.iter().enumerate() {
            git = git.with(repo, long_history(["a", "b", "c", "d"][i]));
        }
        let ctx = context(
            MockRepos::with(&[("A", 1), ("B", 2), ("C", 3), ("D", 4)]),
            git,
            5,
        )
        .with_config(EngineConfig {
            sample_points: 5,
            repo_concurrency: concurrency,
            ..EngineConfig::default()
        });
        let search = Arc::new(MockSearch::new(|q| {
            let repo = q.split('@').next().unwrap_or_default().to_string();
            Ok(groups(&[(repo.as_str(), 1), ("shared", 2)]))
        }));
        let series = CaptureGroupExecutor::new(ctx, search)
            .execute(&CancellationToken::new(), "q", &names(&repos), monthly())
            .await
            .unwrap();
        serde_json::to_string(&series).unwrap()
    };

    let first = run(1).await;
    assert_eq!(first, run(1).await);
    assert_eq!(first, run(4).await);
}

#[tokio::test]
async fn test_search_errors_fail_the_whole_call() {
    let ctx = context(
        MockRepos::with(&[("A", 1), ("B", 2)]),
        MockGit::default()
            .with("A", long_history("c1"))
            .with("B", long_history("c9")),
        3,
    );
    let search = Arc::new(MockSearch::new(|q| {
        if q.starts_with("B@") {
            Ok(GroupedSearchResponse {
                groups: vec![GroupedResult::new("x", 1)],
                diagnostics: SearchDiagnostics {
                    errors: vec!["regexp compile failed".to_string()],
                    ..SearchDiagnostics::default()
                },
            })
        } else {
            Ok(groups(&[("x", 1)]))
        }
    }));
    let executor = CaptureGroupExecutor::new(ctx, search);

    let err = executor
        .execute(&CancellationToken::new(), "q", &names(&["A", "B"]), monthly())
        .await
        .unwrap_err();

    match &err {
        InsightsError::Search { repository, revision, messages } => {
            assert_eq!(repository, "B");
            assert_eq!(revision.as_deref(), Some("c9"));
            assert_eq!(messages, &vec!["regexp compile failed".to_string()]);
        }
        other => panic!("expected search error, got {:?}", other),
    }
    assert!(err.to_string().contains("B@c9"));
}

#[tokio::test]
async fn test_rejected_query_is_terminal_and_other_errors_retryable() {
    let run = |errors: Vec<&'static str>| async move {
        let ctx = context(
            MockRepos::with(&[("A", 1)]),
            MockGit::default().with("A", long_history("c1")),
            2,
        );
        let search = Arc::new(MockSearch::new(move |_| {
            Ok(GroupedSearchResponse {
                groups: vec![],
                diagnostics: SearchDiagnostics {
                    errors: errors.iter().map(|e| e.to_string()).collect(),
                    ..SearchDiagnostics::default()
                },
            })
        }));
        CaptureGroupExecutor::new(ctx, search)
            .execute(&CancellationToken::new(), "q", &names(&["A"]), monthly())
            .await
            .unwrap_err()
    };

    let retryable = run(vec!["error event"]).await;
    assert!(matches!(retryable, InsightsError::Search { .. }));
    assert!(retryable.is_retryable());
    assert!(!retryable.to_string().contains("terminal"));

    let terminal = run(vec!["not terminal", "invalid query"]).await;
    match &terminal {
        InsightsError::TerminalSearch { repository, revision, messages } => {
            assert_eq!(repository, "A");
            assert_eq!(revision.as_deref(), Some("c1"));
            assert_eq!(messages.len(), 2);
        }
        other => panic!("expected terminal search error, got {:?}", other),
    }
    assert!(!terminal.is_retryable());
}

#[tokio::test]
async fn test_alerts_fail_but_skipped_reasons_do_not() {
    let git = || MockGit::default().with("A", long_history("c1"));
    let alerting = Arc::new(MockSearch::new(|_| {
        Ok(GroupedSearchResponse {
            groups: vec![],
            diagnostics: SearchDiagnostics {
                alerts: vec!["query too broad".to_string()],
                ..SearchDiagnostics::default()
            },
        })
    }));
    let err = CaptureGroupExecutor::new(context(MockRepos::with(&[("A", 1)]), git(), 2), alerting)
        .execute(&CancellationToken::new(), "q", &names(&["A"]), monthly())
        .await
        .unwrap_err();
    assert!(matches!(err, InsightsError::SearchAlert { .. }));

    let skipping = Arc::new(MockSearch::new(|_| {
        Ok(GroupedSearchResponse {
            groups: vec![GroupedResult::new("x", 1)],
            diagnostics: SearchDiagnostics {
                skipped_reasons: vec!["shard timeout".to_string()],
                ..SearchDiagnostics::default()
            },
        })
    }));
    let series = CaptureGroupExecutor::new(context(MockRepos::with(&[("A", 1)]), git(), 2), skipping)
        .execute(&CancellationToken::new(), "q", &names(&["A"]), monthly())
        .await
        .unwrap();
    assert_eq!(series.len(), 1);
}

#[tokio::test]
async fn test_search_call_failure_is_wrapped() {
    let ctx = context(
        MockRepos::with(&[("A", 1)]),
        MockGit::default().with("A", long_history("c1")),
        2,
    );
    let search = Arc::new(MockSearch::new(|_| {
        Err(InsightsError::Internal("connection reset".to_string()))
    }));
    let err = CaptureGroupExecutor::new(ctx, search)
        .execute(&CancellationToken::new(), "q", &names(&["A"]), monthly())
        .await
        .unwrap_err();

    assert!(matches!(err, InsightsError::Search { .. }));
    assert!(err.to_string().contains("connection reset"));
}

#[tokio::test]
async fn test_unknown_repository_aborts_before_searching() {
    let ctx = context(
        MockRepos::with(&[("A", 1)]),
        MockGit::default().with("A", long_history("c1")),
        2,
    );
    let search = Arc::new(MockSearch::new(|_| Ok(groups(&[("x", 1)]))));
    let err = CaptureGroupExecutor::new(ctx, search.clone())
        .execute(&CancellationToken::new(), "q", &names(&["A", "ghost"]), monthly())
        .await
        .unwrap_err();

    match err {
        InsightsError::RepoResolution { repository, .. } => assert_eq!(repository, "ghost"),
        other => panic!("expected resolution error, got {:?}", other),
    }
    assert!(search.recorded().is_empty());
}

#[tokio::test]
async fn test_commit_backend_failure_is_fatal() {
    let ctx = context(
        MockRepos::with(&[("A", 1)]),
        MockGit::default().with("A", RepoHistory::Broken("gitserver unavailable".to_string())),
        2,
    );
    let search = Arc::new(MockSearch::new(|_| Ok(groups(&[("x", 1)]))));
    let err = CaptureGroupExecutor::new(ctx, search)
        .execute(&CancellationToken::new(), "q", &names(&["A"]), monthly())
        .await
        .unwrap_err();

    assert!(matches!(err, InsightsError::CommitLookup { ref repository, .. } if repository == "A"));
}

#[tokio::test]
async fn test_rewrite_failure_carries_repository_and_commit() {
    let ctx = context(
        MockRepos::with(&[("A", 1)]),
        MockGit::default().with("A", long_history("c1")),
        2,
    );
    let search = Arc::new(MockSearch::new(|_| Ok(groups(&[("x", 1)]))));
    let err = CaptureGroupExecutor::new(ctx, search)
        .execute(&CancellationToken::new(), "", &names(&["A"]), monthly())
        .await
        .unwrap_err();

    match err {
        InsightsError::QueryRewrite { repository, revision, .. } => {
            assert_eq!(repository, "A");
            assert_eq!(revision.as_deref(), Some("c1"));
        }
        other => panic!("expected rewrite error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_planned_revision_mismatch_uses_resolved_commit() {
    let plan = Plan {
        executions: vec![Execution {
            recording_time: now(),
            revision: Some("stale".to_string()),
            shared_recordings: vec![],
        }],
    };
    let ctx = context(
        MockRepos::with(&[("A", 1)]),
        MockGit::default().with("A", long_history("fresh")),
        1,
    )
    .with_planner(Arc::new(FixedPlanner(plan)));
    let search = Arc::new(MockSearch::new(|_| Ok(groups(&[("x", 1)]))));
    CaptureGroupExecutor::new(ctx, search.clone())
        .execute(&CancellationToken::new(), "q", &names(&["A"]), monthly())
        .await
        .unwrap();

    assert_eq!(search.recorded(), vec!["A@fresh|q".to_string()]);
}

#[tokio::test]
async fn test_cancelled_token_aborts() {
    let ctx = context(
        MockRepos::with(&[("A", 1)]),
        MockGit::default().with("A", long_history("c1")),
        2,
    );
    let search = Arc::new(MockSearch::new(|_| Ok(groups(&[("x", 1)]))));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = CaptureGroupExecutor::new(ctx, search)
        .execute(&cancel, "q", &names(&["A"]), monthly())
        .await;
    assert!(matches!(assert_err!(result), InsightsError::Cancelled));
}

#[tokio::test]
async fn test_cancellation_interrupts_a_hanging_search() {
    let ctx = context(
        MockRepos::with(&[("A", 1)]),
        MockGit::default().with("A", long_history("c1")),
        2,
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let result = CaptureGroupExecutor::new(ctx, Arc::new(HangingSearch))
        .execute(&cancel, "q", &names(&["A"]), monthly())
        .await;
    assert!(matches!(result, Err(InsightsError::Cancelled)));
}
