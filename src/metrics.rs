use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec,
};
use std::time::Instant;

lazy_static! {
    // Orchestration metrics
    pub static ref EXECUTE_CALLS: IntCounterVec = register_int_counter_vec!(
        "insights_execute_calls_total",
        "Total number of orchestrator execute calls",
        &["strategy"]
    ).expect("insights_execute_calls_total registers once");

    pub static ref EXECUTE_DURATION: HistogramVec = register_histogram_vec!(
        "insights_execute_duration_seconds",
        "Duration of a full orchestrator execute call",
        &["strategy"],
        vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0]
    ).expect("insights_execute_duration_seconds registers once");

    // Search metrics
    pub static ref SEARCHES_RUN: IntCounterVec = register_int_counter_vec!(
        "insights_searches_total",
        "Total number of backend searches issued",
        &["strategy"]
    ).expect("insights_searches_total registers once");

    pub static ref SEARCH_FAILURES: IntCounterVec = register_int_counter_vec!(
        "insights_search_failures_total",
        "Searches that returned errors or alerts",
        &["strategy"]
    ).expect("insights_search_failures_total registers once");

    // Sampling metrics
    pub static ref SAMPLES_SKIPPED: IntCounterVec = register_int_counter_vec!(
        "insights_samples_skipped_total",
        "Repositories or executions skipped without error",
        &["reason"]
    ).expect("insights_samples_skipped_total registers once");

    pub static ref SERIES_EMITTED: IntCounterVec = register_int_counter_vec!(
        "insights_series_emitted_total",
        "Time series returned to callers",
        &["strategy"]
    ).expect("insights_series_emitted_total registers once");
}

/// Times one execute call; observes the duration when dropped.
pub struct ExecuteTimer {
    strategy: &'static str,
    start: Instant,
}

impl ExecuteTimer {
    pub fn new(strategy: &'static str) -> Self {
        EXECUTE_CALLS.with_label_values(&[strategy]).inc();
        Self {
            strategy,
            start: Instant::now(),
        }
    }
}

impl Drop for ExecuteTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        EXECUTE_DURATION
            .with_label_values(&[self.strategy])
            .observe(duration);
    }
}

pub fn record_search(strategy: &str) {
    SEARCHES_RUN.with_label_values(&[strategy]).inc();
}

pub fn record_search_failure(strategy: &str) {
    SEARCH_FAILURES.with_label_values(&[strategy]).inc();
}

pub fn record_skip(reason: &str) {
    SAMPLES_SKIPPED.with_label_values(&[reason]).inc();
}

pub fn record_series(strategy: &str, count: usize) {
    SERIES_EMITTED
        .with_label_values(&[strategy])
        .inc_by(count as u64);
}
