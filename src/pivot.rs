//! Accumulators that turn per-sample results into per-label series.
//!
//! Label order is the order labels are first folded in, which pins series id
//! assignment for identical inputs.

use std::collections::{BTreeMap, HashMap};

use crate::models::{Execution, GroupedResult, SampleTime, TimeDataPoint};

/// `timestamp -> count` for a single series. Counts are summed on collision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointAccumulator {
    points: BTreeMap<SampleTime, u64>,
}

impl PointAccumulator {
    pub fn add(&mut self, time: SampleTime, count: u64) {
        *self.points.entry(time).or_insert(0) += count;
    }

    /// Adds `count` at the execution's recording time and every shared recording.
    pub fn add_execution(&mut self, execution: &Execution, count: u64) {
        for time in execution.all_times() {
            self.add(time, count);
        }
    }

    pub fn total(&self) -> u64 {
        self.points.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points in ascending time order.
    pub fn into_points(self) -> Vec<TimeDataPoint> {
        self.points
            .into_iter()
            .map(|(time, count)| TimeDataPoint { time, count })
            .collect()
    }
}

/// The sparse `label -> (timestamp -> count)` matrix.
#[derive(Debug, Clone, Default)]
pub struct PivotAccumulator {
    order: Vec<String>,
    series: HashMap<String, PointAccumulator>,
}

impl PivotAccumulator {
    pub fn add(&mut self, label: &str, time: SampleTime, count: u64) {
        self.series_mut(label).add(time, count);
    }

    pub fn add_execution(&mut self, execution: &Execution, result: &GroupedResult) {
        self.series_mut(&result.value).add_execution(execution, result.count);
    }

    fn series_mut(&mut self, label: &str) -> &mut PointAccumulator {
        if !self.series.contains_key(label) {
            self.order.push(label.to_string());
        }
        self.series.entry(label.to_string()).or_default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn total(&self, label: &str) -> u64 {
        self.series.get(label).map(PointAccumulator::total).unwrap_or(0)
    }

    /// Drains the matrix into `(label, points)` pairs in first-seen label order.
    pub fn into_series(mut self) -> Vec<(String, Vec<TimeDataPoint>)> {
        self.order
            .into_iter()
            .map(|label| {
                let points = self
                    .series
                    .remove(&label)
                    .map(PointAccumulator::into_points)
                    .unwrap_or_default();
                (label, points)
            })
            .collect()
    }
}

/// `label -> total` with no time dimension, used by compute grouping.
#[derive(Debug, Clone, Default)]
pub struct FlatAccumulator {
    order: Vec<String>,
    totals: HashMap<String, u64>,
}

impl FlatAccumulator {
    pub fn add(&mut self, result: &GroupedResult) {
        match self.totals.get_mut(&result.value) {
            Some(total) => *total += result.count,
            None => {
                self.order.push(result.value.clone());
                self.totals.insert(result.value.clone(), result.count);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn into_totals(mut self) -> Vec<(String, u64)> {
        self.order
            .into_iter()
            .map(|label| {
                let total = self.totals.remove(&label).unwrap_or(0);
                (label, total)
            })
            .collect()
    }
}

/// Sorts grouped results by value so folding order does not depend on the backend.
pub fn sort_by_value(groups: &mut [GroupedResult]) {
    groups.sort_by(|a, b| a.value.cmp(&b.value));
}
