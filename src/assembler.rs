use crate::models::{GeneratedTimeSeries, SampleTime, TimeDataPoint};
use crate::pivot::{FlatAccumulator, PivotAccumulator, PointAccumulator};

pub const DYNAMIC_SERIES_PREFIX: &str = "dynamic-series";
pub const CAPTURED_SERIES_PREFIX: &str = "captured-series";

fn series_id(prefix: &str, n: usize) -> String {
    format!("{}-{}", prefix, n)
}

/// One series per label, ids `dynamic-series-<n>` in label order starting at 1.
pub fn assemble_dynamic(pivot: PivotAccumulator) -> Vec<GeneratedTimeSeries> {
    pivot
        .into_series()
        .into_iter()
        .enumerate()
        .map(|(i, (label, points))| GeneratedTimeSeries {
            label,
            series_id: series_id(DYNAMIC_SERIES_PREFIX, i + 1),
            points,
        })
        .collect()
}

/// Single-point series ranked by count descending and cut to `limit`.
///
/// Ids are assigned before ranking, so they reflect generation order rather
/// than rank. The sort is stable: equal counts keep generation order.
pub fn assemble_ranked(totals: FlatAccumulator, now: SampleTime, limit: usize) -> Vec<GeneratedTimeSeries> {
    let mut series: Vec<GeneratedTimeSeries> = totals
        .into_totals()
        .into_iter()
        .enumerate()
        .map(|(i, (label, count))| GeneratedTimeSeries {
            label,
            series_id: series_id(CAPTURED_SERIES_PREFIX, i + 1),
            points: vec![TimeDataPoint { time: now, count }],
        })
        .collect();

    series.sort_by(|a, b| head_count(b).cmp(&head_count(a)));
    series.truncate(limit.min(series.len()));
    series
}

fn head_count(series: &GeneratedTimeSeries) -> u64 {
    series.points.first().map(|p| p.count).unwrap_or(0)
}

pub fn assemble_single(label: &str, series_id: &str, points: PointAccumulator) -> GeneratedTimeSeries {
    GeneratedTimeSeries {
        label: label.to_string(),
        series_id: series_id.to_string(),
        points: points.into_points(),
    }
}
