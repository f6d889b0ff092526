use std::fmt;
use std::str::FromStr;

use chrono::{Duration, Months};
use serde::{Deserialize, Serialize};

use crate::models::SampleTime;
use crate::{InsightsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl FromStr for IntervalUnit {
    type Err = InsightsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().trim_end_matches('s') {
            "hour" => Ok(IntervalUnit::Hour),
            "day" => Ok(IntervalUnit::Day),
            "week" => Ok(IntervalUnit::Week),
            "month" => Ok(IntervalUnit::Month),
            "year" => Ok(IntervalUnit::Year),
            other => Err(InsightsError::InvalidInterval(format!("unknown unit {:?}", other))),
        }
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IntervalUnit::Hour => "hour",
            IntervalUnit::Day => "day",
            IntervalUnit::Week => "week",
            IntervalUnit::Month => "month",
            IntervalUnit::Year => "year",
        };
        f.write_str(name)
    }
}

/// Distance between two consecutive sample times, e.g. "2 weeks".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub unit: IntervalUnit,
    pub value: u32,
}

impl TimeInterval {
    pub fn new(unit: IntervalUnit, value: u32) -> Result<Self> {
        if value == 0 {
            return Err(InsightsError::InvalidInterval(
                "interval value must be greater than zero".to_string(),
            ));
        }
        Ok(Self { unit, value })
    }

    /// `from` moved back by `steps` whole intervals.
    fn steps_back(&self, from: SampleTime, steps: u32) -> Result<SampleTime> {
        let out_of_range = || InsightsError::InvalidInterval(format!("{} x {} is out of range", steps, self));
        let count = self.value.checked_mul(steps).ok_or_else(out_of_range)?;
        let stepped = match self.unit {
            IntervalUnit::Hour => from.checked_sub_signed(Duration::hours(count.into())),
            IntervalUnit::Day => from.checked_sub_signed(Duration::days(count.into())),
            IntervalUnit::Week => from.checked_sub_signed(Duration::weeks(count.into())),
            IntervalUnit::Month => from.checked_sub_months(Months::new(count)),
            IntervalUnit::Year => count
                .checked_mul(12)
                .and_then(|months| from.checked_sub_months(Months::new(months))),
        };
        stepped.ok_or_else(out_of_range)
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

impl FromStr for TimeInterval {
    type Err = InsightsError;

    /// Accepts "month", "1 month" or "3 days".
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        match parts.as_slice() {
            [unit] => TimeInterval::new(unit.parse()?, 1),
            [value, unit] => {
                let value = value
                    .parse()
                    .map_err(|_| InsightsError::InvalidInterval(format!("bad interval value {:?}", value)))?;
                TimeInterval::new(unit.parse()?, value)
            }
            _ => Err(InsightsError::InvalidInterval(format!("cannot parse {:?}", s))),
        }
    }
}

/// Returns `points` sample times ending at `now`, oldest first, spaced by `interval`.
///
/// Every sample is measured from `now`, so month-end anchors do not drift.
pub fn sample_times(interval: TimeInterval, now: SampleTime, points: usize) -> Result<Vec<SampleTime>> {
    let points = u32::try_from(points)
        .map_err(|_| InsightsError::InvalidInterval(format!("too many sample points: {}", points)))?;
    (0..points)
        .rev()
        .map(|steps| interval.steps_back(now, steps))
        .collect()
}
