use crate::error::{PayoutError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use std::collections::BTreeMap;

/// Immutable, strictly increasing interval readings (kWh) on a fixed sub-hourly cadence.
///
/// Gaps are allowed and stay gaps: `get` returns `None` for a grid point without a
/// reading, which is never the same thing as a zero reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalSeries {
    cadence_minutes: u32,
    readings: BTreeMap<NaiveDateTime, f64>,
}

impl IntervalSeries {
    /// Build a series from readings already ordered by timestamp.
    pub fn new<I>(cadence_minutes: u32, readings: I) -> Result<Self>
    where
        I: IntoIterator<Item = (NaiveDateTime, f64)>,
    {
        if cadence_minutes == 0 || cadence_minutes > 60 || 60 % cadence_minutes != 0 {
            return Err(PayoutError::InvalidSeries(format!(
                "cadence of {} minutes does not evenly divide one hour",
                cadence_minutes
            )));
        }

        let mut map = BTreeMap::new();
        let mut previous: Option<NaiveDateTime> = None;

        for (timestamp, value) in readings {
            if let Some(prev) = previous {
                if timestamp <= prev {
                    return Err(PayoutError::InvalidSeries(format!(
                        "timestamp {} does not follow {}",
                        timestamp, prev
                    )));
                }
            }
            if !on_grid(timestamp, cadence_minutes) {
                return Err(PayoutError::InvalidSeries(format!(
                    "timestamp {} is off the {}-minute grid",
                    timestamp, cadence_minutes
                )));
            }
            if !value.is_finite() || value < 0.0 {
                return Err(PayoutError::InvalidSeries(format!(
                    "reading {} at {} is not a non-negative number",
                    value, timestamp
                )));
            }
            map.insert(timestamp, value);
            previous = Some(timestamp);
        }

        Ok(Self {
            cadence_minutes,
            readings: map,
        })
    }

    pub fn cadence_minutes(&self) -> u32 {
        self.cadence_minutes
    }

    pub fn cadence(&self) -> Duration {
        Duration::minutes(i64::from(self.cadence_minutes))
    }

    pub fn intervals_per_hour(&self) -> usize {
        (60 / self.cadence_minutes) as usize
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Reading at `timestamp`, or `None` if that interval is missing.
    pub fn get(&self, timestamp: NaiveDateTime) -> Option<f64> {
        self.readings.get(&timestamp).copied()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.readings.keys().next().copied()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.readings.keys().next_back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDateTime, f64)> + '_ {
        self.readings.iter().map(|(ts, value)| (*ts, *value))
    }

    pub fn total(&self) -> f64 {
        self.readings.values().sum()
    }

    /// New series holding the readings in `[start, end)`.
    pub fn slice(&self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        let readings = if start < end {
            self.readings
                .range(start..end)
                .map(|(ts, value)| (*ts, *value))
                .collect()
        } else {
            BTreeMap::new()
        };

        Self {
            cadence_minutes: self.cadence_minutes,
            readings,
        }
    }

    /// Readings of a single calendar day.
    pub fn slice_day(&self, date: NaiveDate) -> Self {
        let start = date.and_time(NaiveTime::MIN);
        self.slice(start, start + Duration::days(1))
    }

    /// Grid points in `[start, end)` that carry no reading.
    pub fn missing_intervals(&self, start: NaiveDateTime, end: NaiveDateTime) -> Vec<NaiveDateTime> {
        let step = self.cadence();
        let mut missing = Vec::new();
        let mut cursor = align_up(start, self.cadence_minutes);

        while cursor < end {
            if !self.readings.contains_key(&cursor) {
                missing.push(cursor);
            }
            cursor += step;
        }

        missing
    }
}

fn on_grid(timestamp: NaiveDateTime, cadence_minutes: u32) -> bool {
    timestamp.second() == 0 && timestamp.nanosecond() == 0 && timestamp.minute() % cadence_minutes == 0
}

fn align_up(timestamp: NaiveDateTime, cadence_minutes: u32) -> NaiveDateTime {
    if on_grid(timestamp, cadence_minutes) {
        return timestamp;
    }
    let truncated = timestamp
        - Duration::seconds(i64::from(timestamp.second()))
        - Duration::nanoseconds(i64::from(timestamp.nanosecond()));
    let into_slot = truncated.minute() % cadence_minutes;
    truncated + Duration::minutes(i64::from(cadence_minutes - into_slot))
}
