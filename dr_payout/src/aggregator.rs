use crate::series::IntervalSeries;
use chrono::{Duration, NaiveDateTime, Timelike};
use serde::Serialize;
use std::collections::BTreeMap;

/// Truncate a timestamp to the start of its hour.
///
/// Plain arithmetic on the wall-clock fields; timestamps are fixed-offset, so no
/// calendar or DST rules are involved.
pub fn floor_to_hour(timestamp: NaiveDateTime) -> NaiveDateTime {
    let into_hour = i64::from(timestamp.minute()) * 60 + i64::from(timestamp.second());
    timestamp - Duration::seconds(into_hour) - Duration::nanoseconds(i64::from(timestamp.nanosecond()))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourlyBucket {
    pub total_kwh: f64,
    /// Number of interval readings that contributed to `total_kwh`.
    pub intervals: usize,
}

/// Per-hour totals keyed by hour start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyAggregate {
    intervals_per_hour: usize,
    buckets: BTreeMap<NaiveDateTime, HourlyBucket>,
}

impl HourlyAggregate {
    pub fn get(&self, hour: NaiveDateTime) -> Option<f64> {
        self.buckets.get(&hour).map(|b| b.total_kwh)
    }

    pub fn bucket(&self, hour: NaiveDateTime) -> Option<&HourlyBucket> {
        self.buckets.get(&hour)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn hours(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.buckets.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDateTime, f64)> + '_ {
        self.buckets.iter().map(|(hour, b)| (*hour, b.total_kwh))
    }

    pub fn total(&self) -> f64 {
        self.buckets.values().map(|b| b.total_kwh).sum()
    }

    pub fn is_complete(&self, hour: NaiveDateTime) -> bool {
        self.buckets
            .get(&hour)
            .map_or(false, |b| b.intervals == self.intervals_per_hour)
    }

    /// Hours built from fewer readings than the cadence implies.
    pub fn partial_hours(&self) -> Vec<NaiveDateTime> {
        self.buckets
            .iter()
            .filter(|(_, b)| b.intervals < self.intervals_per_hour)
            .map(|(hour, _)| *hour)
            .collect()
    }
}

/// Reduces sub-hourly readings to hourly totals.
pub struct HourlyAggregator;

impl HourlyAggregator {
    /// Sum every reading into the bucket of its containing hour.
    ///
    /// Partial hours (series edges or gaps) are emitted with whatever readings are
    /// present; nothing is interpolated.
    pub fn aggregate(series: &IntervalSeries) -> HourlyAggregate {
        let mut buckets: BTreeMap<NaiveDateTime, HourlyBucket> = BTreeMap::new();

        for (timestamp, value) in series.iter() {
            let bucket = buckets.entry(floor_to_hour(timestamp)).or_insert(HourlyBucket {
                total_kwh: 0.0,
                intervals: 0,
            });
            bucket.total_kwh += value;
            bucket.intervals += 1;
        }

        HourlyAggregate {
            intervals_per_hour: series.intervals_per_hour(),
            buckets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 6, 14)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_floor_to_hour() {
        assert_eq!(floor_to_hour(at(14, 45)), at(14, 0));
        assert_eq!(floor_to_hour(at(14, 0)), at(14, 0));

        let with_seconds = NaiveDate::from_ymd_opt(2022, 6, 14)
            .unwrap()
            .and_hms_milli_opt(23, 59, 59, 500)
            .unwrap();
        assert_eq!(floor_to_hour(with_seconds), at(23, 0));
    }

    #[test]
    fn test_total_is_conserved() {
        // three whole hours of 15-minute readings
        let readings: Vec<_> = (0..12u32)
            .map(|i| (at(14 + i / 4, (i % 4) * 15), 10.0 + i as f64 * 1.5))
            .collect();
        let series = IntervalSeries::new(15, readings).unwrap();

        let hourly = HourlyAggregator::aggregate(&series);
        assert_eq!(hourly.len(), 3);
        assert!((hourly.total() - series.total()).abs() < 1e-9);
        assert!(hourly.partial_hours().is_empty());
        assert_eq!(hourly.get(at(14, 0)), Some(10.0 + 11.5 + 13.0 + 14.5));
    }

    #[test]
    fn test_partial_hours_are_kept() {
        let series = IntervalSeries::new(
            15,
            vec![(at(13, 45), 2.0), (at(14, 0), 1.0), (at(14, 15), 1.0), (at(14, 30), 1.0), (at(14, 45), 1.0)],
        )
        .unwrap();

        let hourly = HourlyAggregator::aggregate(&series);
        assert_eq!(hourly.get(at(13, 0)), Some(2.0));
        assert!(!hourly.is_complete(at(13, 0)));
        assert!(hourly.is_complete(at(14, 0)));
        assert_eq!(hourly.partial_hours(), vec![at(13, 0)]);
        assert_eq!(hourly.bucket(at(13, 0)).map(|b| b.intervals), Some(1));
    }

    #[test]
    fn test_empty_series() {
        let series = IntervalSeries::new(15, vec![]).unwrap();
        let hourly = HourlyAggregator::aggregate(&series);
        assert!(hourly.is_empty());
        assert_eq!(hourly.get(at(14, 0)), None);
    }
}
