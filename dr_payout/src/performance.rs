use crate::aggregator::{HourlyAggregate, HourlyAggregator};
use crate::baseline::Baseline;
use crate::error::{PayoutError, Result};
use crate::models::EventWindow;
use crate::series::IntervalSeries;
use chrono::NaiveDateTime;
use log::warn;
use serde::Serialize;
use std::collections::BTreeMap;

/// Curtailment per event hour (baseline minus actual) and its mean.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    hourly: BTreeMap<NaiveDateTime, f64>,
    average: f64,
}

impl PerformanceReport {
    pub fn get(&self, hour: NaiveDateTime) -> Option<f64> {
        self.hourly.get(&hour).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDateTime, f64)> + '_ {
        self.hourly.iter().map(|(hour, value)| (*hour, *value))
    }

    pub fn len(&self) -> usize {
        self.hourly.len()
    }

    pub fn average(&self) -> f64 {
        self.average
    }
}

pub struct PerformanceEvaluator {
    event: EventWindow,
}

impl PerformanceEvaluator {
    pub fn new(event: EventWindow) -> Self {
        Self { event }
    }

    /// Slice `series` to the event, aggregate hourly and evaluate.
    pub fn evaluate_series(&self, series: &IntervalSeries, baseline: &Baseline) -> Result<PerformanceReport> {
        let event_readings = series.slice(self.event.start(), self.event.end());
        self.evaluate(&HourlyAggregator::aggregate(&event_readings), baseline)
    }

    /// Positive values mean the site consumed less than its baseline.
    ///
    /// Actual hours, and hourly baselines, must match the event hours exactly.
    pub fn evaluate(&self, actual: &HourlyAggregate, baseline: &Baseline) -> Result<PerformanceReport> {
        let event_hours = self.event.hours();

        if let Some(extra) = actual.hours().find(|hour| !self.event.contains(*hour)) {
            return Err(PayoutError::DataAlignment {
                hour: extra,
                reason: "actual consumption outside the event window".to_string(),
            });
        }
        if let Baseline::Hourly(series) = baseline {
            if let Some(extra) = series.hours().find(|hour| !self.event.contains(*hour)) {
                return Err(PayoutError::DataAlignment {
                    hour: extra,
                    reason: "baseline hour outside the event window".to_string(),
                });
            }
        }

        let mut hourly = BTreeMap::new();
        for hour in &event_hours {
            let used = actual.get(*hour).ok_or_else(|| PayoutError::DataAlignment {
                hour: *hour,
                reason: "no interval data for event hour".to_string(),
            })?;
            let expected = baseline
                .expected_at(*hour)
                .ok_or_else(|| PayoutError::DataAlignment {
                    hour: *hour,
                    reason: "no baseline for event hour".to_string(),
                })?;

            if !actual.is_complete(*hour) {
                warn!("Event hour {} is missing interval readings", hour);
            }

            hourly.insert(*hour, expected - used);
        }

        if hourly.is_empty() {
            return Err(PayoutError::EmptyAggregation(
                "event window has no hours".to_string(),
            ));
        }

        let average = hourly.values().sum::<f64>() / hourly.len() as f64;
        Ok(PerformanceReport { hourly, average })
    }
}
