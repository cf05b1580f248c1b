use crate::aggregator::HourlyAggregator;
use crate::error::{PayoutError, Result};
use crate::models::{BaselineConfig, EventWindow, ShortfallPolicy};
use crate::series::IntervalSeries;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeMap;

/// Expected consumption per event hour, keyed by absolute hour start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineSeries {
    values: BTreeMap<NaiveDateTime, f64>,
}

impl BaselineSeries {
    pub fn new(values: BTreeMap<NaiveDateTime, f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(PayoutError::EmptyAggregation(
                "baseline series has no hours".to_string(),
            ));
        }
        Ok(Self { values })
    }

    pub fn get(&self, hour: NaiveDateTime) -> Option<f64> {
        self.values.get(&hour).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn hours(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.values.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDateTime, f64)> + '_ {
        self.values.iter().map(|(hour, value)| (*hour, *value))
    }

    /// Average expected consumption across the event hours.
    pub fn mean(&self) -> f64 {
        self.values.values().sum::<f64>() / self.values.len() as f64
    }
}

/// A baseline the performance evaluator can consume, fixed or per hour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Baseline {
    /// Single value broadcast to every event hour.
    Fixed(f64),
    Hourly(BaselineSeries),
}

impl Baseline {
    pub fn expected_at(&self, hour: NaiveDateTime) -> Option<f64> {
        match self {
            Baseline::Fixed(value) => Some(*value),
            Baseline::Hourly(series) => series.get(hour),
        }
    }
}

impl From<BaselineSeries> for Baseline {
    fn from(series: BaselineSeries) -> Self {
        Baseline::Hourly(series)
    }
}

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub struct BaselineCalculator {
    config: BaselineConfig,
}

impl BaselineCalculator {
    pub fn new(config: BaselineConfig) -> Result<Self> {
        if config.lookback_days == 0 {
            return Err(PayoutError::InvalidBaseline(
                "lookback must cover at least one day".to_string(),
            ));
        }
        if let ShortfallPolicy::UseAvailable { min_days } = config.shortfall {
            if min_days == 0 || min_days > config.lookback_days {
                return Err(PayoutError::InvalidBaseline(format!(
                    "min_days must lie in 1..={}, got {}",
                    config.lookback_days, min_days
                )));
            }
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &BaselineConfig {
        &self.config
    }

    /// Pass an externally supplied baseline constant through unchanged.
    pub fn fixed(value: f64) -> Result<Baseline> {
        if !value.is_finite() || value < 0.0 {
            return Err(PayoutError::InvalidBaseline(format!(
                "fixed baseline {} is not a non-negative number",
                value
            )));
        }
        Ok(Baseline::Fixed(value))
    }

    /// The business days the 10-of-10 baseline draws from, most recent first.
    ///
    /// Weekends, the event day and configured exclusions never count.
    pub fn lookback_days(&self, event_date: NaiveDate) -> Vec<NaiveDate> {
        let mut days = Vec::with_capacity(self.config.lookback_days);
        let mut day = event_date;

        while days.len() < self.config.lookback_days {
            day = match day.pred_opt() {
                Some(previous) => previous,
                None => break,
            };
            if is_business_day(day) && !self.config.excluded_dates.contains(&day) {
                days.push(day);
            }
        }

        days
    }

    /// Mean of each event hour-of-day across the lookback business days.
    pub fn ten_of_ten(&self, history: &IntervalSeries, event: &EventWindow) -> Result<BaselineSeries> {
        let days: Vec<NaiveDate> = self
            .lookback_days(event.event_date())
            .into_iter()
            .filter(|day| is_business_day(*day))
            .collect();

        let mut samples: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        let mut days_with_data = 0;

        for day in &days {
            let hourly = HourlyAggregator::aggregate(&history.slice_day(*day));
            if hourly.is_empty() {
                debug!("No readings on lookback day {}", day);
                continue;
            }
            days_with_data += 1;

            let partial = hourly.partial_hours();
            if !partial.is_empty() {
                debug!("{} partial hours on lookback day {}", partial.len(), day);
            }

            for (hour, total) in hourly.iter() {
                samples.entry(hour.hour()).or_default().push(total);
            }
        }

        self.check_shortfall(event.event_date(), days_with_data)?;

        let mut values = BTreeMap::new();
        for hour in event.hours() {
            let hour_of_day = hour.hour();
            let hour_samples = samples.get(&hour_of_day).map(Vec::as_slice).unwrap_or(&[]);
            if hour_samples.is_empty() {
                return Err(PayoutError::EmptyAggregation(format!(
                    "no historical data for hour {:02}:00 in {} lookback days before {}",
                    hour_of_day,
                    days.len(),
                    event.event_date()
                )));
            }
            if hour_samples.len() < days_with_data {
                warn!(
                    "Hour {:02}:00 present on only {} of {} lookback days",
                    hour_of_day,
                    hour_samples.len(),
                    days_with_data
                );
            }

            let mean = hour_samples.iter().sum::<f64>() / hour_samples.len() as f64;
            values.insert(hour, mean);
        }

        debug!("10-of-10 baseline for {}: {:?}", event.event_date(), values);
        BaselineSeries::new(values)
    }

    fn check_shortfall(&self, event_date: NaiveDate, available: usize) -> Result<()> {
        let required = self.config.lookback_days;
        if available >= required {
            return Ok(());
        }

        match self.config.shortfall {
            ShortfallPolicy::UseAvailable { min_days } if available >= min_days => {
                warn!(
                    "Proceeding with {} of {} lookback days before {}",
                    available, required, event_date
                );
                Ok(())
            }
            ShortfallPolicy::UseAvailable { min_days } => Err(PayoutError::InsufficientHistory {
                event_date,
                required: min_days,
                available,
            }),
            ShortfallPolicy::Strict => Err(PayoutError::InsufficientHistory {
                event_date,
                required,
                available,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, date, quarter_hour_history};

    fn event() -> EventWindow {
        // Tuesday
        EventWindow::new(at(6, 14, 14, 0), at(6, 14, 17, 0)).unwrap()
    }

    fn calculator() -> BaselineCalculator {
        BaselineCalculator::new(BaselineConfig::default()).unwrap()
    }

    #[test]
    fn test_lookback_skips_weekends_and_event_day() {
        let days = calculator().lookback_days(date(6, 14));
        assert_eq!(days.len(), 10);
        assert_eq!(days[0], date(6, 13));
        assert_eq!(days[9], date(5, 31));
        assert!(days.iter().all(|d| is_business_day(*d)));
        assert!(!days.contains(&date(6, 14)));
    }

    #[test]
    fn test_constant_history() {
        let history = quarter_hour_history(date(5, 16), date(6, 14), |_, _| 1000.0);
        let baseline = calculator().ten_of_ten(&history, &event()).unwrap();

        assert_eq!(baseline.len(), 3);
        for hour in [14, 15, 16] {
            assert_eq!(baseline.get(at(6, 14, hour, 0)), Some(1000.0));
        }
        assert_eq!(baseline.mean(), 1000.0);
    }

    #[test]
    fn test_weekend_outliers_are_ignored() {
        let clean = quarter_hour_history(date(5, 16), date(6, 14), |_, _| 1000.0);
        let noisy = quarter_hour_history(date(5, 16), date(6, 14), |day, _| {
            if is_business_day(day) {
                1000.0
            } else {
                1_000_000.0
            }
        });

        let calc = calculator();
        assert_eq!(
            calc.ten_of_ten(&clean, &event()).unwrap(),
            calc.ten_of_ten(&noisy, &event()).unwrap()
        );
    }

    #[test]
    fn test_only_recent_days_and_not_event_day() {
        // days before May 31 and the event day itself carry outliers
        let history = quarter_hour_history(date(5, 2), date(6, 14), |day, _| {
            if day < date(5, 31) || day == date(6, 14) {
                9999.0
            } else {
                400.0
            }
        });

        let baseline = calculator().ten_of_ten(&history, &event()).unwrap();
        assert_eq!(baseline.mean(), 400.0);
    }

    #[test]
    fn test_mean_per_hour_of_day() {
        // hour value rises by 10 per lookback day; the mean of 10 consecutive
        // weekday offsets lands at the middle
        let days = calculator().lookback_days(date(6, 14));
        let history = quarter_hour_history(date(5, 16), date(6, 14), |day, hour| {
            let rank = days.iter().position(|d| *d == day).unwrap_or(0) as f64;
            f64::from(hour) * 100.0 + rank * 10.0
        });

        let baseline = calculator().ten_of_ten(&history, &event()).unwrap();
        assert!((baseline.get(at(6, 14, 14, 0)).unwrap() - 1445.0).abs() < 1e-9);
        assert!((baseline.get(at(6, 14, 16, 0)).unwrap() - 1645.0).abs() < 1e-9);
    }

    #[test]
    fn test_is_deterministic() {
        let history = quarter_hour_history(date(5, 16), date(6, 14), |day, hour| {
            f64::from(day.day() * 7 + hour)
        });
        let calc = calculator();
        let first = calc.ten_of_ten(&history, &event()).unwrap();
        for _ in 0..5 {
            assert_eq!(calc.ten_of_ten(&history, &event()).unwrap(), first);
        }
    }

    #[test]
    fn test_excluded_dates_extend_the_lookback() {
        let mut config = BaselineConfig::default();
        config.excluded_dates.insert(date(6, 10));
        let calc = BaselineCalculator::new(config).unwrap();

        let days = calc.lookback_days(date(6, 14));
        assert_eq!(days.len(), 10);
        assert!(!days.contains(&date(6, 10)));
        assert_eq!(days[9], date(5, 30));

        let history = quarter_hour_history(date(5, 16), date(6, 14), |day, _| {
            if day == date(6, 10) {
                50_000.0
            } else {
                800.0
            }
        });
        assert_eq!(calc.ten_of_ten(&history, &event()).unwrap().mean(), 800.0);
    }

    #[test]
    fn test_strict_shortfall_fails() {
        // data starts on June 6, leaving six lookback days
        let history = quarter_hour_history(date(6, 6), date(6, 14), |_, _| 1000.0);
        let err = calculator().ten_of_ten(&history, &event()).unwrap_err();
        assert_eq!(
            err,
            PayoutError::InsufficientHistory {
                event_date: date(6, 14),
                required: 10,
                available: 6,
            }
        );
    }

    #[test]
    fn test_use_available_shortfall() {
        let history = quarter_hour_history(date(6, 6), date(6, 14), |_, _| 1000.0);

        let config = BaselineConfig {
            shortfall: ShortfallPolicy::UseAvailable { min_days: 5 },
            ..BaselineConfig::default()
        };
        let baseline = BaselineCalculator::new(config).unwrap().ten_of_ten(&history, &event());
        assert_eq!(baseline.unwrap().mean(), 1000.0);

        let config = BaselineConfig {
            shortfall: ShortfallPolicy::UseAvailable { min_days: 8 },
            ..BaselineConfig::default()
        };
        let err = BaselineCalculator::new(config)
            .unwrap()
            .ten_of_ten(&history, &event())
            .unwrap_err();
        assert!(matches!(err, PayoutError::InsufficientHistory { available: 6, .. }));
    }

    #[test]
    fn test_hour_never_observed() {
        let full = quarter_hour_history(date(5, 16), date(6, 14), |_, _| 1000.0);
        let without_15h = IntervalSeries::new(
            15,
            full.iter().filter(|(ts, _)| ts.hour() != 15).collect::<Vec<_>>(),
        )
        .unwrap();

        let err = calculator().ten_of_ten(&without_15h, &event()).unwrap_err();
        assert!(matches!(err, PayoutError::EmptyAggregation(_)));
    }

    #[test]
    fn test_fixed_baseline() {
        let baseline = BaselineCalculator::fixed(850.0).unwrap();
        assert_eq!(baseline.expected_at(at(6, 14, 3, 0)), Some(850.0));
        assert!(BaselineCalculator::fixed(-1.0).is_err());
        assert!(BaselineCalculator::fixed(f64::INFINITY).is_err());
    }

    #[test]
    fn test_invalid_config() {
        let config = BaselineConfig {
            lookback_days: 0,
            ..BaselineConfig::default()
        };
        assert!(BaselineCalculator::new(config).is_err());

        let config = BaselineConfig {
            shortfall: ShortfallPolicy::UseAvailable { min_days: 11 },
            ..BaselineConfig::default()
        };
        assert!(BaselineCalculator::new(config).is_err());
    }
}
