use crate::baseline::BaselineSeries;
use crate::error::{PayoutError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Demand-response event window `[start, end)`, both ends on hour boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl EventWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start >= end {
            return Err(PayoutError::InvalidEvent(format!(
                "start {} is not before end {}",
                start, end
            )));
        }
        for boundary in [start, end] {
            if !is_hour_start(boundary) {
                return Err(PayoutError::InvalidEvent(format!(
                    "{} is not on an hour boundary",
                    boundary
                )));
            }
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn event_date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// Every hour start in the window, in order.
    pub fn hours(&self) -> Vec<NaiveDateTime> {
        let mut hours = Vec::new();
        let mut hour = self.start;
        while hour < self.end {
            hours.push(hour);
            hour += Duration::hours(1);
        }
        hours
    }

    pub fn duration_hours(&self) -> usize {
        self.hours().len()
    }
}

pub(crate) fn is_hour_start(timestamp: NaiveDateTime) -> bool {
    timestamp.minute() == 0 && timestamp.second() == 0 && timestamp.nanosecond() == 0
}

/// Price per MWh for each event hour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSchedule {
    rates: BTreeMap<NaiveDateTime, f64>,
}

impl PriceSchedule {
    pub fn new<I>(rates: I) -> Result<Self>
    where
        I: IntoIterator<Item = (NaiveDateTime, f64)>,
    {
        let mut map = BTreeMap::new();
        for (hour, rate) in rates {
            if !is_hour_start(hour) {
                return Err(PayoutError::InvalidPriceSchedule(format!(
                    "{} is not an hour start",
                    hour
                )));
            }
            if !rate.is_finite() {
                return Err(PayoutError::InvalidPriceSchedule(format!(
                    "rate for {} is not a number",
                    hour
                )));
            }
            if map.insert(hour, rate).is_some() {
                return Err(PayoutError::InvalidPriceSchedule(format!(
                    "duplicate rate for {}",
                    hour
                )));
            }
        }
        Ok(Self { rates: map })
    }

    /// Rate for `hour`; a miss is a configuration error, never zero.
    pub fn price_at(&self, hour: NaiveDateTime) -> Result<f64> {
        self.rates
            .get(&hour)
            .copied()
            .ok_or(PayoutError::MissingPrice(hour))
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDateTime, f64)> + '_ {
        self.rates.iter().map(|(hour, rate)| (*hour, *rate))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteMetadata {
    pub site_id: String,
    /// Fixed (FSL) baseline supplied by the market operator.
    pub fsl_baseline: f64,
    /// Customer's fraction of revenue, 0-1.
    pub profit_share: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallPolicy {
    /// Every lookback business day must carry data.
    Strict,
    /// Proceed once at least `min_days` lookback days carry data.
    UseAvailable { min_days: usize },
}

impl Default for ShortfallPolicy {
    fn default() -> Self {
        ShortfallPolicy::Strict
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    pub lookback_days: usize,
    pub shortfall: ShortfallPolicy,
    /// Business days left out of the lookback (holidays, earlier events).
    pub excluded_dates: BTreeSet<NaiveDate>,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            lookback_days: 10,
            shortfall: ShortfallPolicy::Strict,
            excluded_dates: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineMode {
    TenOfTen,
    Fsl,
}

impl std::fmt::Display for BaselineMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BaselineMode::TenOfTen => write!(f, "10 of 10"),
            BaselineMode::Fsl => write!(f, "FSL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    pub baseline: BaselineConfig,
    /// Baseline whose performance is priced into the payout.
    pub payout_baseline: BaselineMode,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            baseline: BaselineConfig::default(),
            payout_baseline: BaselineMode::TenOfTen,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourlyPayout {
    pub hour: NaiveDateTime,
    pub performance: f64,
    pub revenue: f64,
    pub customer_share: f64,
    pub aggregator_share: f64,
}

/// Per-hour payouts and their event totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayoutRecord {
    hours: Vec<HourlyPayout>,
    total_performance: f64,
    total_revenue: f64,
    total_customer_share: f64,
    total_aggregator_share: f64,
}

impl PayoutRecord {
    pub(crate) fn from_hours(hours: Vec<HourlyPayout>) -> Self {
        let total_performance = hours.iter().map(|h| h.performance).sum();
        let total_revenue = hours.iter().map(|h| h.revenue).sum();
        let total_customer_share = hours.iter().map(|h| h.customer_share).sum();
        let total_aggregator_share = hours.iter().map(|h| h.aggregator_share).sum();

        Self {
            hours,
            total_performance,
            total_revenue,
            total_customer_share,
            total_aggregator_share,
        }
    }

    pub fn hours(&self) -> &[HourlyPayout] {
        &self.hours
    }

    pub fn hour(&self, hour: NaiveDateTime) -> Option<&HourlyPayout> {
        self.hours.iter().find(|h| h.hour == hour)
    }

    pub fn total_performance(&self) -> f64 {
        self.total_performance
    }

    pub fn total_revenue(&self) -> f64 {
        self.total_revenue
    }

    pub fn total_customer_share(&self) -> f64 {
        self.total_customer_share
    }

    pub fn total_aggregator_share(&self) -> f64 {
        self.total_aggregator_share
    }
}

/// Everything the report layer needs for one site.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteSettlement {
    pub site_id: String,
    pub fsl_baseline: f64,
    pub profit_share: f64,
    pub ten_of_ten_baseline: BaselineSeries,
    pub ten_of_ten_mean: f64,
    pub avg_performance_ten_of_ten: f64,
    pub avg_performance_fsl: f64,
    pub payout_baseline: BaselineMode,
    pub payout: PayoutRecord,
}

impl SiteSettlement {
    pub fn revenue(&self) -> f64 {
        self.payout.total_revenue()
    }

    pub fn customer_share(&self) -> f64 {
        self.payout.total_customer_share()
    }

    pub fn aggregator_share(&self) -> f64 {
        self.payout.total_aggregator_share()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 6, 14)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_event_window_hours() {
        let event = EventWindow::new(at(14, 0), at(18, 0)).unwrap();
        assert_eq!(event.hours(), vec![at(14, 0), at(15, 0), at(16, 0), at(17, 0)]);
        assert_eq!(event.duration_hours(), 4);
        assert!(event.contains(at(17, 45)));
        assert!(!event.contains(at(18, 0)));
        assert_eq!(event.event_date(), NaiveDate::from_ymd_opt(2022, 6, 14).unwrap());
    }

    #[test]
    fn test_event_window_validation() {
        assert!(EventWindow::new(at(18, 0), at(14, 0)).is_err());
        assert!(EventWindow::new(at(14, 0), at(14, 0)).is_err());
        assert!(EventWindow::new(at(14, 30), at(18, 0)).is_err());
    }

    #[test]
    fn test_price_schedule_lookup() {
        let prices = PriceSchedule::new(vec![(at(14, 0), 1500.0), (at(15, 0), 1800.0)]).unwrap();
        assert_eq!(prices.price_at(at(15, 0)), Ok(1800.0));
        assert_eq!(
            prices.price_at(at(16, 0)),
            Err(PayoutError::MissingPrice(at(16, 0)))
        );
    }

    #[test]
    fn test_price_schedule_rejects_duplicates() {
        let err = PriceSchedule::new(vec![(at(14, 0), 1500.0), (at(14, 0), 1600.0)]).unwrap_err();
        assert!(matches!(err, PayoutError::InvalidPriceSchedule(_)));
        assert!(PriceSchedule::new(vec![(at(14, 15), 1500.0)]).is_err());
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config: SettlementConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.baseline.lookback_days, 10);
        assert_eq!(config.baseline.shortfall, ShortfallPolicy::Strict);
        assert_eq!(config.payout_baseline, BaselineMode::TenOfTen);

        let config: SettlementConfig = serde_json::from_str(
            r#"{
                "baseline": {
                    "shortfall": { "use_available": { "min_days": 5 } },
                    "excluded_dates": ["2022-06-03"]
                },
                "payout_baseline": "fsl"
            }"#,
        )
        .unwrap();
        assert_eq!(config.baseline.shortfall, ShortfallPolicy::UseAvailable { min_days: 5 });
        assert_eq!(config.baseline.excluded_dates.len(), 1);
        assert_eq!(config.payout_baseline, BaselineMode::Fsl);
    }
}
