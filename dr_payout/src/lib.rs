pub mod aggregator;
pub mod baseline;
pub mod error;
pub mod models;
pub mod payout;
pub mod performance;
pub mod series;
pub mod settlement;

#[cfg(test)]
mod test_support;

pub use aggregator::{floor_to_hour, HourlyAggregate, HourlyAggregator};
pub use baseline::{Baseline, BaselineCalculator, BaselineSeries};
pub use error::PayoutError;
pub use models::{
    BaselineConfig, BaselineMode, EventWindow, HourlyPayout, PayoutRecord, PriceSchedule,
    SettlementConfig, ShortfallPolicy, SiteMetadata, SiteSettlement,
};
pub use payout::PayoutCalculator;
pub use performance::{PerformanceEvaluator, PerformanceReport};
pub use series::IntervalSeries;
pub use settlement::{Settlement, SiteInput, SiteOutcome};
