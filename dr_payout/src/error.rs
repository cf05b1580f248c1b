//! Errors raised by the settlement core.
//!
//! Every variant is raised where it is detected and propagated unchanged; the
//! core never replaces missing data with zero or NaN.

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayoutError {
    /// Actual and baseline hours disagree, or an event hour has no interval data.
    #[error("data alignment error at {hour}: {reason}")]
    DataAlignment { hour: NaiveDateTime, reason: String },

    /// Not enough qualifying business days before the event for the 10-of-10 baseline.
    #[error("insufficient history before {event_date}: {available} of {required} business days have data")]
    InsufficientHistory {
        event_date: NaiveDate,
        required: usize,
        available: usize,
    },

    /// The price schedule has no rate for an event hour.
    #[error("no price for event hour {0}")]
    MissingPrice(NaiveDateTime),

    /// A mean or sum was requested over an empty set.
    #[error("nothing to aggregate: {0}")]
    EmptyAggregation(String),

    #[error("invalid interval series: {0}")]
    InvalidSeries(String),

    #[error("invalid event window: {0}")]
    InvalidEvent(String),

    #[error("invalid price schedule: {0}")]
    InvalidPriceSchedule(String),

    #[error("profit share must lie in [0, 1], got {0}")]
    InvalidProfitShare(f64),

    #[error("invalid baseline: {0}")]
    InvalidBaseline(String),
}

pub type Result<T> = std::result::Result<T, PayoutError>;
