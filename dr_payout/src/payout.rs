use crate::error::{PayoutError, Result};
use crate::models::{HourlyPayout, PayoutRecord, PriceSchedule};
use crate::performance::PerformanceReport;
use chrono::NaiveDateTime;

/// kWh of curtailment per MWh of priced energy.
const KWH_PER_MWH: f64 = 1000.0;

/// Prices hourly curtailment and splits the revenue between customer and aggregator.
pub struct PayoutCalculator {
    profit_share: f64,
}

impl PayoutCalculator {
    /// `profit_share` is the customer's fraction of revenue.
    pub fn new(profit_share: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&profit_share) {
            return Err(PayoutError::InvalidProfitShare(profit_share));
        }
        Ok(Self { profit_share })
    }

    pub fn profit_share(&self) -> f64 {
        self.profit_share
    }

    /// Price every hour of `performance`.
    ///
    /// Every hour needs a rate before anything is priced. Revenue is clamped at
    /// zero, so over-consumption never becomes a charge.
    pub fn calculate(&self, performance: &PerformanceReport, prices: &PriceSchedule) -> Result<PayoutRecord> {
        let rates = performance
            .iter()
            .map(|(hour, _)| prices.price_at(hour))
            .collect::<Result<Vec<f64>>>()?;

        let hours = performance
            .iter()
            .zip(rates)
            .map(|((hour, curtailment), rate)| self.price_hour(hour, curtailment, rate))
            .collect();

        Ok(PayoutRecord::from_hours(hours))
    }

    fn price_hour(&self, hour: NaiveDateTime, performance: f64, rate: f64) -> HourlyPayout {
        let revenue = (performance / KWH_PER_MWH * rate).max(0.0);
        let customer_share = revenue * self.profit_share;

        HourlyPayout {
            hour,
            performance,
            revenue,
            customer_share,
            aggregator_share: revenue - customer_share,
        }
    }
}
