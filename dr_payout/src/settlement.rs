use crate::aggregator::HourlyAggregator;
use crate::baseline::{Baseline, BaselineCalculator};
use crate::error::Result;
use crate::models::{BaselineMode, EventWindow, PriceSchedule, SettlementConfig, SiteMetadata, SiteSettlement};
use crate::payout::PayoutCalculator;
use crate::performance::PerformanceEvaluator;
use crate::series::IntervalSeries;
use log::{debug, info, warn};
use rayon::prelude::*;

/// Interval history and metadata for one site.
#[derive(Debug, Clone)]
pub struct SiteInput {
    pub metadata: SiteMetadata,
    pub history: IntervalSeries,
}

/// Result of settling one site; failures stay per site.
#[derive(Debug)]
pub struct SiteOutcome {
    pub site_id: String,
    pub result: Result<SiteSettlement>,
}

/// Settles sites against one event and one price schedule.
pub struct Settlement {
    event: EventWindow,
    prices: PriceSchedule,
    payout_baseline: BaselineMode,
    baseline: BaselineCalculator,
}

impl Settlement {
    pub fn new(event: EventWindow, prices: PriceSchedule, config: SettlementConfig) -> Result<Self> {
        Ok(Self {
            event,
            prices,
            payout_baseline: config.payout_baseline,
            baseline: BaselineCalculator::new(config.baseline)?,
        })
    }

    pub fn event(&self) -> &EventWindow {
        &self.event
    }

    /// Baselines, performance under both modes, then payout, in that order.
    pub fn settle_site(&self, metadata: &SiteMetadata, history: &IntervalSeries) -> Result<SiteSettlement> {
        let payout = PayoutCalculator::new(metadata.profit_share)?;
        let fsl = BaselineCalculator::fixed(metadata.fsl_baseline)?;

        let event_readings = history.slice(self.event.start(), self.event.end());
        let missing = event_readings.missing_intervals(self.event.start(), self.event.end());
        if !missing.is_empty() {
            warn!(
                "Site {}: {} event intervals missing, first at {}",
                metadata.site_id,
                missing.len(),
                missing[0]
            );
        }
        let actual = HourlyAggregator::aggregate(&event_readings);

        let ten_of_ten = self.baseline.ten_of_ten(history, &self.event)?;
        let ten_of_ten_mean = ten_of_ten.mean();
        let ten_of_ten_baseline = Baseline::from(ten_of_ten.clone());

        let evaluator = PerformanceEvaluator::new(self.event);
        let performance_ten_of_ten = evaluator.evaluate(&actual, &ten_of_ten_baseline)?;
        let performance_fsl = evaluator.evaluate(&actual, &fsl)?;

        let priced = match self.payout_baseline {
            BaselineMode::TenOfTen => &performance_ten_of_ten,
            BaselineMode::Fsl => &performance_fsl,
        };
        let record = payout.calculate(priced, &self.prices)?;

        debug!(
            "Site {}: 10-of-10 {:.2}, performance {:.2} (10 of 10) / {:.2} (FSL), revenue {:.2}",
            metadata.site_id,
            ten_of_ten_mean,
            performance_ten_of_ten.average(),
            performance_fsl.average(),
            record.total_revenue()
        );

        Ok(SiteSettlement {
            site_id: metadata.site_id.clone(),
            fsl_baseline: metadata.fsl_baseline,
            profit_share: metadata.profit_share,
            ten_of_ten_baseline: ten_of_ten,
            ten_of_ten_mean,
            avg_performance_ten_of_ten: performance_ten_of_ten.average(),
            avg_performance_fsl: performance_fsl.average(),
            payout_baseline: self.payout_baseline,
            payout: record,
        })
    }

    /// Settle every site independently on the rayon pool, ordered by site id.
    pub fn settle_all(&self, sites: &[SiteInput]) -> Vec<SiteOutcome> {
        self.settle_all_with(sites, |_| {})
    }

    /// Like [`Settlement::settle_all`], calling `on_done` as each site finishes.
    pub fn settle_all_with<F>(&self, sites: &[SiteInput], on_done: F) -> Vec<SiteOutcome>
    where
        F: Fn(&SiteOutcome) + Sync,
    {
        info!(
            "Settling {} sites for event {} to {}",
            sites.len(),
            self.event.start(),
            self.event.end()
        );

        let mut outcomes: Vec<SiteOutcome> = sites
            .par_iter()
            .map(|site| {
                let outcome = SiteOutcome {
                    site_id: site.metadata.site_id.clone(),
                    result: self.settle_site(&site.metadata, &site.history),
                };
                on_done(&outcome);
                outcome
            })
            .collect();

        outcomes.sort_by(|a, b| a.site_id.cmp(&b.site_id));
        outcomes
    }
}
