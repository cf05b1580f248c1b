//! JSON run configuration: event, price schedule, site metadata and baseline options.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use dr_payout::{
    BaselineConfig, BaselineMode, EventWindow, PriceSchedule, SettlementConfig, SiteMetadata,
};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub event: EventConfig,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
    #[serde(default)]
    pub baseline: BaselineConfig,
    #[serde(default = "default_payout_baseline")]
    pub payout_baseline: BaselineMode,
    pub prices: Vec<PricePoint>,
    pub sites: Vec<SiteConfig>,
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,
    #[serde(default = "default_value_column")]
    pub value_column: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventConfig {
    pub start: NaiveDateTime,
    /// Exclusive.
    pub end: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PricePoint {
    pub hour: NaiveDateTime,
    pub rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    pub site_id: String,
    pub fsl_baseline: f64,
    pub profit_share: f64,
    /// Interval file for this site; discovered from the data directory when absent.
    #[serde(default)]
    pub data_file: Option<PathBuf>,
}

impl SiteConfig {
    pub fn metadata(&self) -> SiteMetadata {
        SiteMetadata {
            site_id: self.site_id.clone(),
            fsl_baseline: self.fsl_baseline,
            profit_share: self.profit_share,
        }
    }
}

fn default_interval_minutes() -> u32 {
    15
}

fn default_payout_baseline() -> BaselineMode {
    BaselineMode::TenOfTen
}

fn default_timestamp_column() -> String {
    "Interval Beginning (EST)".to_string()
}

fn default_value_column() -> String {
    "kWh".to_string()
}

impl RunConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        if config.sites.is_empty() {
            anyhow::bail!("config lists no sites");
        }
        Ok(config)
    }

    pub fn event_window(&self) -> Result<EventWindow> {
        Ok(EventWindow::new(self.event.start, self.event.end)?)
    }

    pub fn price_schedule(&self) -> Result<PriceSchedule> {
        Ok(PriceSchedule::new(self.prices.iter().map(|p| (p.hour, p.rate)))?)
    }

    pub fn settlement_config(&self) -> SettlementConfig {
        SettlementConfig {
            baseline: self.baseline.clone(),
            payout_baseline: self.payout_baseline,
        }
    }
}
