//! Report rendering for settled sites: summary table, CSV and JSON.

use anyhow::Result;
use dr_payout::SiteSettlement;
use serde::Serialize;
use std::fmt::Write as _;
use std::io::Write;

#[derive(Debug, Serialize)]
pub struct ReportRow {
    #[serde(rename = "Site")]
    pub site_id: String,
    #[serde(rename = "FSL Baseline")]
    pub fsl_baseline: f64,
    #[serde(rename = "Profit Share")]
    pub profit_share: f64,
    #[serde(rename = "10 of 10 Baseline")]
    pub ten_of_ten_baseline: f64,
    #[serde(rename = "Average Performance (10 of 10)")]
    pub avg_performance_ten_of_ten: f64,
    #[serde(rename = "Average Performance (FSL)")]
    pub avg_performance_fsl: f64,
    #[serde(rename = "Revenue")]
    pub revenue: f64,
    #[serde(rename = "Customer Share")]
    pub customer_share: f64,
    #[serde(rename = "Aggregator Share")]
    pub aggregator_share: f64,
}

impl From<&SiteSettlement> for ReportRow {
    fn from(s: &SiteSettlement) -> Self {
        Self {
            site_id: s.site_id.clone(),
            fsl_baseline: s.fsl_baseline,
            profit_share: s.profit_share,
            ten_of_ten_baseline: s.ten_of_ten_mean,
            avg_performance_ten_of_ten: s.avg_performance_ten_of_ten,
            avg_performance_fsl: s.avg_performance_fsl,
            revenue: s.revenue(),
            customer_share: s.customer_share(),
            aggregator_share: s.aggregator_share(),
        }
    }
}

pub fn write_csv<W: Write>(settlements: &[SiteSettlement], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for settlement in settlements {
        wtr.serialize(ReportRow::from(settlement))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Full settlement records, hourly payouts included.
pub fn write_json<W: Write>(settlements: &[SiteSettlement], mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, settlements)?;
    writeln!(writer)?;
    Ok(())
}

/// Fixed-width table of every settled site followed by any failures.
pub fn render_summary(settlements: &[SiteSettlement], failures: &[(String, String)]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Demand Response Settlement Summary");
    let _ = writeln!(out, "{}", "=".repeat(118));
    let _ = writeln!(
        out,
        "{:<8} {:>12} {:>8} {:>12} {:>14} {:>14} {:>14} {:>14} {:>14}",
        "Site", "FSL", "Share", "10 of 10", "Perf (10/10)", "Perf (FSL)", "Revenue", "Customer", "Aggregator"
    );
    let _ = writeln!(out, "{}", "-".repeat(118));

    for row in settlements.iter().map(ReportRow::from) {
        let _ = writeln!(
            out,
            "{:<8} {:>12.2} {:>7.0}% {:>12.2} {:>14.2} {:>14.2} {:>14.2} {:>14.2} {:>14.2}",
            row.site_id,
            row.fsl_baseline,
            row.profit_share * 100.0,
            row.ten_of_ten_baseline,
            row.avg_performance_ten_of_ten,
            row.avg_performance_fsl,
            row.revenue,
            row.customer_share,
            row.aggregator_share
        );
    }

    let _ = writeln!(out, "{}", "-".repeat(118));
    let _ = writeln!(
        out,
        "{:<8} {:>86.2} {:>14.2} {:>14.2}",
        "Total",
        settlements.iter().map(SiteSettlement::revenue).sum::<f64>(),
        settlements.iter().map(SiteSettlement::customer_share).sum::<f64>(),
        settlements.iter().map(SiteSettlement::aggregator_share).sum::<f64>()
    );

    if !failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Skipped sites:");
        for (site_id, reason) in failures {
            let _ = writeln!(out, "  {}: {}", site_id, reason);
        }
    }

    out
}
