use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use dr_payout::IntervalSeries;
use glob::glob;
use log::debug;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

/// Find `site_<id>.csv` files in `dir`, keyed by site id.
pub fn discover_site_files(dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let pattern = dir.join("site_*.csv");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Data directory {} is not valid UTF-8", dir.display()))?;
    let id_pattern = Regex::new(r"^site_(.+)\.csv$")?;

    let mut files = BTreeMap::new();
    for entry in glob(pattern)? {
        let path = entry?;
        let file_name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
        if let Some(captures) = id_pattern.captures(file_name) {
            files.insert(captures[1].to_string(), path.clone());
        }
    }

    debug!("Discovered {} site files in {}", files.len(), dir.display());
    Ok(files)
}

/// Reads per-site interval CSVs into `IntervalSeries`.
pub struct IntervalLoader {
    timestamp_column: String,
    value_column: String,
    cadence_minutes: u32,
}

impl IntervalLoader {
    pub fn new(timestamp_column: &str, value_column: &str, cadence_minutes: u32) -> Self {
        Self {
            timestamp_column: timestamp_column.to_string(),
            value_column: value_column.to_string(),
            cadence_minutes,
        }
    }

    pub fn load_site(&self, path: &Path) -> Result<IntervalSeries> {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        self.read_series(file)
            .with_context(|| format!("Failed to load interval data from {}", path.display()))
    }

    /// Parse interval rows; rows may arrive in any order, empty readings are gaps.
    pub fn read_series<R: Read>(&self, reader: R) -> Result<IntervalSeries> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = rdr.headers()?.clone();

        let ts_idx = column_index(&headers, &self.timestamp_column)?;
        let value_idx = column_index(&headers, &self.value_column)?;

        let mut readings = Vec::new();
        let mut gaps = 0;

        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            let raw_ts = record.get(ts_idx).unwrap_or("");
            let timestamp = parse_timestamp(raw_ts)
                .ok_or_else(|| anyhow::anyhow!("Row {}: unparseable timestamp '{}'", row + 1, raw_ts))?;

            let raw_value = record.get(value_idx).unwrap_or("");
            if raw_value.is_empty() {
                gaps += 1;
                continue;
            }
            let value: f64 = raw_value
                .parse()
                .with_context(|| format!("Row {}: invalid reading '{}'", row + 1, raw_value))?;

            readings.push((timestamp, value));
        }

        if gaps > 0 {
            debug!("{} empty readings left as gaps", gaps);
        }

        readings.sort_by_key(|(timestamp, _)| *timestamp);
        Ok(IntervalSeries::new(self.cadence_minutes, readings)?)
    }
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| anyhow::anyhow!("Column '{}' not found", name))
}
