use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use dr_payout::{Settlement, SiteInput, SiteSettlement};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rayon::prelude::*;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

mod config;
mod data_loader;
mod report;

use config::{RunConfig, SiteConfig};
use data_loader::{discover_site_files, IntervalLoader};

#[derive(Parser)]
#[command(name = "dr_settlement")]
#[command(about = "Settle demand-response event payouts per site against 10-of-10 and FSL baselines")]
struct Args {
    /// Run configuration (event, prices, sites) as JSON
    #[arg(short, long)]
    config: PathBuf,

    /// Directory holding site_<id>.csv interval files
    #[arg(short, long, default_value = "files")]
    data_dir: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "summary")]
    output: OutputFormat,

    /// Write the report here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Abort on the first site that fails instead of skipping it
    #[arg(long)]
    fail_fast: bool,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
    Summary,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let threads = args.threads.unwrap_or_else(num_cpus::get);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()?;
    info!("Starting settlement with {} threads", threads);

    let run = RunConfig::from_json_file(&args.config)?;
    let event = run.event_window()?;
    let prices = run.price_schedule()?;
    info!(
        "Event {} to {} ({} hours, {} priced)",
        event.start(),
        event.end(),
        event.duration_hours(),
        prices.len()
    );

    let mut failures: Vec<(String, String)> = Vec::new();
    let sites = load_sites(&run, &args, &mut failures)?;
    info!("Loaded interval data for {} of {} sites", sites.len(), run.sites.len());

    let settlement = Settlement::new(event, prices, run.settlement_config())?;

    let pb = ProgressBar::new(sites.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?,
    );
    let outcomes = settlement.settle_all_with(&sites, |outcome| {
        pb.set_message(format!("Settled site {}", outcome.site_id));
        pb.inc(1);
    });
    pb.finish_and_clear();

    let mut settled: Vec<SiteSettlement> = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(result) => settled.push(result),
            Err(e) if args.fail_fast => {
                return Err(e).with_context(|| format!("Site {} failed", outcome.site_id));
            }
            Err(e) => {
                warn!("Skipping site {}: {}", outcome.site_id, e);
                failures.push((outcome.site_id, e.to_string()));
            }
        }
    }
    failures.sort();

    let mut writer: Box<dyn Write> = match &args.out {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    match args.output {
        OutputFormat::Json => report::write_json(&settled, &mut writer)?,
        OutputFormat::Csv => report::write_csv(&settled, &mut writer)?,
        OutputFormat::Summary => write!(writer, "{}", report::render_summary(&settled, &failures))?,
    }
    writer.flush()?;

    info!("Settled {} sites, skipped {}", settled.len(), failures.len());
    Ok(())
}

/// Load each configured site's interval file in parallel.
///
/// Sites whose data cannot be loaded are recorded in `failures`, or abort the run
/// under `--fail-fast`.
fn load_sites(run: &RunConfig, args: &Args, failures: &mut Vec<(String, String)>) -> Result<Vec<SiteInput>> {
    let discovered = discover_site_files(&args.data_dir)?;
    let loader = IntervalLoader::new(&run.timestamp_column, &run.value_column, run.interval_minutes);

    let resolve = |site: &SiteConfig| -> Result<PathBuf> {
        match &site.data_file {
            Some(path) if path.is_absolute() => Ok(path.clone()),
            Some(path) => Ok(args.data_dir.join(path)),
            None => discovered
                .get(&site.site_id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no site_{}.csv in {}", site.site_id, args.data_dir.display())),
        }
    };

    let loaded: Vec<(String, Result<SiteInput>)> = run
        .sites
        .par_iter()
        .map(|site| {
            let input = resolve(site).and_then(|path| {
                Ok(SiteInput {
                    metadata: site.metadata(),
                    history: loader.load_site(&path)?,
                })
            });
            (site.site_id.clone(), input)
        })
        .collect();

    let mut sites = Vec::with_capacity(loaded.len());
    for (site_id, input) in loaded {
        match input {
            Ok(input) => sites.push(input),
            Err(e) if args.fail_fast => return Err(e.context(format!("Site {} failed to load", site_id))),
            Err(e) => {
                warn!("Skipping site {}: {:#}", site_id, e);
                failures.push((site_id, format!("{:#}", e)));
            }
        }
    }

    Ok(sites)
}
