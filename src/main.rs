//! EONET ingest binary entrypoint.
//! Runs one query/filter/publish pass and exits. Scheduling (cron, job
//! queue) is the caller's concern.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use eonet_ingest::config::Settings;
use eonet_ingest::driver::{BatchReport, RunDriver, RunOptions};
use eonet_ingest::feed::{EonetFeed, EventStatus, Lookback};
use eonet_ingest::handoff::HttpHandoff;
use eonet_ingest::metrics::TextfileExporter;
use eonet_ingest::state;
use eonet_ingest::timefmt::parse_timestamp;

/// `eonet-ingest` command arguments.
#[derive(Debug, Parser)]
#[command(
    name = "eonet-ingest",
    about = "Run an EONET query with the given parameters and publish matching events",
    version
)]
struct Args {
    /// Start of the time window (exclusive). Needs --endtime to take effect.
    #[arg(long, value_parser = parse_user_time)]
    starttime: Option<DateTime<Utc>>,

    /// End of the time window (exclusive). Needs --starttime to take effect.
    #[arg(long, value_parser = parse_user_time)]
    endtime: Option<DateTime<Utc>>,

    /// Days to look back, or `state` to look back to the last successful run.
    #[arg(long = "lookback-days", alias = "lookback_days", value_name = "N|state")]
    lookback_days: Option<Lookback>,

    /// Only events with this status.
    #[arg(long, value_enum)]
    status: Option<EventStatus>,

    /// Only events from this source (see the feed's /sources endpoint).
    #[arg(long)]
    source: Option<String>,

    /// GeoJSON polygon filter; observations must intersect it.
    #[arg(long)]
    polygon: Option<String>,

    /// Publish the bundled sample event. Overrides all query options.
    #[arg(long)]
    test: bool,

    /// Hand products to downstream ingest instead of only writing them.
    #[arg(long)]
    submit: bool,

    /// Settings file (TOML). Falls back to $EONET_CONFIG_PATH, then config/eonet.toml.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn parse_user_time(raw: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(raw).ok_or_else(|| format!("unable to parse input time: {raw}"))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("eonet_ingest=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn print_summary(report: &BatchReport) {
    if let Some(query) = &report.query {
        println!("Running EONET query: {query}");
    }
    println!("query returned {} results", report.fetched);
    println!("filtered results returned {} total", report.filtered);
    for label in report.labels() {
        println!("published {label}");
    }
    for (outcome, err) in report.failures() {
        println!(
            "failed on build {} ({}): {err}",
            outcome.event_id,
            outcome.geometry_date.as_deref().unwrap_or("undated")
        );
    }
}

async fn run(args: Args) -> Result<()> {
    let settings = Settings::load(args.config.as_deref())?;

    let exporter = settings
        .metrics_textfile
        .as_deref()
        .map(TextfileExporter::install)
        .transpose()?;

    let feed = EonetFeed::http(settings.fetch_timeout()).context("building feed client")?;
    let handoff = HttpHandoff::new(settings.handoff_timeout()).context("building handoff client")?;
    let store = state::from_settings(&settings.state).context("building run-state store")?;

    let driver = RunDriver::new(
        settings,
        Arc::new(feed),
        Arc::from(store),
        Arc::new(handoff),
    );

    let options = RunOptions {
        starttime: args.starttime,
        endtime: args.endtime,
        lookback: args.lookback_days,
        status: args.status,
        source: args.source,
        polygon: args.polygon,
        test: args.test,
        submit: args.submit,
    };

    let report = driver.run(&options).await?;
    print_summary(&report);

    if let Some(exporter) = exporter {
        if let Err(e) = exporter.write() {
            tracing::warn!("metrics textfile: {e:#}");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let args = Args::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("create Tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("run aborted: {e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
