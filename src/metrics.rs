use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up in the exposition).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "eonet_events_fetched_total",
            "Events returned by the feed."
        );
        describe_counter!(
            "eonet_events_kept_total",
            "Events left after time/region filtering."
        );
        describe_counter!(
            "eonet_events_filtered_total",
            "Events with no geometry left after filtering."
        );
        describe_counter!(
            "eonet_products_published_total",
            "Products written (and handed off when requested)."
        );
        describe_counter!(
            "eonet_product_failures_total",
            "Products that failed to build, write or hand off."
        );
        describe_counter!("eonet_fetch_errors_total", "Feed fetch errors.");
        describe_histogram!("eonet_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!("eonet_last_run_ts", "Unix ts of the last completed run.");
    });
}

/// Prometheus recorder whose output is written to a file after the run,
/// for collection by a node-exporter textfile collector.
pub struct TextfileExporter {
    handle: PrometheusHandle,
    path: PathBuf,
}

impl TextfileExporter {
    pub fn install(path: &Path) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        Ok(Self {
            handle,
            path: path.to_path_buf(),
        })
    }

    pub fn write(&self) -> Result<()> {
        let body = self.handle.render();
        std::fs::write(&self.path, body)
            .with_context(|| format!("writing metrics to {}", self.path.display()))
    }
}
