//! # Run Driver
//! One ingest run: compute the query window, fetch, filter, build and hand off
//! each product, then record the run time.
//!
//! Window and query problems, fetch failures and state-store failures abort the
//! run ([`RunError`]) before anything is recorded. Failures while building or
//! publishing a single product are captured per observation in the
//! [`BatchReport`] and never stop the remaining observations.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use reqwest::Url;

use crate::config::Settings;
use crate::error::{ProductError, RunError, StateError};
use crate::feed::query::{lookback_days, EventStatus, FeedQuery, Lookback};
use crate::feed::types::Event;
use crate::feed::EventFeed;
use crate::filter::{filter_batch, CoverageWindow};
use crate::geometry::Region;
use crate::handoff::{Handoff, HandoffRequest};
use crate::metrics::ensure_metrics_described;
use crate::product::{build_product, log_published, write_product_dir};
use crate::state::{RunStateStore, LAST_QUERY_KEY};
use crate::timefmt::{parse_timestamp, run_stamp};

/// Sample event published by `--test` runs, embedded in the binary.
const TEST_EVENT: &str = include_str!("test_event.json");

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed instant, for reproducible runs.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub starttime: Option<DateTime<Utc>>,
    pub endtime: Option<DateTime<Utc>>,
    pub lookback: Option<Lookback>,
    pub status: Option<EventStatus>,
    pub source: Option<String>,
    /// Raw spatial filter as given on the command line.
    pub polygon: Option<String>,
    /// Publish the bundled sample event instead of querying the feed.
    pub test: bool,
    /// Hand products to downstream ingest instead of only writing them.
    pub submit: bool,
}

#[derive(Debug)]
pub enum Publication {
    /// Written to disk, no handoff requested.
    Written { label: String, dir: PathBuf },
    /// Accepted downstream; the working directory was removed.
    Submitted { label: String },
}

impl Publication {
    pub fn label(&self) -> &str {
        match self {
            Self::Written { label, .. } | Self::Submitted { label } => label,
        }
    }
}

/// Result for one (event, geometry) pair.
#[derive(Debug)]
pub struct ProductOutcome {
    pub event_id: String,
    pub geometry_date: Option<String>,
    pub result: Result<Publication, ProductError>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    /// `None` for test runs, which skip the feed.
    pub query: Option<String>,
    pub fetched: usize,
    pub filtered: usize,
    pub outcomes: Vec<ProductOutcome>,
}

impl BatchReport {
    pub fn labels(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(Publication::label))
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ProductOutcome, &ProductError)> + '_ {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o, e)))
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }
}

pub struct RunDriver {
    settings: Settings,
    feed: Arc<dyn EventFeed>,
    state: Arc<dyn RunStateStore>,
    handoff: Arc<dyn Handoff>,
    clock: Arc<dyn Clock>,
}

impl RunDriver {
    pub fn new(
        settings: Settings,
        feed: Arc<dyn EventFeed>,
        state: Arc<dyn RunStateStore>,
        handoff: Arc<dyn Handoff>,
    ) -> Self {
        Self {
            settings,
            feed,
            state,
            handoff,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn run(&self, options: &RunOptions) -> Result<BatchReport, RunError> {
        ensure_metrics_described();
        if options.test {
            return self.run_test_event(options.submit).await;
        }

        let now = self.clock.now();

        // ComputeWindow: invalid input must fail before the feed is touched.
        let region = options
            .polygon
            .as_deref()
            .map(Region::parse)
            .transpose()?;
        let window = CoverageWindow {
            starttime: options.starttime,
            endtime: options.endtime,
            region,
        };
        let query = self.build_query(options, now).await?;
        tracing::info!(%query, "running EONET query");

        // Fetch
        let response = self.feed.fetch(&query).await?;
        let fetched = response.events.len();
        tracing::info!(fetched, feed = self.feed.name(), "query returned results");

        // Filter
        let events = filter_batch(&response.events, &window);
        tracing::info!(filtered = events.len(), "filtered results");

        // BuildAndHandoff
        let mut outcomes = Vec::new();
        for event in &events {
            for observation in event.observations() {
                outcomes.push(self.publish(&observation, options.submit).await);
            }
        }

        // RecordRunTime
        self.state.set(LAST_QUERY_KEY, &run_stamp(now)).await?;
        gauge!("eonet_last_run_ts").set(now.timestamp() as f64);

        Ok(BatchReport {
            query: Some(query.to_string()),
            fetched,
            filtered: events.len(),
            outcomes,
        })
    }

    async fn build_query(&self, options: &RunOptions, now: DateTime<Utc>) -> Result<Url, RunError> {
        let days = match options.lookback {
            Some(Lookback::Days(n)) => Some(i64::from(n)),
            Some(Lookback::Stored) => self.stored_lookback(now).await?,
            None => None,
        };
        FeedQuery {
            days,
            status: options.status,
            source: options.source.clone(),
        }
        .url(&self.settings.feed_base_url)
        .map_err(RunError::Query)
    }

    /// Day count since the stored run time, or `None` when nothing is stored.
    async fn stored_lookback(&self, now: DateTime<Utc>) -> Result<Option<i64>, RunError> {
        let Some(raw) = self.state.get(LAST_QUERY_KEY).await? else {
            tracing::info!("no stored run time; querying without a day limit");
            return Ok(None);
        };
        let last = parse_timestamp(&raw).ok_or_else(|| StateError::Unparseable {
            key: LAST_QUERY_KEY.to_string(),
            value: raw.clone(),
        })?;
        Ok(Some(lookback_days(now, last)))
    }

    async fn run_test_event(&self, submit: bool) -> Result<BatchReport, RunError> {
        // Whole event as metadata; the last geometry describes the product.
        let event: Event = serde_json::from_str(TEST_EVENT).map_err(RunError::TestEvent)?;
        let outcome = self.publish(&event, submit).await;
        Ok(BatchReport {
            query: None,
            fetched: 1,
            filtered: 1,
            outcomes: vec![outcome],
        })
    }

    async fn publish(&self, observation: &Event, submit: bool) -> ProductOutcome {
        let result = self.publish_inner(observation, submit).await;
        match &result {
            Ok(_) => counter!("eonet_products_published_total").increment(1),
            Err(e) => {
                counter!("eonet_product_failures_total").increment(1);
                tracing::warn!(event = %observation.id, error = %e, "failed on build");
            }
        }
        ProductOutcome {
            event_id: observation.id.clone(),
            geometry_date: observation.geometries.last().and_then(|g| g.date.clone()),
            result,
        }
    }

    async fn publish_inner(
        &self,
        observation: &Event,
        submit: bool,
    ) -> Result<Publication, ProductError> {
        let product = build_product(observation)?;
        let dir = write_product_dir(&self.settings.work_dir, &product).await?;
        log_published(&product);

        if !submit {
            return Ok(Publication::Written {
                label: product.label().to_string(),
                dir,
            });
        }

        let request = HandoffRequest::new(&self.settings.handoff, &product, &dir);
        if let Err(e) = self.handoff.submit(&request).await {
            tracing::warn!(dir = %dir.display(), "handoff failed; keeping product directory");
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            tracing::warn!(dir = %dir.display(), error = %e, "could not remove submitted product directory");
        }
        Ok(Publication::Submitted {
            label: product.label().to_string(),
        })
    }
}
