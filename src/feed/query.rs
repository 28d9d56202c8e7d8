// src/feed/query.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use reqwest::Url;

pub const DEFAULT_FEED_BASE: &str = "https://eonet.gsfc.nasa.gov/api/v2.1";

/// The feed caps a single response; ask for everything up to the cap.
pub const EVENTS_LIMIT: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EventStatus {
    Open,
    Closed,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// How far back the feed is asked to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookback {
    Days(u32),
    /// Derive the day count from the stored last-run timestamp.
    Stored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookbackParseError(String);

impl fmt::Display for LookbackParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lookback must be a day count or `state`, got `{}`",
            self.0
        )
    }
}

impl std::error::Error for LookbackParseError {}

impl FromStr for Lookback {
    type Err = LookbackParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        // `redis` is what older cron entries pass
        if t.eq_ignore_ascii_case("state") || t.eq_ignore_ascii_case("redis") {
            return Ok(Self::Stored);
        }
        t.parse::<u32>()
            .map(Self::Days)
            .map_err(|_| LookbackParseError(s.to_string()))
    }
}

/// Inclusive day count between the last run and now, never below one.
pub fn lookback_days(now: DateTime<Utc>, last_run: DateTime<Utc>) -> i64 {
    (now - last_run).num_days().saturating_add(1).max(1)
}

/// Query parameters for `GET <base>/events`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedQuery {
    pub days: Option<i64>,
    pub status: Option<EventStatus>,
    pub source: Option<String>,
}

impl FeedQuery {
    pub fn url(&self, base: &str) -> Result<Url, String> {
        let endpoint = format!("{}/events", base.trim_end_matches('/'));
        let mut url =
            Url::parse(&endpoint).map_err(|e| format!("feed url `{endpoint}`: {e}"))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("limit", &EVENTS_LIMIT.to_string());
            if let Some(days) = self.days {
                pairs.append_pair("days", &days.to_string());
            }
            if let Some(status) = self.status {
                pairs.append_pair("status", status.as_str());
            }
            if let Some(source) = self.source.as_deref().filter(|s| !s.is_empty()) {
                pairs.append_pair("source", source);
            }
        }
        Ok(url)
    }
}
