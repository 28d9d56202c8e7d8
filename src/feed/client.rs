use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::Url;

use crate::error::FetchError;
use crate::feed::types::FeedResponse;

/// Source of feed responses. One call per run, no retries.
#[async_trait]
pub trait EventFeed: Send + Sync {
    async fn fetch(&self, query: &Url) -> Result<FeedResponse, FetchError>;
    fn name(&self) -> &'static str;
}

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(45);

pub struct EonetFeed {
    mode: Mode,
}

enum Mode {
    // Owned copy so tests can hand in any &str.
    Fixture(String),
    Http { client: reqwest::Client },
}

impl EonetFeed {
    /// Serve every query from a fixed response body.
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn http(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            mode: Mode::Http { client },
        })
    }

    fn parse_body(url: &Url, body: &str) -> Result<FeedResponse, FetchError> {
        let t0 = std::time::Instant::now();
        let response: FeedResponse =
            serde_json::from_str(body).map_err(|source| FetchError::Decode {
                url: url.to_string(),
                source,
            })?;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("eonet_parse_ms").record(ms);
        counter!("eonet_events_fetched_total").increment(response.events.len() as u64);
        Ok(response)
    }
}

#[async_trait]
impl EventFeed for EonetFeed {
    async fn fetch(&self, query: &Url) -> Result<FeedResponse, FetchError> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_body(query, s),

            Mode::Http { client } => {
                let resp = match client.get(query.clone()).send().await {
                    Ok(resp) => resp,
                    Err(e) => {
                        tracing::warn!(error = ?e, provider = "EONET", "feed http error");
                        counter!("eonet_fetch_errors_total").increment(1);
                        return Err(FetchError::Transport {
                            url: query.to_string(),
                            source: e,
                        });
                    }
                };

                let status = resp.status();
                if !status.is_success() {
                    counter!("eonet_fetch_errors_total").increment(1);
                    return Err(FetchError::Status {
                        url: query.to_string(),
                        status,
                    });
                }

                let body = resp.text().await.map_err(|source| FetchError::Transport {
                    url: query.to_string(),
                    source,
                })?;
                Self::parse_body(query, &body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "EONET"
    }
}
