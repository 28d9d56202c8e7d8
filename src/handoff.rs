// src/handoff.rs
//
// Downstream ingestion of finished product directories.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::config::HandoffSettings;
use crate::error::HandoffError;
use crate::product::Product;

/// Everything the ingest side needs to pick up one product directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandoffRequest {
    pub label: String,
    pub manifest_path: PathBuf,
    pub update_url: String,
    pub processed_queue: String,
    pub product_dir: PathBuf,
    pub force: Option<bool>,
}

impl HandoffRequest {
    pub fn new(settings: &HandoffSettings, product: &Product, product_dir: &Path) -> Self {
        Self {
            label: product.label().to_string(),
            manifest_path: settings.manifest_path.clone(),
            update_url: settings.update_url.clone(),
            processed_queue: settings.processed_queue.clone(),
            product_dir: product_dir.to_path_buf(),
            force: settings.force,
        }
    }
}

#[async_trait]
pub trait Handoff: Send + Sync {
    async fn submit(&self, request: &HandoffRequest) -> Result<(), HandoffError>;
}

/// Posts the product files to the request's update URL, tagged with the
/// processed-queue name.
pub struct HttpHandoff {
    client: Client,
}

impl HttpHandoff {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

async fn read_json(path: PathBuf) -> Result<Value, HandoffError> {
    let raw = tokio::fs::read(&path)
        .await
        .map_err(|source| HandoffError::Io {
            path: path.clone(),
            source,
        })?;
    serde_json::from_slice(&raw).map_err(|source| HandoffError::Json { path, source })
}

#[async_trait]
impl Handoff for HttpHandoff {
    async fn submit(&self, request: &HandoffRequest) -> Result<(), HandoffError> {
        let dir = &request.product_dir;
        let dataset = read_json(dir.join(format!("{}.dataset.json", request.label))).await?;
        let metadata = read_json(dir.join(format!("{}.met.json", request.label))).await?;

        let body = serde_json::json!({
            "label": request.label,
            "manifest": request.manifest_path,
            "queue": request.processed_queue,
            "force": request.force,
            "dataset": dataset,
            "metadata": metadata,
        });

        let resp = self
            .client
            .post(&request.update_url)
            .json(&body)
            .send()
            .await
            .map_err(|source| HandoffError::Transport {
                label: request.label.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(HandoffError::Rejected {
                label: request.label.clone(),
                reason: format!("{status}: {}", detail.trim()),
            });
        }
        Ok(())
    }
}

/// Records requests instead of sending them; optionally rejects every one.
pub struct RecordingHandoff {
    pub calls: Mutex<Vec<HandoffRequest>>,
    reject: bool,
}

impl RecordingHandoff {
    pub fn accepting() -> Self {
        Self {
            calls: Mutex::new(vec![]),
            reject: false,
        }
    }

    pub fn rejecting() -> Self {
        Self {
            calls: Mutex::new(vec![]),
            reject: true,
        }
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.iter().map(|c| c.label.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Handoff for RecordingHandoff {
    async fn submit(&self, request: &HandoffRequest) -> Result<(), HandoffError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        if self.reject {
            return Err(HandoffError::Rejected {
                label: request.label.clone(),
                reason: "rejected by recording handoff".into(),
            });
        }
        Ok(())
    }
}
