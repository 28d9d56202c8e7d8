// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::feed::client::DEFAULT_FETCH_TIMEOUT;
use crate::feed::query::DEFAULT_FEED_BASE;

pub const ENV_CONFIG_PATH: &str = "EONET_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/eonet.toml";

fn default_feed_base_url() -> String {
    DEFAULT_FEED_BASE.to_string()
}
fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT.as_secs()
}
fn default_handoff_timeout_secs() -> u64 {
    60
}
fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_state_path() -> PathBuf {
    PathBuf::from("state/eonet_state.json")
}
fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_manifest_path() -> PathBuf {
    PathBuf::from("./datasets.json")
}
fn default_update_url() -> String {
    "http://127.0.0.1:8878/api/v0.1/grq/dataset/index".to_string()
}
fn default_processed_queue() -> String {
    "dataset_processed".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    #[serde(default = "default_feed_base_url")]
    pub feed_base_url: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Product directories are created here.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default)]
    pub state: StateSettings,
    #[serde(default)]
    pub handoff: HandoffSettings,
    /// When set, Prometheus text exposition is written here after each run.
    #[serde(default)]
    pub metrics_textfile: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StateSettings {
    File {
        #[serde(default = "default_state_path")]
        path: PathBuf,
    },
    Redis {
        #[serde(default = "default_redis_url")]
        url: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HandoffSettings {
    #[serde(default = "default_manifest_path")]
    pub manifest_path: PathBuf,
    #[serde(default = "default_update_url")]
    pub update_url: String,
    #[serde(default = "default_processed_queue")]
    pub processed_queue: String,
    #[serde(default)]
    pub force: Option<bool>,
    #[serde(default = "default_handoff_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            feed_base_url: default_feed_base_url(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            work_dir: default_work_dir(),
            state: StateSettings::default(),
            handoff: HandoffSettings::default(),
            metrics_textfile: None,
        }
    }
}

impl Default for StateSettings {
    fn default() -> Self {
        Self::File {
            path: default_state_path(),
        }
    }
}

impl Default for HandoffSettings {
    fn default() -> Self {
        Self {
            manifest_path: default_manifest_path(),
            update_url: default_update_url(),
            processed_queue: default_processed_queue(),
            force: None,
            timeout_secs: default_handoff_timeout_secs(),
        }
    }
}

impl Settings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn handoff_timeout(&self) -> Duration {
        Duration::from_secs(self.handoff.timeout_secs)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing eonet settings")
    }

    /// Load settings from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("in settings file {}", path.display()))
    }

    /// Resolve settings, then apply environment overrides:
    /// 1) `explicit` (the `--config` flag)
    /// 2) $EONET_CONFIG_PATH
    /// 3) config/eonet.toml
    /// 4) built-in defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut settings = if let Some(p) = explicit {
            Self::load_from(p)?
        } else if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
            if fallback.exists() {
                Self::load_from(&fallback)?
            } else {
                Self::default()
            }
        };
        settings.apply_env_overrides();
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        let var = |k: &str| std::env::var(k).ok().filter(|v| !v.trim().is_empty());

        if let Some(url) = var("EONET_FEED_URL") {
            self.feed_base_url = url;
        }
        if let Some(dir) = var("EONET_WORK_DIR") {
            self.work_dir = PathBuf::from(dir);
        }
        if let Some(url) = var("EONET_REDIS_URL") {
            self.state = StateSettings::Redis { url };
        }
        if let Some(url) = var("EONET_HANDOFF_URL") {
            self.handoff.update_url = url;
        }
    }
}
