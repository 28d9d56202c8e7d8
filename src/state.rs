//! Last-run timestamp store.
//!
//! Read once when the lookback window is derived from state, written once when
//! a run finishes. Runs never overlap, so no locking beyond what each backend
//! does internally.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::fs;

use crate::config::StateSettings;
use crate::error::StateError;

/// Key holding the time of the last successful feed query.
pub const LAST_QUERY_KEY: &str = "eonet_last_query";

#[async_trait]
pub trait RunStateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StateError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StateError>;
}

/// Build the backend named in the settings. Redis connects lazily on first use.
pub fn from_settings(settings: &StateSettings) -> Result<Box<dyn RunStateStore>, StateError> {
    match settings {
        StateSettings::File { path } => Ok(Box::new(FileStateStore::new(path))),
        #[cfg(feature = "redis-state")]
        StateSettings::Redis { url } => Ok(Box::new(RedisStateStore::new(url))),
        #[cfg(not(feature = "redis-state"))]
        StateSettings::Redis { .. } => Err(StateError::Config(
            "redis state backend requires the `redis-state` feature".into(),
        )),
    }
}

// ---- JSON file --------------------------------------------------------------

/// `{ "<key>": "<value>" }` in a single JSON file.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>, StateError> {
        match fs::read_to_string(&self.path).await {
            Ok(s) if s.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(s) => serde_json::from_str(&s).map_err(|source| StateError::Corrupt {
                path: self.path.clone(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(source) => Err(StateError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[async_trait]
impl RunStateStore for FileStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StateError> {
        let mut all = self.read_all().await?;
        all.insert(key.to_string(), value.to_string());

        let io_err = |source| StateError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let body = serde_json::to_vec_pretty(&all).map_err(|source| StateError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, body).await.map_err(io_err)
    }
}

// ---- in-memory --------------------------------------------------------------

/// Process-local store for dry runs and tests.
#[derive(Default)]
pub struct MemoryStateStore {
    inner: Mutex<BTreeMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::default();
        if let Ok(mut m) = store.inner.lock() {
            m.insert(key.to_string(), value.to_string());
        }
        store
    }
}

#[async_trait]
impl RunStateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        let m = self
            .inner
            .lock()
            .map_err(|_| StateError::Config("state mutex poisoned".into()))?;
        Ok(m.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StateError> {
        let mut m = self
            .inner
            .lock()
            .map_err(|_| StateError::Config("state mutex poisoned".into()))?;
        m.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ---- Redis ------------------------------------------------------------------

#[cfg(feature = "redis-state")]
pub use redis::RedisStateStore;

#[cfg(feature = "redis-state")]
mod redis {
    use async_trait::async_trait;
    use fred::prelude::*;
    use tokio::sync::OnceCell;

    use super::RunStateStore;
    use crate::error::StateError;

    /// Redis-compatible store. The connection is opened on first access and
    /// owned by this handle; nothing is shared process-wide.
    pub struct RedisStateStore {
        url: String,
        client: OnceCell<Client>,
    }

    impl RedisStateStore {
        pub fn new(url: &str) -> Self {
            Self {
                url: url.to_string(),
                client: OnceCell::new(),
            }
        }

        async fn client(&self) -> Result<&Client, StateError> {
            self.client
                .get_or_try_init(|| async {
                    let config = Config::from_url(&self.url)
                        .map_err(|e| StateError::Config(format!("invalid redis url: {e}")))?;
                    let client = Builder::from_config(config).build()?;
                    client.init().await?;
                    tracing::info!(url = %self.url, "connected to run-state redis");
                    Ok(client)
                })
                .await
        }
    }

    #[async_trait]
    impl RunStateStore for RedisStateStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StateError> {
            let value: Option<String> = self.client().await?.get(key).await?;
            Ok(value)
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StateError> {
            let _: () = self
                .client()
                .await?
                .set(key, value, None, None, false)
                .await?;
            Ok(())
        }
    }
}
