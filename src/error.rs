//! Error taxonomy for the ingest run.
//!
//! Run-level errors ([`RunError`]) abort the run before anything is recorded.
//! Product-level errors ([`ProductError`]) are caught at the "build one
//! product" boundary and reported in the batch report instead.

use std::path::PathBuf;

use crate::feed::types::Event;

/// The feed could not be queried or its response could not be read.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("query failed: {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{status} status for query: {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("unreadable feed response for {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("building feed client: {0}")]
    Client(#[source] reqwest::Error),
}

/// The spatial filter given by the caller is not a usable polygon.
#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    #[error("region is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("region is not a polygon: {0}")]
    Shape(String),
}

/// A geometry payload that cannot be turned into a shape.
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("malformed {kind} coordinates: {detail}")]
    Malformed { kind: String, detail: String },

    #[error("unsupported geometry type: {0}")]
    Unsupported(String),
}

impl GeometryError {
    pub(crate) fn malformed(kind: &str, detail: impl Into<String>) -> Self {
        Self::Malformed {
            kind: kind.to_string(),
            detail: detail.into(),
        }
    }
}

/// An event that lacks the fields needed to build its product label.
#[derive(Debug, thiserror::Error)]
#[error("cannot derive product id for event {}: {reason}", .event.id)]
pub struct IdentityError {
    pub reason: &'static str,
    pub event: Box<Event>,
}

impl IdentityError {
    pub fn new(event: &Event, reason: &'static str) -> Self {
        Self {
            reason,
            event: Box::new(event.clone()),
        }
    }
}

/// The downstream ingest did not accept a product.
#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error("handoff of {label} failed: {source}")]
    Transport {
        label: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("handoff of {label} rejected: {reason}")]
    Rejected { label: String, reason: String },

    #[error("reading product file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("product file {} is not valid JSON: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Reading or writing the last-run timestamp failed.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[cfg(feature = "redis-state")]
    #[error("redis error: {0}")]
    Redis(#[from] fred::error::Error),

    #[error("state configuration error: {0}")]
    Config(String),

    #[error("stored value for {key} is not a timestamp: {value}")]
    Unparseable { key: String, value: String },
}

/// Failure while building or publishing a single product.
#[derive(Debug, thiserror::Error)]
pub enum ProductError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("writing {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serializing product: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Handoff(#[from] HandoffError),
}

/// Fatal errors: the run stops and nothing is recorded.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    InvalidRegion(#[from] RegionError),

    #[error("invalid query: {0}")]
    Query(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("bundled test event is unreadable: {0}")]
    TestEvent(#[source] serde_json::Error),
}
