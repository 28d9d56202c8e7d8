// src/feed/types.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Top-level EONET response: `{"title": ..., "events": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedResponse {
    pub events: Vec<Event>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One natural event as published by the feed.
///
/// Fields the pipeline does not interpret (`description`, `link`, `closed`,
/// ...) are kept in `extra` so the metadata record carries them through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default, alias = "geometry")]
    pub geometries: Vec<Geometry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub id: Value,
    pub title: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One dated observation of an event (`Point` or `Polygon`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub coordinates: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Geometry {
    pub fn is_point(&self) -> bool {
        self.kind.eq_ignore_ascii_case("point")
    }
}

impl Event {
    /// Copy of this event carrying only `geometries`.
    pub fn with_geometries(&self, geometries: Vec<Geometry>) -> Self {
        Self {
            id: self.id.clone(),
            title: self.title.clone(),
            sources: self.sources.clone(),
            categories: self.categories.clone(),
            geometries,
            extra: self.extra.clone(),
        }
    }

    /// One single-geometry snapshot per geometry, in feed order.
    pub fn observations(&self) -> impl Iterator<Item = Event> + '_ {
        self.geometries
            .iter()
            .map(|g| self.with_geometries(vec![g.clone()]))
    }

    pub fn first_source_id(&self) -> Option<&str> {
        self.sources.first().map(|s| s.id.as_str())
    }
}
