// src/feed/mod.rs
pub mod client;
pub mod query;
pub mod types;

pub use client::{EonetFeed, EventFeed};
pub use query::{EventStatus, FeedQuery, Lookback};
pub use types::{Event, FeedResponse, Geometry};
