// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod timefmt;

// Feed types, query construction and the EONET client
pub mod feed;

// Event normalization: geometry, identity, filtering, products
pub mod filter;
pub mod geometry;
pub mod identity;
pub mod product;

// Collaborators and orchestration
pub mod driver;
pub mod handoff;
pub mod metrics;
pub mod state;

// ---- Re-exports for stable public API ----
pub use crate::driver::{BatchReport, RunDriver, RunOptions};
pub use crate::error::{ProductError, RunError};
pub use crate::feed::{Event, Geometry};
pub use crate::filter::{filter_batch, CoverageWindow};
pub use crate::geometry::{build_polygon, normalize_polygon, Region};
pub use crate::identity::derive_id;
pub use crate::product::{build_product, Product};
