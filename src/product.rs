//! # Product Builder
//! One product per (event, geometry): a dataset record carrying the label and
//! spatial/temporal envelope, plus the event snapshot as metadata. Products are
//! materialized as `<work_dir>/<label>/<label>.{dataset,met}.json`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{IdentityError, ProductError};
use crate::feed::types::Event;
use crate::geometry::{location_for, Location};
use crate::identity::{derive_id, VERSION};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub label: String,
    pub starttime: String,
    pub endtime: String,
    pub location: Location,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub dataset: Dataset,
    /// The event snapshot exactly as read from the feed.
    pub metadata: Event,
}

impl Product {
    pub fn label(&self) -> &str {
        &self.dataset.label
    }

    pub fn dataset_file_name(&self) -> String {
        format!("{}.dataset.json", self.label())
    }

    pub fn met_file_name(&self) -> String {
        format!("{}.met.json", self.label())
    }
}

/// Build the product for an event. The last geometry describes the dataset;
/// the event itself, all geometries included, is the metadata.
pub fn build_product(observation: &Event) -> Result<Product, ProductError> {
    let label = derive_id(observation)?;
    let geometry = observation
        .geometries
        .last()
        .ok_or_else(|| IdentityError::new(observation, "no geometries"))?;
    let time = geometry
        .date
        .clone()
        .ok_or_else(|| IdentityError::new(observation, "last geometry has no date"))?;
    let location = location_for(geometry)?;

    Ok(Product {
        dataset: Dataset {
            label,
            starttime: time.clone(),
            endtime: time,
            location,
            version: VERSION.to_string(),
        },
        metadata: observation.clone(),
    })
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ProductError> {
    let bytes = serde_json::to_vec(value)?;
    fs::write(path, bytes)
        .await
        .map_err(|source| ProductError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Write both product files; an existing directory for the same label is
/// reused and its files overwritten.
pub async fn write_product_dir(work_dir: &Path, product: &Product) -> Result<PathBuf, ProductError> {
    let dir = work_dir.join(product.label());
    fs::create_dir_all(&dir)
        .await
        .map_err(|source| ProductError::Io {
            path: dir.clone(),
            source,
        })?;

    write_json(&dir.join(product.dataset_file_name()), &product.dataset).await?;
    write_json(&dir.join(product.met_file_name()), &product.metadata).await?;
    Ok(dir)
}

/// Structured equivalent of the "Publishing Event ID" banner.
pub fn log_published(product: &Product) {
    let meta = &product.metadata;
    tracing::info!(
        label = %product.label(),
        event = %meta.title,
        source = meta.first_source_id().unwrap_or_default(),
        event_time = %product.dataset.starttime,
        version = %product.dataset.version,
        "publishing event product"
    );
}
