//! Product labels.
//!
//! `EVENT-{CATEGORY}-{source}-{event id}-{YYYYMMDDTHHMMSS}-{version}`. The
//! timestamp comes from the last geometry, so the same feed event republished
//! with a newer observation gets a new label while a rerun over the same
//! observation reproduces the old one.

use crate::error::IdentityError;
use crate::feed::types::Event;
use crate::timefmt::compact_timestamp;

pub const PRODUCT_PREFIX: &str = "EVENT";
pub const VERSION: &str = "v1.0";

pub fn derive_id(event: &Event) -> Result<String, IdentityError> {
    let category = event
        .categories
        .first()
        .ok_or_else(|| IdentityError::new(event, "no categories"))?
        .title
        .to_uppercase();
    let source = event
        .first_source_id()
        .ok_or_else(|| IdentityError::new(event, "no sources"))?;
    let geometry = event
        .geometries
        .last()
        .ok_or_else(|| IdentityError::new(event, "no geometries"))?;
    let date = geometry
        .date
        .as_deref()
        .ok_or_else(|| IdentityError::new(event, "last geometry has no date"))?;
    let stamp =
        compact_timestamp(date).ok_or_else(|| IdentityError::new(event, "unparseable date"))?;

    // The label names a directory under the work dir, so it must stay one
    // path component whatever the feed ids contain.
    Ok(format!(
        "{PRODUCT_PREFIX}-{}-{}-{}-{stamp}-{VERSION}",
        path_safe(&category),
        path_safe(source),
        path_safe(&event.id)
    ))
}

fn path_safe(part: &str) -> String {
    part.replace(['/', '\\', '\0'], "_")
}
