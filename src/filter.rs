//! # Event Filter
//! Reduces a raw feed batch to the events (and, within them, the geometries)
//! that fall inside a coverage window. Every stage builds new event snapshots;
//! the input batch is never modified.

use chrono::{DateTime, Utc};
use metrics::counter;

use crate::feed::types::{Event, Geometry};
use crate::geometry::Region;
use crate::timefmt::parse_timestamp;

/// Temporal range and/or spatial region. Each part is optional and applied
/// independently of the other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageWindow {
    pub starttime: Option<DateTime<Utc>>,
    pub endtime: Option<DateTime<Utc>>,
    pub region: Option<Region>,
}

impl CoverageWindow {
    /// The temporal filter only applies when both ends are set.
    pub fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.starttime.zip(self.endtime)
    }

    /// Strictly between start and end; both boundaries are excluded.
    pub fn covers_time(&self, geometry: &Geometry) -> bool {
        let Some((start, end)) = self.time_range() else {
            return true;
        };
        let Some(date) = geometry.date.as_deref() else {
            return false;
        };
        match parse_timestamp(date) {
            Some(at) => at > start && at < end,
            None => {
                tracing::warn!(date, "dropping geometry with unparseable date");
                false
            }
        }
    }

    pub fn covers_space(&self, geometry: &Geometry) -> bool {
        let Some(region) = &self.region else {
            return true;
        };
        match region.intersects(geometry) {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, "dropping geometry with malformed shape");
                false
            }
        }
    }
}

/// Events whose `geometries` are reduced to the surviving subset; events with
/// nothing left are dropped.
pub fn filter_batch(events: &[Event], window: &CoverageWindow) -> Vec<Event> {
    let dated = events
        .iter()
        .map(|ev| {
            ev.with_geometries(
                ev.geometries
                    .iter()
                    .filter(|g| g.date.is_some())
                    .cloned()
                    .collect(),
            )
        })
        .filter(|ev| !ev.geometries.is_empty());

    let mut kept = Vec::new();
    for ev in dated {
        let in_region: Vec<Geometry> = ev
            .geometries
            .iter()
            .filter(|g| window.covers_space(g))
            .cloned()
            .collect();
        let in_window: Vec<Geometry> = in_region
            .into_iter()
            .filter(|g| window.covers_time(g))
            .collect();
        if in_window.is_empty() {
            continue;
        }
        kept.push(ev.with_geometries(in_window));
    }

    counter!("eonet_events_kept_total").increment(kept.len() as u64);
    counter!("eonet_events_filtered_total")
        .increment(events.len().saturating_sub(kept.len()) as u64);
    tracing::debug!(input = events.len(), kept = kept.len(), "filtered batch");
    kept
}
