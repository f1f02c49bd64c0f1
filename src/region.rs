//! User-marked parking spaces and their event history.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::Rectangle;

pub const DEFAULT_REGION_LABEL: &str = "vehicle";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    Initialized,
    Occupied,
    Available,
}

impl EventName {
    pub fn for_occupancy(occupied: bool) -> Self {
        if occupied {
            EventName::Occupied
        } else {
            EventName::Available
        }
    }
}

/// One entry in a region's append-only history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionEvent {
    pub event_name: EventName,
    /// epoch milliseconds
    pub time_marked: u64,
    /// Milliseconds the previous state lasted; `None` for the first event.
    pub duration: Option<u64>,
}

/// A parking-space marker drawn by the user.
///
/// `occupied` is tri-state: `None` until the first evaluation completes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkedRegion {
    pub uuid: Uuid,
    #[serde(default = "default_label")]
    pub label: String,
    pub cords: Rectangle,
    #[serde(default)]
    pub area: f64,
    #[serde(default)]
    pub occupied: Option<bool>,
    #[serde(default)]
    pub evaluating: bool,
    #[serde(default)]
    pub hover: bool,
    #[serde(default)]
    pub first_seen: Option<u64>,
    #[serde(default)]
    pub last_seen: Option<u64>,
    #[serde(default)]
    pub cycle_count: u64,
    #[serde(default)]
    pub events: Vec<RegionEvent>,
}

fn default_label() -> String {
    DEFAULT_REGION_LABEL.to_string()
}

/// Area as stored on a region: the rectangle area rounded to whole pixels.
pub(crate) fn rounded_area(cords: &Rectangle) -> f64 {
    cords.area().round()
}

impl MarkedRegion {
    pub(crate) fn new(uuid: Uuid, cords: Rectangle, label: String, now_ms: u64) -> Self {
        Self {
            uuid,
            label,
            area: rounded_area(&cords),
            cords,
            occupied: None,
            evaluating: true,
            hover: false,
            first_seen: None,
            last_seen: None,
            cycle_count: 0,
            events: vec![RegionEvent {
                event_name: EventName::Initialized,
                time_marked: now_ms,
                duration: None,
            }],
        }
    }

    pub fn last_event(&self) -> Option<&RegionEvent> {
        self.events.last()
    }

    /// Close out one evaluation cycle with a definite classification.
    ///
    /// Returns true when the occupancy value changed, in which case an
    /// event was appended.
    pub(crate) fn record_classification(&mut self, occupied: bool, now_ms: u64) -> bool {
        let changed = self.occupied != Some(occupied);
        if changed {
            let duration = self
                .last_event()
                .map(|ev| now_ms.saturating_sub(ev.time_marked));
            self.events.push(RegionEvent {
                event_name: EventName::for_occupancy(occupied),
                time_marked: now_ms,
                duration,
            });
        }
        self.occupied = Some(occupied);
        self.evaluating = false;
        self.first_seen.get_or_insert(now_ms);
        self.last_seen = Some(now_ms);
        self.cycle_count += 1;
        changed
    }
}

/// Persistable form of the whole region collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSnapshot {
    pub selected_regions: Vec<MarkedRegion>,
    /// epoch milliseconds
    pub saved_date: u64,
}
