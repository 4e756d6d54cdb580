//! Zone (seat) configuration, per-zone state, and raw detections.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::geometry::{polygon_bounds, BoundingBox, Point};
use crate::types::{ChannelId, Timestamp, ZoneId};

// ---------------------------------------------------------------------------
// ZoneStatus
// ---------------------------------------------------------------------------

/// Occupancy classification of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneStatus {
    #[default]
    Empty,
    Occupied,
    Abandoned,
}

impl ZoneStatus {
    /// String representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneStatus::Empty => "empty",
            ZoneStatus::Occupied => "occupied",
            ZoneStatus::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for ZoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ZoneStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "empty" => Ok(ZoneStatus::Empty),
            "occupied" => Ok(ZoneStatus::Occupied),
            "abandoned" => Ok(ZoneStatus::Abandoned),
            other => Err(CoreError::Validation(format!(
                "Unknown zone status '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Zone
// ---------------------------------------------------------------------------

/// A configured region of one channel's frame that maps to a physical seat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub zone_id: ZoneId,
    pub channel_id: ChannelId,
    /// Polygon vertices in image coordinates.
    pub region: Vec<Point>,
    pub label: Option<String>,
    pub is_active: bool,
}

impl Zone {
    /// Bounding box of the region, or `None` if no vertices are configured.
    pub fn bounds(&self) -> Option<BoundingBox> {
        polygon_bounds(&self.region)
    }

    /// Label for log output, falling back to the zone id.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.zone_id)
    }
}

/// Select the zones a channel worker is responsible for.
///
/// Keeps zones on `channel_id` that have at least one region vertex,
/// preserving input order.
pub fn zones_for_channel(zones: &[Zone], channel_id: ChannelId) -> Vec<Zone> {
    zones
        .iter()
        .filter(|z| z.channel_id == channel_id && !z.region.is_empty())
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// ZoneState
// ---------------------------------------------------------------------------

/// The last-known state of a single zone.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ZoneState {
    pub status: ZoneStatus,
    /// Match confidence (max IoU) when occupied, otherwise 0.
    pub confidence: f64,
    /// Seconds an unattended object has been seen with no person present.
    pub abandoned_timer_seconds: u64,
    pub last_person_seen_at: Option<Timestamp>,
    /// Start of the current empty run.
    pub last_empty_since: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// What a detection box contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionClass {
    Person,
    /// A belonging that can be left behind (bag, laptop, ...).
    Object(String),
}

/// One bounding box returned by the detection model for a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class: DetectionClass,
    pub score: f64,
}

impl Detection {
    pub fn person(bbox: BoundingBox, score: f64) -> Self {
        Self {
            bbox,
            class: DetectionClass::Person,
            score,
        }
    }

    pub fn object(label: impl Into<String>, bbox: BoundingBox, score: f64) -> Self {
        Self {
            bbox,
            class: DetectionClass::Object(label.into()),
            score,
        }
    }

    pub fn is_person(&self) -> bool {
        matches!(self.class, DetectionClass::Person)
    }
}

// ---------------------------------------------------------------------------
// StoreSite
// ---------------------------------------------------------------------------

/// A monitored store and the DVR endpoint overrides it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSite {
    pub store_id: String,
    pub store_name: String,
    pub rtsp_host: Option<String>,
    pub rtsp_port: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(id: &str, channel_id: ChannelId, region: Vec<Point>) -> Zone {
        Zone {
            zone_id: id.to_string(),
            channel_id,
            region,
            label: None,
            is_active: true,
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [ZoneStatus::Empty, ZoneStatus::Occupied, ZoneStatus::Abandoned] {
            assert_eq!(status.as_str().parse::<ZoneStatus>().unwrap(), status);
        }
        assert!("vacant".parse::<ZoneStatus>().is_err());
    }

    #[test]
    fn channel_filter_drops_other_channels_and_empty_regions() {
        let square = vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)];
        let zones = vec![
            zone("A1", 1, square.clone()),
            zone("A2", 2, square.clone()),
            zone("A3", 1, Vec::new()),
            zone("A4", 1, square),
        ];

        let picked: Vec<_> = zones_for_channel(&zones, 1)
            .into_iter()
            .map(|z| z.zone_id)
            .collect();
        assert_eq!(picked, vec!["A1", "A4"]);
    }

    #[test]
    fn display_label_falls_back_to_id() {
        let mut z = zone("B2", 1, Vec::new());
        assert_eq!(z.display_label(), "B2");
        z.label = Some("Window seat".into());
        assert_eq!(z.display_label(), "Window seat");
    }
}
