//! Zone occupancy classification and abandoned-item dwell tracking.
//!
//! [`OccupancyEngine`] is pure: it turns one frame's detections into a
//! per-zone [`ZoneObservation`] and folds an observation into the prior
//! [`ZoneState`]. All I/O happens in the channel worker.

use crate::error::CoreError;
use crate::geometry::BoundingBox;
use crate::types::{Timestamp, ZoneId};
use crate::zone::{Detection, Zone, ZoneState, ZoneStatus};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Minimum IoU between a zone and a person box for the zone to count as
/// occupied.
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.3;

/// Seconds between two sampled frames of a channel.
pub const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 3;

/// Dwell time after which an unattended object marks a zone abandoned.
pub const DEFAULT_ABANDON_THRESHOLD_SECS: u64 = 600;

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Tunables for classification and the abandonment policy.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub iou_threshold: f64,
    /// IoU needed for a non-person box to count as an item in the zone.
    pub object_iou_threshold: f64,
    /// Added to the abandoned timer on every object-only tick.
    pub interval_secs: u64,
    pub abandon_threshold_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            object_iou_threshold: DEFAULT_IOU_THRESHOLD,
            interval_secs: DEFAULT_SNAPSHOT_INTERVAL_SECS,
            abandon_threshold_secs: DEFAULT_ABANDON_THRESHOLD_SECS,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, value) in [
            ("iou_threshold", self.iou_threshold),
            ("object_iou_threshold", self.object_iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CoreError::Validation(format!(
                    "{name} must be within [0.0, 1.0], got {value}"
                )));
            }
        }
        if self.interval_secs == 0 {
            return Err(CoreError::Validation(
                "interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ZoneObservation
// ---------------------------------------------------------------------------

/// What one frame shows for one zone.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneObservation {
    pub zone_id: ZoneId,
    /// `Occupied` when a person matched, otherwise `Empty`.
    pub status: ZoneStatus,
    /// Max person IoU when occupied, otherwise 0.
    pub confidence: f64,
    /// Best person IoU seen, whether or not it cleared the threshold.
    pub max_iou: f64,
    /// The person box that produced `confidence`.
    pub matched_detection: Option<Detection>,
    pub object_present: bool,
    /// Total detections in the frame.
    pub detections_count: usize,
}

impl ZoneObservation {
    pub fn person_present(&self) -> bool {
        self.status == ZoneStatus::Occupied
    }
}

/// Index and IoU of the detection that overlaps `zone` the most among
/// those accepted by `filter`.
///
/// Ties keep the earlier detection.
pub fn best_match<F>(zone: &BoundingBox, detections: &[Detection], filter: F) -> Option<(usize, f64)>
where
    F: Fn(&Detection) -> bool,
{
    let mut best: Option<(usize, f64)> = None;
    for (i, det) in detections.iter().enumerate().filter(|(_, d)| filter(*d)) {
        let iou = zone.iou(&det.bbox);
        match best {
            Some((_, best_iou)) if iou <= best_iou => {}
            _ => best = Some((i, iou)),
        }
    }
    best
}

// ---------------------------------------------------------------------------
// OccupancyEngine
// ---------------------------------------------------------------------------

/// Classifies the zones of one channel.
#[derive(Debug, Clone)]
pub struct OccupancyEngine {
    config: EngineConfig,
    /// `(zone_id, bounds)` in configuration order.
    targets: Vec<(ZoneId, BoundingBox)>,
}

impl OccupancyEngine {
    /// Build an engine over `zones`.
    ///
    /// Zones without region vertices are skipped. Returns
    /// [`CoreError::Configuration`] when no usable zone remains, since an
    /// engine with nothing to classify should never run.
    pub fn new(zones: &[Zone], config: EngineConfig) -> Result<Self, CoreError> {
        config.validate()?;

        let targets: Vec<_> = zones
            .iter()
            .filter_map(|z| z.bounds().map(|b| (z.zone_id.clone(), b)))
            .collect();

        if targets.is_empty() {
            return Err(CoreError::Configuration(
                "No zone regions configured for this channel".to_string(),
            ));
        }

        Ok(Self { config, targets })
    }

    pub fn zone_count(&self) -> usize {
        self.targets.len()
    }

    /// Classify every zone against one frame's detections.
    ///
    /// Observations are returned in zone configuration order.
    pub fn classify(&self, detections: &[Detection]) -> Vec<ZoneObservation> {
        self.targets
            .iter()
            .map(|(zone_id, bounds)| {
                let person = best_match(bounds, detections, Detection::is_person);
                let max_iou = person.map_or(0.0, |(_, iou)| iou);
                let occupied = max_iou > 0.0 && max_iou >= self.config.iou_threshold;

                let object_present = best_match(bounds, detections, |d| !d.is_person())
                    .is_some_and(|(_, iou)| iou > 0.0 && iou >= self.config.object_iou_threshold);

                ZoneObservation {
                    zone_id: zone_id.clone(),
                    status: if occupied {
                        ZoneStatus::Occupied
                    } else {
                        ZoneStatus::Empty
                    },
                    confidence: if occupied { max_iou } else { 0.0 },
                    max_iou,
                    matched_detection: person
                        .filter(|_| occupied)
                        .map(|(i, _)| detections[i].clone()),
                    object_present,
                    detections_count: detections.len(),
                }
            })
            .collect()
    }

    /// Fold one observation into the prior state of its zone.
    ///
    /// - person present: `occupied`, timer reset.
    /// - object only: timer grows by one interval; `abandoned` once the
    ///   timer reaches the threshold or if the zone already was.
    /// - neither: `empty`, timer reset.
    pub fn transition(
        &self,
        prior: &ZoneState,
        observation: &ZoneObservation,
        now: Timestamp,
    ) -> ZoneState {
        if observation.person_present() {
            return ZoneState {
                status: ZoneStatus::Occupied,
                confidence: observation.confidence,
                abandoned_timer_seconds: 0,
                last_person_seen_at: Some(now),
                last_empty_since: None,
            };
        }

        if observation.object_present {
            let timer = prior
                .abandoned_timer_seconds
                .saturating_add(self.config.interval_secs);
            let abandoned = timer >= self.config.abandon_threshold_secs
                || prior.status == ZoneStatus::Abandoned;

            return ZoneState {
                status: if abandoned {
                    ZoneStatus::Abandoned
                } else {
                    ZoneStatus::Empty
                },
                confidence: 0.0,
                abandoned_timer_seconds: timer,
                last_person_seen_at: prior.last_person_seen_at,
                last_empty_since: if abandoned {
                    None
                } else {
                    prior.last_empty_since
                },
            };
        }

        ZoneState {
            status: ZoneStatus::Empty,
            confidence: 0.0,
            abandoned_timer_seconds: 0,
            last_person_seen_at: prior.last_person_seen_at,
            last_empty_since: if prior.status == ZoneStatus::Empty {
                prior.last_empty_since
            } else {
                None
            },
        }
    }
}
