//! Turns a zone's old and new state into persisted records.
//!
//! Every evaluated zone yields a [`StatusUpdatePayload`] for the
//! current-status row; a [`TransitionEvent`] for the append-only log is
//! produced only when the status actually changed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::BoundingBox;
use crate::occupancy::ZoneObservation;
use crate::types::{ChannelId, Timestamp, ZoneId};
use crate::zone::{ZoneState, ZoneStatus};

// ---------------------------------------------------------------------------
// EventType
// ---------------------------------------------------------------------------

/// Kind of a recorded status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PersonEnter,
    PersonLeave,
    AbandonedDetected,
    ItemRemoved,
    /// Any transition without a dedicated name.
    StatusChange,
}

impl EventType {
    /// String representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PersonEnter => "person_enter",
            EventType::PersonLeave => "person_leave",
            EventType::AbandonedDetected => "abandoned_detected",
            EventType::ItemRemoved => "item_removed",
            EventType::StatusChange => "status_change",
        }
    }

    /// Name the transition `previous -> next`.
    pub fn for_transition(previous: ZoneStatus, next: ZoneStatus) -> Self {
        use ZoneStatus::*;
        match (previous, next) {
            (Empty, Occupied) | (Abandoned, Occupied) => EventType::PersonEnter,
            (Occupied, Empty) => EventType::PersonLeave,
            (Empty, Abandoned) | (Occupied, Abandoned) => EventType::AbandonedDetected,
            (Abandoned, Empty) => EventType::ItemRemoved,
            _ => EventType::StatusChange,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One observed status change of a zone. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub store_id: String,
    pub zone_id: ZoneId,
    pub channel_id: ChannelId,
    pub previous_status: ZoneStatus,
    pub new_status: ZoneStatus,
    pub event_type: EventType,
    pub confidence: f64,
    /// Matched person box, present only when a person was detected.
    pub bbox: Option<BoundingBox>,
    pub person_detected: bool,
    pub object_detected: bool,
    pub max_iou: f64,
    pub detections_count: usize,
    pub occurred_at: Timestamp,
}

/// Values written to a zone's current-status row on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdatePayload {
    pub status: ZoneStatus,
    pub confidence: f64,
    pub person_detected: bool,
    pub object_detected: bool,
    pub last_person_seen_at: Option<Timestamp>,
    pub last_empty_since: Option<Timestamp>,
    pub vacant_duration_seconds: u64,
    pub abandoned_timer_seconds: u64,
    pub updated_at: Timestamp,
}

impl StatusUpdatePayload {
    /// The zone state this payload describes once written.
    pub fn to_state(&self) -> ZoneState {
        ZoneState {
            status: self.status,
            confidence: self.confidence,
            abandoned_timer_seconds: self.abandoned_timer_seconds,
            last_person_seen_at: self.last_person_seen_at,
            last_empty_since: self.last_empty_since,
        }
    }
}

/// Result of diffing one zone.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffOutcome {
    pub event: Option<TransitionEvent>,
    pub payload: StatusUpdatePayload,
}

// ---------------------------------------------------------------------------
// EventDiffer
// ---------------------------------------------------------------------------

/// Diffs zone states for one channel of one store.
#[derive(Debug, Clone)]
pub struct EventDiffer {
    store_id: String,
    channel_id: ChannelId,
}

impl EventDiffer {
    pub fn new(store_id: impl Into<String>, channel_id: ChannelId) -> Self {
        Self {
            store_id: store_id.into(),
            channel_id,
        }
    }

    /// Compare `previous` with the freshly computed `next` state.
    ///
    /// When `next` is empty the vacant duration is measured from
    /// `next.last_empty_since`, which starts at `now` if unset.
    pub fn diff(
        &self,
        zone_id: &str,
        previous: ZoneStatus,
        next: &ZoneState,
        observation: &ZoneObservation,
        now: Timestamp,
    ) -> DiffOutcome {
        let (last_empty_since, vacant_duration_seconds) = if next.status == ZoneStatus::Empty {
            let since = next.last_empty_since.unwrap_or(now);
            let elapsed = (now - since).num_seconds().max(0) as u64;
            (Some(since), elapsed)
        } else {
            (None, 0)
        };

        let person_detected = observation.person_present();

        let payload = StatusUpdatePayload {
            status: next.status,
            confidence: next.confidence,
            person_detected,
            object_detected: observation.object_present,
            last_person_seen_at: next.last_person_seen_at,
            last_empty_since,
            vacant_duration_seconds,
            abandoned_timer_seconds: next.abandoned_timer_seconds,
            updated_at: now,
        };

        let event = (previous != next.status).then(|| TransitionEvent {
            store_id: self.store_id.clone(),
            zone_id: zone_id.to_string(),
            channel_id: self.channel_id,
            previous_status: previous,
            new_status: next.status,
            event_type: EventType::for_transition(previous, next.status),
            confidence: next.confidence,
            bbox: observation
                .matched_detection
                .as_ref()
                .filter(|_| person_detected)
                .map(|d| d.bbox),
            person_detected,
            object_detected: observation.object_present,
            max_iou: observation.max_iou,
            detections_count: observation.detections_count,
            occurred_at: now,
        });

        DiffOutcome { event, payload }
    }
}
