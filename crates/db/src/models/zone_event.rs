//! Zone transition event model.

use seatwatch_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `zone_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ZoneEventRow {
    pub id: i64,
    pub store_id: String,
    pub zone_id: String,
    pub channel_id: i32,
    pub event_type: String,
    pub previous_status: String,
    pub new_status: String,
    pub person_detected: bool,
    pub object_detected: bool,
    pub confidence: f64,
    pub bbox_x1: Option<i32>,
    pub bbox_y1: Option<i32>,
    pub bbox_x2: Option<i32>,
    pub bbox_y2: Option<i32>,
    /// `{"detections_count": n, "iou": f}`.
    pub metadata: serde_json::Value,
    pub occurred_at: Timestamp,
}
