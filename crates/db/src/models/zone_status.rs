//! Current zone status model.

use seatwatch_core::error::StoreError;
use seatwatch_core::types::Timestamp;
use seatwatch_core::zone::{ZoneState, ZoneStatus};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `zone_status` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ZoneStatusRow {
    pub store_id: String,
    pub zone_id: String,
    pub status: String,
    pub detection_confidence: f64,
    pub person_detected: bool,
    pub object_detected: bool,
    pub last_person_seen: Option<Timestamp>,
    pub last_empty_time: Option<Timestamp>,
    pub vacant_duration_seconds: i64,
    pub abandoned_timer_seconds: i64,
    pub updated_at: Timestamp,
}

impl TryFrom<ZoneStatusRow> for ZoneState {
    type Error = StoreError;

    fn try_from(row: ZoneStatusRow) -> Result<Self, Self::Error> {
        let status: ZoneStatus = row.status.parse().map_err(|e| StoreError::Malformed {
            entity: "zone_status",
            id: row.zone_id.clone(),
            reason: format!("{e}"),
        })?;

        Ok(ZoneState {
            status,
            confidence: row.detection_confidence,
            abandoned_timer_seconds: u64::try_from(row.abandoned_timer_seconds).unwrap_or(0),
            last_person_seen_at: row.last_person_seen,
            last_empty_since: row.last_empty_time,
        })
    }
}
