//! Zone configuration model.

use seatwatch_core::geometry::Point;
use seatwatch_core::types::{ChannelId, Timestamp};
use seatwatch_core::zone::Zone;
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `zones` table.
///
/// `region` is a JSON array of `[x, y]` vertices.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ZoneRow {
    pub store_id: String,
    pub zone_id: String,
    pub channel_id: ChannelId,
    pub region: Json<Vec<Point>>,
    pub label: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<ZoneRow> for Zone {
    fn from(row: ZoneRow) -> Self {
        Zone {
            zone_id: row.zone_id,
            channel_id: row.channel_id,
            region: row.region.0,
            label: row.label,
            is_active: row.is_active,
        }
    }
}

/// DTO for inserting a zone.
#[derive(Debug, Clone)]
pub struct CreateZone {
    pub zone_id: String,
    pub channel_id: ChannelId,
    pub region: Vec<Point>,
    pub label: Option<String>,
    pub is_active: bool,
}
