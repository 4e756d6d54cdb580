//! Store entity model.

use seatwatch_core::types::Timestamp;
use seatwatch_core::zone::StoreSite;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `stores` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Store {
    pub store_id: String,
    pub store_name: String,
    pub rtsp_host: Option<String>,
    pub rtsp_port: Option<i32>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<Store> for StoreSite {
    fn from(row: Store) -> Self {
        StoreSite {
            store_id: row.store_id,
            store_name: row.store_name,
            rtsp_host: row.rtsp_host.filter(|h| !h.is_empty()),
            rtsp_port: row.rtsp_port.and_then(|p| u16::try_from(p).ok()),
        }
    }
}
