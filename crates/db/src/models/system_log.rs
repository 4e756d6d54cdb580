//! System (lifecycle) log model.

use seatwatch_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `system_logs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SystemLog {
    pub id: i64,
    pub store_id: String,
    pub log_level: String,
    pub component: String,
    pub message: String,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
}
