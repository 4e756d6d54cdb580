//! Repository for the `zones` table.

use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::zone::{CreateZone, ZoneRow};

/// Column list for `zones` queries.
const COLUMNS: &str =
    "store_id, zone_id, channel_id, region, label, is_active, created_at, updated_at";

pub struct ZoneRepo;

impl ZoneRepo {
    /// List zones of a store ordered by channel then zone id.
    pub async fn list_by_store(
        pool: &PgPool,
        store_id: &str,
        active_only: bool,
    ) -> Result<Vec<ZoneRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM zones \
             WHERE store_id = $1 AND (is_active OR NOT $2) \
             ORDER BY channel_id, zone_id"
        );
        sqlx::query_as::<_, ZoneRow>(&query)
            .bind(store_id)
            .bind(active_only)
            .fetch_all(pool)
            .await
    }

    pub async fn create(
        pool: &PgPool,
        store_id: &str,
        input: &CreateZone,
    ) -> Result<ZoneRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO zones (store_id, zone_id, channel_id, region, label, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ZoneRow>(&query)
            .bind(store_id)
            .bind(&input.zone_id)
            .bind(input.channel_id)
            .bind(Json(&input.region))
            .bind(&input.label)
            .bind(input.is_active)
            .fetch_one(pool)
            .await
    }
}
