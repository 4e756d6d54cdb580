//! Repository for the `zone_status` table.

use seatwatch_core::differ::StatusUpdatePayload;
use sqlx::PgPool;

use crate::models::zone_status::ZoneStatusRow;

/// Column list for `zone_status` queries.
const COLUMNS: &str = "store_id, zone_id, status, detection_confidence, person_detected, \
                       object_detected, last_person_seen, last_empty_time, \
                       vacant_duration_seconds, abandoned_timer_seconds, updated_at";

pub struct ZoneStatusRepo;

impl ZoneStatusRepo {
    pub async fn find(
        pool: &PgPool,
        store_id: &str,
        zone_id: &str,
    ) -> Result<Option<ZoneStatusRow>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM zone_status WHERE store_id = $1 AND zone_id = $2");
        sqlx::query_as::<_, ZoneStatusRow>(&query)
            .bind(store_id)
            .bind(zone_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert or overwrite the status row of a zone.
    pub async fn upsert(
        pool: &PgPool,
        store_id: &str,
        zone_id: &str,
        payload: &StatusUpdatePayload,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO zone_status \
                (store_id, zone_id, status, detection_confidence, person_detected, \
                 object_detected, last_person_seen, last_empty_time, \
                 vacant_duration_seconds, abandoned_timer_seconds, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (store_id, zone_id) DO UPDATE SET \
                status = EXCLUDED.status, \
                detection_confidence = EXCLUDED.detection_confidence, \
                person_detected = EXCLUDED.person_detected, \
                object_detected = EXCLUDED.object_detected, \
                last_person_seen = EXCLUDED.last_person_seen, \
                last_empty_time = EXCLUDED.last_empty_time, \
                vacant_duration_seconds = EXCLUDED.vacant_duration_seconds, \
                abandoned_timer_seconds = EXCLUDED.abandoned_timer_seconds, \
                updated_at = EXCLUDED.updated_at",
        )
        .bind(store_id)
        .bind(zone_id)
        .bind(payload.status.as_str())
        .bind(payload.confidence)
        .bind(payload.person_detected)
        .bind(payload.object_detected)
        .bind(payload.last_person_seen_at)
        .bind(payload.last_empty_since)
        .bind(i64::try_from(payload.vacant_duration_seconds).unwrap_or(i64::MAX))
        .bind(i64::try_from(payload.abandoned_timer_seconds).unwrap_or(i64::MAX))
        .bind(payload.updated_at)
        .execute(pool)
        .await?;
        Ok(())
    }
}
