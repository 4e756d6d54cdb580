//! Repository for the append-only `zone_events` table.

use seatwatch_core::differ::TransitionEvent;
use sqlx::PgPool;

use crate::models::zone_event::ZoneEventRow;

/// Column list for `zone_events` queries.
const COLUMNS: &str = "id, store_id, zone_id, channel_id, event_type, previous_status, \
                       new_status, person_detected, object_detected, confidence, \
                       bbox_x1, bbox_y1, bbox_x2, bbox_y2, metadata, occurred_at";

pub struct ZoneEventRepo;

impl ZoneEventRepo {
    /// Append a transition event, returning the generated ID.
    pub async fn insert(pool: &PgPool, event: &TransitionEvent) -> Result<i64, sqlx::Error> {
        let corner = |v: f64| v.round() as i32;
        let bbox = event.bbox;
        let metadata = serde_json::json!({
            "detections_count": event.detections_count,
            "iou": event.max_iou,
        });

        sqlx::query_scalar(
            "INSERT INTO zone_events \
                (store_id, zone_id, channel_id, event_type, previous_status, new_status, \
                 person_detected, object_detected, confidence, \
                 bbox_x1, bbox_y1, bbox_x2, bbox_y2, metadata, occurred_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING id",
        )
        .bind(&event.store_id)
        .bind(&event.zone_id)
        .bind(event.channel_id)
        .bind(event.event_type.as_str())
        .bind(event.previous_status.as_str())
        .bind(event.new_status.as_str())
        .bind(event.person_detected)
        .bind(event.object_detected)
        .bind(event.confidence)
        .bind(bbox.map(|b| corner(b.x1)))
        .bind(bbox.map(|b| corner(b.y1)))
        .bind(bbox.map(|b| corner(b.x2)))
        .bind(bbox.map(|b| corner(b.y2)))
        .bind(metadata)
        .bind(event.occurred_at)
        .fetch_one(pool)
        .await
    }

    /// Events of one zone, newest first.
    pub async fn list_for_zone(
        pool: &PgPool,
        store_id: &str,
        zone_id: &str,
        limit: i64,
    ) -> Result<Vec<ZoneEventRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM zone_events \
             WHERE store_id = $1 AND zone_id = $2 \
             ORDER BY occurred_at DESC, id DESC LIMIT $3"
        );
        sqlx::query_as::<_, ZoneEventRow>(&query)
            .bind(store_id)
            .bind(zone_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
