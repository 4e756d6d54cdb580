//! Repository for the `system_logs` table.

use sqlx::PgPool;

use crate::models::system_log::SystemLog;

const COLUMNS: &str = "id, store_id, log_level, component, message, metadata, created_at";

pub struct SystemLogRepo;

impl SystemLogRepo {
    pub async fn insert(
        pool: &PgPool,
        store_id: &str,
        log_level: &str,
        component: &str,
        message: &str,
        metadata: &serde_json::Value,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO system_logs (store_id, log_level, component, message, metadata) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(store_id)
        .bind(log_level)
        .bind(component)
        .bind(message)
        .bind(metadata)
        .fetch_one(pool)
        .await
    }

    /// Recent records of one component, newest first.
    pub async fn list_recent(
        pool: &PgPool,
        store_id: &str,
        component: &str,
        limit: i64,
    ) -> Result<Vec<SystemLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM system_logs \
             WHERE store_id = $1 AND component = $2 \
             ORDER BY created_at DESC, id DESC LIMIT $3"
        );
        sqlx::query_as::<_, SystemLog>(&query)
            .bind(store_id)
            .bind(component)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
