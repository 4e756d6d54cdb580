//! Repository for the `stores` table.

use sqlx::PgPool;

use crate::models::store::Store;

/// Column list for `stores` queries.
const COLUMNS: &str = "store_id, store_name, rtsp_host, rtsp_port, created_at, updated_at";

pub struct StoreRepo;

impl StoreRepo {
    pub async fn find_by_id(pool: &PgPool, store_id: &str) -> Result<Option<Store>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM stores WHERE store_id = $1");
        sqlx::query_as::<_, Store>(&query)
            .bind(store_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a store, returning the stored row.
    pub async fn create(
        pool: &PgPool,
        store_id: &str,
        store_name: &str,
        rtsp_host: Option<&str>,
        rtsp_port: Option<i32>,
    ) -> Result<Store, sqlx::Error> {
        let query = format!(
            "INSERT INTO stores (store_id, store_name, rtsp_host, rtsp_port) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Store>(&query)
            .bind(store_id)
            .bind(store_name)
            .bind(rtsp_host)
            .bind(rtsp_port)
            .fetch_one(pool)
            .await
    }
}
