//! [`StateStore`] backed by PostgreSQL.

use async_trait::async_trait;
use seatwatch_core::differ::{StatusUpdatePayload, TransitionEvent};
use seatwatch_core::error::StoreError;
use seatwatch_core::store::{LifecycleRecord, StateStore};
use seatwatch_core::zone::{StoreSite, Zone, ZoneState};

use crate::repositories::{StoreRepo, SystemLogRepo, ZoneEventRepo, ZoneRepo, ZoneStatusRepo};
use crate::DbPool;

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Shared by every channel worker; the pool handles concurrent access.
#[derive(Clone)]
pub struct PgStateStore {
    pool: DbPool,
}

impl PgStateStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for PgStateStore {
    async fn get_store(&self, store_id: &str) -> Result<Option<StoreSite>, StoreError> {
        let row = StoreRepo::find_by_id(&self.pool, store_id)
            .await
            .map_err(backend)?;
        Ok(row.map(StoreSite::from))
    }

    async fn get_zones(&self, store_id: &str, active_only: bool) -> Result<Vec<Zone>, StoreError> {
        let rows = ZoneRepo::list_by_store(&self.pool, store_id, active_only)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().map(Zone::from).collect())
    }

    async fn get_zone_status(
        &self,
        store_id: &str,
        zone_id: &str,
    ) -> Result<Option<ZoneState>, StoreError> {
        ZoneStatusRepo::find(&self.pool, store_id, zone_id)
            .await
            .map_err(backend)?
            .map(ZoneState::try_from)
            .transpose()
    }

    async fn upsert_zone_status(
        &self,
        store_id: &str,
        zone_id: &str,
        payload: &StatusUpdatePayload,
    ) -> Result<(), StoreError> {
        ZoneStatusRepo::upsert(&self.pool, store_id, zone_id, payload)
            .await
            .map_err(backend)
    }

    async fn append_event(&self, event: &TransitionEvent) -> Result<(), StoreError> {
        let id = ZoneEventRepo::insert(&self.pool, event)
            .await
            .map_err(backend)?;
        tracing::debug!(
            event_id = id,
            zone_id = %event.zone_id,
            event_type = %event.event_type,
            "Zone event recorded"
        );
        Ok(())
    }

    async fn append_lifecycle_log(&self, record: &LifecycleRecord) -> Result<(), StoreError> {
        SystemLogRepo::insert(
            &self.pool,
            &record.store_id,
            record.level.as_str(),
            &record.component,
            &record.message,
            &record.metadata,
        )
        .await
        .map(|_| ())
        .map_err(backend)
    }
}
