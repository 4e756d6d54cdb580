//! In-process [`StateStore`] used by tests and local dry runs.
//!
//! Holds everything in a single mutex. Writes can be made to fail on
//! demand to exercise the store-error paths of the worker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::differ::{StatusUpdatePayload, TransitionEvent};
use crate::error::StoreError;
use crate::store::{LifecycleRecord, StateStore};
use crate::zone::{StoreSite, Zone, ZoneState};

#[derive(Default)]
struct Inner {
    stores: HashMap<String, StoreSite>,
    zones: HashMap<String, Vec<Zone>>,
    /// Keyed by `(store_id, zone_id)`.
    statuses: HashMap<(String, String), StatusUpdatePayload>,
    events: Vec<TransitionEvent>,
    lifecycle: Vec<LifecycleRecord>,
}

/// Thread-safe in-memory state store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_writes: AtomicBool,
    zone_loads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a store and its zones.
    pub fn with_store(self, site: StoreSite, zones: Vec<Zone>) -> Self {
        {
            let mut inner = self.lock();
            inner.zones.insert(site.store_id.clone(), zones);
            inner.stores.insert(site.store_id.clone(), site);
        }
        self
    }

    /// Seed a zone's persisted status row.
    pub fn seed_status(&self, store_id: &str, zone_id: &str, payload: StatusUpdatePayload) {
        self.lock()
            .statuses
            .insert((store_id.to_string(), zone_id.to_string()), payload);
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `get_zones` calls served so far.
    pub fn zone_loads(&self) -> usize {
        self.zone_loads.load(Ordering::SeqCst)
    }

    pub fn status(&self, store_id: &str, zone_id: &str) -> Option<StatusUpdatePayload> {
        self.lock()
            .statuses
            .get(&(store_id.to_string(), zone_id.to_string()))
            .cloned()
    }

    pub fn events(&self) -> Vec<TransitionEvent> {
        self.lock().events.clone()
    }

    pub fn lifecycle(&self) -> Vec<LifecycleRecord> {
        self.lock().lifecycle.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get_store(&self, store_id: &str) -> Result<Option<StoreSite>, StoreError> {
        Ok(self.lock().stores.get(store_id).cloned())
    }

    async fn get_zones(&self, store_id: &str, active_only: bool) -> Result<Vec<Zone>, StoreError> {
        self.zone_loads.fetch_add(1, Ordering::SeqCst);
        let zones = self.lock().zones.get(store_id).cloned().unwrap_or_default();
        Ok(zones
            .into_iter()
            .filter(|z| !active_only || z.is_active)
            .collect())
    }

    async fn get_zone_status(
        &self,
        store_id: &str,
        zone_id: &str,
    ) -> Result<Option<ZoneState>, StoreError> {
        Ok(self.status(store_id, zone_id).map(|p| p.to_state()))
    }

    async fn upsert_zone_status(
        &self,
        store_id: &str,
        zone_id: &str,
        payload: &StatusUpdatePayload,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        self.seed_status(store_id, zone_id, payload.clone());
        Ok(())
    }

    async fn append_event(&self, event: &TransitionEvent) -> Result<(), StoreError> {
        self.check_writable()?;
        self.lock().events.push(event.clone());
        Ok(())
    }

    async fn append_lifecycle_log(&self, record: &LifecycleRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        self.lock().lifecycle.push(record.clone());
        Ok(())
    }
}
