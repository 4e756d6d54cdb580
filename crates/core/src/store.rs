//! Boundary to the persistent state store.
//!
//! Workers only talk to storage through [`StateStore`]. The store is shared
//! by every channel task; each zone belongs to exactly one channel, so the
//! only atomicity required is a per-row upsert.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::differ::{StatusUpdatePayload, TransitionEvent};
use crate::error::StoreError;
use crate::zone::{StoreSite, Zone, ZoneState};

// ---------------------------------------------------------------------------
// Lifecycle records
// ---------------------------------------------------------------------------

/// Severity of a lifecycle record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured record of a worker lifecycle step (connect, reconnect,
/// fatal termination, shutdown).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleRecord {
    pub store_id: String,
    /// Emitting component, e.g. `channel_3_worker`.
    pub component: String,
    pub level: LogLevel,
    pub message: String,
    pub metadata: serde_json::Value,
}

impl LifecycleRecord {
    pub fn new(
        store_id: impl Into<String>,
        component: impl Into<String>,
        level: LogLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            store_id: store_id.into(),
            component: component.into(),
            level,
            message: message.into(),
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

// ---------------------------------------------------------------------------
// StateStore
// ---------------------------------------------------------------------------

/// Persistent zone configuration, status rows, and event logs.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Look up a store by id; `None` if it is not configured.
    async fn get_store(&self, store_id: &str) -> Result<Option<StoreSite>, StoreError>;

    /// All zones of a store, optionally only the active ones.
    async fn get_zones(&self, store_id: &str, active_only: bool) -> Result<Vec<Zone>, StoreError>;

    /// Last persisted state of a zone, if any was ever written.
    async fn get_zone_status(
        &self,
        store_id: &str,
        zone_id: &str,
    ) -> Result<Option<ZoneState>, StoreError>;

    /// Insert or replace the current-status row of a zone.
    async fn upsert_zone_status(
        &self,
        store_id: &str,
        zone_id: &str,
        payload: &StatusUpdatePayload,
    ) -> Result<(), StoreError>;

    /// Append a transition to the event log.
    async fn append_event(&self, event: &TransitionEvent) -> Result<(), StoreError>;

    /// Append a lifecycle record to the system log.
    async fn append_lifecycle_log(&self, record: &LifecycleRecord) -> Result<(), StoreError>;
}
