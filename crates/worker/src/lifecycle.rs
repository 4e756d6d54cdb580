//! Persisted lifecycle records for one channel component.

use std::sync::Arc;

use seatwatch_core::store::{LifecycleRecord, LogLevel, StateStore};
use seatwatch_core::types::ChannelId;

/// Writes lifecycle records under a fixed component name.
///
/// A failed write is logged and otherwise ignored.
#[derive(Clone)]
pub struct Lifecycle {
    store: Arc<dyn StateStore>,
    store_id: String,
    component: String,
}

impl Lifecycle {
    pub fn new(
        store: Arc<dyn StateStore>,
        store_id: impl Into<String>,
        component: impl Into<String>,
    ) -> Self {
        Self {
            store,
            store_id: store_id.into(),
            component: component.into(),
        }
    }

    /// Component `channel_{n}_worker`.
    pub fn for_channel(
        store: Arc<dyn StateStore>,
        store_id: impl Into<String>,
        channel_id: ChannelId,
    ) -> Self {
        Self::new(store, store_id, component_name(channel_id))
    }

    pub async fn record(&self, level: LogLevel, message: &str, metadata: serde_json::Value) {
        let record = LifecycleRecord::new(&self.store_id, &self.component, level, message)
            .with_metadata(metadata);
        if let Err(e) = self.store.append_lifecycle_log(&record).await {
            tracing::warn!(
                component = %self.component,
                record = message,
                error = %e,
                "Failed to persist lifecycle record"
            );
        }
    }
}

pub fn component_name(channel_id: ChannelId) -> String {
    format!("channel_{channel_id}_worker")
}
