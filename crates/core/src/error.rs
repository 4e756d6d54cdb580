#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A store, channel, or setting is missing or invalid. The affected
    /// channel never starts; other channels are unaffected.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A persistence call against the state store failed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Malformed row for {entity} {id}: {reason}")]
    Malformed {
        entity: &'static str,
        id: String,
        reason: String,
    },
}
