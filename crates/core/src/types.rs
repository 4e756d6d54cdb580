/// Zones are keyed by a store-scoped string identifier (e.g. `"A-03"`).
pub type ZoneId = String;

/// Camera channel number within a store (DVR channels are 1-based).
pub type ChannelId = i32;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
