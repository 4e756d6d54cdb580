pub mod store;
pub mod system_log;
pub mod zone;
pub mod zone_event;
pub mod zone_status;
