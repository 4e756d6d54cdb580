//! One repository per table. Each is a unit struct exposing async
//! associated functions that take a `&PgPool`.

pub mod store_repo;
pub mod system_log_repo;
pub mod zone_event_repo;
pub mod zone_repo;
pub mod zone_status_repo;

pub use store_repo::StoreRepo;
pub use system_log_repo::SystemLogRepo;
pub use zone_event_repo::ZoneEventRepo;
pub use zone_repo::ZoneRepo;
pub use zone_status_repo::ZoneStatusRepo;
