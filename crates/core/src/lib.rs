//! SeatWatch domain core.
//!
//! Pure occupancy logic and the storage boundary, shared by the database
//! adapter and the channel workers:
//!
//! - [`occupancy`]: detection-to-zone matching and abandoned-item dwell.
//! - [`differ`]: status payloads and transition events.
//! - [`store`]: the [`StateStore`](store::StateStore) trait.
//! - [`memory`]: an in-memory store for tests.

pub mod differ;
pub mod error;
pub mod geometry;
pub mod memory;
pub mod occupancy;
pub mod store;
pub mod types;
pub mod zone;
