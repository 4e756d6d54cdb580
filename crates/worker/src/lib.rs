//! Seatwatch monitoring worker.
//!
//! One [`worker::ChannelWorker`] per camera channel samples frames from
//! the recorder, detects people and belongings, and keeps each seating
//! zone's status in the state store. The [`supervisor::Supervisor`] runs
//! the workers of a store and shuts them down on request.

pub mod config;
pub mod detector;
pub mod error;
pub mod lifecycle;
pub mod reconnect;
pub mod session;
pub mod source;
pub mod supervisor;
pub mod worker;
