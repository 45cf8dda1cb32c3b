//! # parley-store
//!
//! Persistent state for Parley's two-party messaging service, backed by
//! SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` together with a [`Clock`], and implements every
//! data operation as a typed method: identity directory, conversation
//! registry, message log, typing presence and read tracking.

pub mod clock;
pub mod conversations;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod receipts;
pub mod typing;
pub mod users;

mod error;
mod sql;
#[cfg(test)]
mod test_support;

pub use clock::{Clock, ManualClock, SystemClock};
pub use database::Database;
pub use error::StoreError;
pub use models::*;
