use std::sync::Arc;

use chrono::{DateTime, Utc};

use parley_shared::types::UserId;

use crate::clock::ManualClock;
use crate::database::Database;

pub(crate) fn setup() -> (Database, Arc<ManualClock>) {
    let start = DateTime::<Utc>::from_timestamp_micros(1_700_000_000_000_000).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let db = Database::open_in_memory().unwrap().with_clock(clock.clone());
    (db, clock)
}

pub(crate) fn user(db: &Database, name: &str) -> UserId {
    let key = format!("idp_{}", name.to_lowercase());
    db.upsert_user(&key, name, &format!("{key}@example.com"), "")
        .unwrap()
}
