//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation. It also owns the [`Clock`]
//! every write reads "now" from.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::Connection;

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, StoreError};
use crate::migrations;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Wrapper around a [`rusqlite::Connection`] and the store's clock.
pub struct Database {
    conn: Connection,
    clock: Arc<dyn Clock>,
}

impl Database {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/parley/parley.db`
    /// - macOS:   `~/Library/Application Support/com.parley.parley/parley.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\parley\parley\data\parley.db`
    pub fn new() -> Result<Self> {
        let project_dirs =
            ProjectDirs::from("com", "parley", "parley").ok_or(StoreError::NoDataDir)?;

        let data_dir = project_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        Self::open_at(&data_dir.join("parley.db"))
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "opening database");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        // Several handles may share one file; writers queue instead of failing.
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::init(conn)
    }

    /// Open a private in-memory database. Nothing survives the handle.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn,
            clock: Arc::new(SystemClock::new()),
        })
    }

    /// Replace the clock used for every timestamp this handle writes.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current time according to the store's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn
            .path()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use parley_shared::types::{ConversationId, UserId};

    use super::*;

    #[test]
    fn open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let db = Database::open_at(&path).expect("should open");
        assert!(db.path().is_some());
        drop(db);

        // Reopening runs migrations again without complaint.
        Database::open_at(&path).expect("should reopen");
    }

    /// Both handles race on first contact, then both write the same typing
    /// and receipt keys.
    fn contend(
        db: Database,
        a: UserId,
        b: UserId,
        barrier: &Barrier,
    ) -> (ConversationId, Database) {
        barrier.wait();
        let id = db.get_or_create_conversation(a, b).unwrap();
        barrier.wait();
        db.set_typing(id, a.min(b)).unwrap();
        db.mark_read(id, a.max(b)).unwrap();
        (id, db)
    }

    #[test]
    fn concurrent_first_writes_share_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");

        let first = Database::open_at(&path).unwrap();
        let ann = first.upsert_user("idp_ann", "Ann", "ann@example.com", "").unwrap();
        let bo = first.upsert_user("idp_bo", "Bo", "bo@example.com", "").unwrap();
        let second = Database::open_at(&path).unwrap();

        let barrier = Barrier::new(2);
        let (from_first, from_second) = thread::scope(|s| {
            let h1 = s.spawn(|| contend(first, ann, bo, &barrier));
            let h2 = s.spawn(|| contend(second, bo, ann, &barrier));
            (h1.join().unwrap(), h2.join().unwrap())
        });

        assert_eq!(from_first.0, from_second.0);

        let db = from_first.1;
        let count = |table: &str| -> i64 {
            db.conn()
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
                .unwrap()
        };
        assert_eq!(count("conversations"), 1);
        assert_eq!(count("typing_indicators"), 1);
        assert_eq!(count("read_receipts"), 1);
    }

    #[test]
    fn in_memory_has_no_path() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.path().is_none());
    }

    #[test]
    fn creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("parley.db");

        Database::open_at(&path).unwrap();
        assert!(path.exists());
    }
}
