//! Snapshot persistence layer.
//!
//! RULE: Only storage.rs talks to the database.
//! The tracking store reads and writes whole JSON snapshots through
//! [`SnapshotStore`] — it never executes SQL directly.
//!
//! State is five fixed keys in one upsert table. Values are opaque JSON
//! strings; this layer does not parse them.

use crate::error::MarketResult;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

pub const KEY_SESSIONS: &str = "tracking_sessions";
pub const KEY_ACTIVITIES: &str = "tracking_activities";
pub const KEY_PROFILES: &str = "tracking_profiles";
pub const KEY_FILES: &str = "tracking_files";
pub const KEY_EVENTS: &str = "tracking_events";

/// Key-value snapshot backend. Implementations must tolerate unknown keys
/// on `load` (return `Ok(None)`) and overwrite on `save`.
pub trait SnapshotStore: Send {
    fn load(&self, key: &str) -> MarketResult<Option<String>>;
    fn save(&mut self, key: &str, value: &str) -> MarketResult<()>;
}

// ── SQLite backend ─────────────────────────────────────────────

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database at `path`. Accepts plain paths, `:memory:`, and
    /// `file:` URIs (shared-cache URIs let tests reopen the same
    /// in-memory database).
    pub fn open(path: &str) -> MarketResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open a private in-memory database (used in tests).
    pub fn in_memory() -> MarketResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> MarketResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }
}

impl SnapshotStore for SqliteStore {
    fn load(&self, key: &str) -> MarketResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM snapshot_kv WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn save(&mut self, key: &str, value: &str) -> MarketResult<()> {
        self.conn.execute(
            "INSERT INTO snapshot_kv (key, value, updated_at)
             VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET
                 value      = excluded.value,
                 updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }
}

// ── In-memory backend ──────────────────────────────────────────

/// Map-backed store. Clones share the underlying map, so a test can hand
/// one clone to a store, mutate, then rebuild a second store over the
/// same bytes.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value for a key, bypassing the trait (test inspection).
    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// Overwrite a raw value (used to simulate corrupt snapshots).
    pub fn set_raw(&self, key: &str, value: &str) {
        self.lock().insert(key.to_string(), value.to_string());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self, key: &str) -> MarketResult<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> MarketResult<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
