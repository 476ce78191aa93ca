use rusqlite::{Connection, OptionalExtension};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

pub const STUDENTS_KEY: &str = "students";
pub const ENROLLMENTS_KEY: &str = "enrollments";
pub const ATTENDANCE_HISTORY_KEY: &str = "attendanceHistory";
pub const STUDENT_FEES_KEY: &str = "studentFees";
pub const NOTIFICATIONS_KEY: &str = "adminNotifications";
pub const SETTINGS_KEY: &str = "settings";

pub const DB_FILE: &str = "atelier.sqlite3";

pub fn attendance_key(date: &str) -> String {
    format!("attendance_{}", date)
}

/// Storage port for all ledgers: a durable string -> JSON mapping.
/// A missing key reads as `None`; callers substitute their own empty
/// defaults. A value that no longer parses as JSON also reads as
/// `None` so corrupted storage degrades to empty state.
pub trait KeyedStore {
    fn get(&self, key: &str) -> Option<serde_json::Value>;
    fn set(&self, key: &str, value: &serde_json::Value) -> anyhow::Result<()>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(workspace: &Path) -> anyhow::Result<SqliteStore> {
        std::fs::create_dir_all(workspace)?;
        let db_path = workspace.join(DB_FILE);
        let conn = Connection::open(db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv(
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(SqliteStore { conn })
    }
}

impl KeyedStore for SqliteStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let raw: Option<String> = match self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?", [key], |r| r.get(0))
            .optional()
        {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key, error = %e, "kv read failed; treating as empty");
                return None;
            }
        };
        let raw = raw?;
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key, error = %e, "kv entry is not valid JSON; treating as empty");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
        let raw = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO kv(key, value)
             VALUES(?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            (key, &raw),
        )?;
        Ok(())
    }
}

/// In-memory fake of the port for tests.
pub struct MemoryStore {
    entries: RefCell<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore {
            entries: RefCell::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl KeyedStore for MemoryStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.clone());
        Ok(())
    }
}
