use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use astral_core::error::{AstralError, Result};
use astral_core::traits::{ProgressRecord, ProgressStore};

/// Plan progress persisted in SQLite, one row per plan entry.
pub struct SqliteProgressStore {
    conn: Mutex<Connection>,
}

fn db_err(context: &str, e: impl std::fmt::Display) -> AstralError {
    AstralError::Database(format!("{}: {}", context, e))
}

impl SqliteProgressStore {
    /// Open or create the progress database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| db_err("Failed to open progress store", e))?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| db_err("Failed to open in-memory progress store", e))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=FULL;

             CREATE TABLE IF NOT EXISTS plan_progress (
                 plan_item_id TEXT PRIMARY KEY,
                 run_times INTEGER NOT NULL DEFAULT 0,
                 updated_at TEXT NOT NULL
             );",
        )
        .map_err(|e| db_err("Failed to initialize progress schema", e))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| AstralError::Database(e.to_string()))
    }
}

impl ProgressStore for SqliteProgressStore {
    fn load(&self, plan_item_id: &str) -> Result<u32> {
        let conn = self.lock()?;
        let run_times: Option<i64> = conn
            .query_row(
                "SELECT run_times FROM plan_progress WHERE plan_item_id = ?1",
                params![plan_item_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| db_err("Failed to load progress", e))?;
        Ok(run_times.map(|n| n.max(0) as u32).unwrap_or(0))
    }

    fn save(&self, plan_item_id: &str, run_times: u32) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO plan_progress (plan_item_id, run_times, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(plan_item_id) DO UPDATE SET
                 run_times = excluded.run_times,
                 updated_at = excluded.updated_at",
            params![plan_item_id, run_times as i64, Utc::now().to_rfc3339()],
        )
        .map_err(|e| db_err("Failed to save progress", e))?;
        Ok(())
    }

    fn reset(&self, plan_item_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn
            .execute(
                "DELETE FROM plan_progress WHERE plan_item_id = ?1",
                params![plan_item_id],
            )
            .map_err(|e| db_err("Failed to reset progress", e))?;
        Ok(deleted > 0)
    }

    fn list(&self) -> Result<Vec<ProgressRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT plan_item_id, run_times, updated_at
                 FROM plan_progress
                 ORDER BY plan_item_id",
            )
            .map_err(|e| db_err("Failed to prepare query", e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ProgressRecord {
                    plan_item_id: row.get(0)?,
                    run_times: row.get::<_, i64>(1)?.max(0) as u32,
                    updated_at: row.get(2)?,
                })
            })
            .map_err(|e| db_err("Failed to list progress", e))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| db_err("Failed to read progress row", e))
    }
}
