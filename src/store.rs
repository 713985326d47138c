//! ==============================================================================
//! store.rs - append-only reading log
//! ==============================================================================
//!
//! purpose:
//!     the only stateful component of the hub. every accepted reading is
//!     appended here and never updated or deleted. everything else (the
//!     aggregator cache, the charting matrix) is derived from this log.
//!
//! durability:
//!     each append is its own committed transaction with synchronous=FULL.
//!     when `append` returns Ok the row is on disk, there is no write buffer
//!     that could lose it on a crash.
//!
//! relationships:
//!     - used by: hub.rs (startup replay), ingest.rs (append), query.rs (reads)
//!     - implements: ReadingStore trait (SqliteStore is the production backend)
//!
//! layout:
//!
//! ```text
//!     readings
//!     ┌────┬───────────┬───────┬───────────┐
//!     │ id │ series_id │ value │ timestamp │   id = autoincrement
//!     └────┴───────────┴───────┴───────────┘
//! ```
//!
//! ==============================================================================

use crate::domain::{Reading, ReadingId};
use crate::error::{HubError, HubResult};

use rusqlite::{params, Connection, Params, Row, Statement};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Blocking interface to the reading log.
///
/// Calls may block on disk io, so async callers go through spawn_blocking.
pub trait ReadingStore: Send + Sync {
    /// append one reading, returning its id once it is durable
    fn append(&self, series_id: &str, value: f64, timestamp_ms: u64) -> HubResult<ReadingId>;

    /// stream readings in insertion order, optionally restricted to one series.
    ///
    /// the visitor runs while the store is locked and must not call back into it.
    fn scan(&self, series_id: Option<&str>, visit: &mut dyn FnMut(Reading)) -> HubResult<()>;

    fn scan_all(&self, visit: &mut dyn FnMut(Reading)) -> HubResult<()> {
        self.scan(None, visit)
    }

    fn list_all(&self) -> HubResult<Vec<Reading>> {
        let mut out = Vec::new();
        self.scan(None, &mut |r| out.push(r))?;
        Ok(out)
    }

    fn list_by_series(&self, series_id: &str) -> HubResult<Vec<Reading>> {
        let mut out = Vec::new();
        self.scan(Some(series_id), &mut |r| out.push(r))?;
        Ok(out)
    }
}

// ==============================================================================
// sqlite backend
// ==============================================================================
// rusqlite::Connection is Send but not Sync, so it lives behind a mutex.
// a poisoned mutex is surfaced as a storage error rather than a panic.

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// open (or create) the reading log at `path`
    pub fn open(path: impl AsRef<Path>) -> HubResult<Self> {
        let path = path.as_ref();

        // ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                HubError::Storage(format!(
                    "failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(path)?;
        Self::init(&conn)?;

        tracing::info!(path = %path.display(), "reading log opened");

        Ok(Self { conn: Mutex::new(conn) })
    }

    /// non-durable store, handy for tests and dry runs
    pub fn open_in_memory() -> HubResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn init(conn: &Connection) -> HubResult<()> {
        // journal_mode reports the resulting mode back as a row
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        tracing::debug!(journal_mode = %mode, "sqlite journal mode");

        conn.execute_batch(
            "PRAGMA synchronous = FULL;
             CREATE TABLE IF NOT EXISTS readings (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 series_id TEXT NOT NULL,
                 value REAL NOT NULL,
                 timestamp INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_readings_series ON readings(series_id, id);",
        )?;

        Ok(())
    }

    fn conn(&self) -> HubResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| HubError::Storage("reading log lock poisoned".to_string()))
    }
}

impl ReadingStore for SqliteStore {
    fn append(&self, series_id: &str, value: f64, timestamp_ms: u64) -> HubResult<ReadingId> {
        let timestamp = i64::try_from(timestamp_ms)
            .map_err(|_| HubError::Storage(format!("timestamp {} out of range", timestamp_ms)))?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO readings (series_id, value, timestamp) VALUES (?1, ?2, ?3)",
            params![series_id, value, timestamp],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn scan(&self, series_id: Option<&str>, visit: &mut dyn FnMut(Reading)) -> HubResult<()> {
        let conn = self.conn()?;

        match series_id {
            Some(id) => {
                let mut stmt = conn.prepare_cached(
                    "SELECT id, series_id, value, timestamp FROM readings
                     WHERE series_id = ?1 ORDER BY id ASC",
                )?;
                stream_rows(&mut stmt, params![id], visit)
            }
            None => {
                let mut stmt = conn.prepare_cached(
                    "SELECT id, series_id, value, timestamp FROM readings ORDER BY id ASC",
                )?;
                stream_rows(&mut stmt, params![], visit)
            }
        }
    }
}

fn stream_rows<P: Params>(
    stmt: &mut Statement<'_>,
    params: P,
    visit: &mut dyn FnMut(Reading),
) -> HubResult<()> {
    let rows = stmt.query_map(params, row_to_reading)?;
    for row in rows {
        visit(row?);
    }
    Ok(())
}

fn row_to_reading(row: &Row<'_>) -> rusqlite::Result<Reading> {
    let timestamp: i64 = row.get(3)?;
    Ok(Reading {
        id: row.get(0)?,
        series_id: row.get(1)?,
        value: row.get(2)?,
        timestamp_ms: timestamp.max(0) as u64,
    })
}
