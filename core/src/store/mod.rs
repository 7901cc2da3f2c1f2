//! SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database.
//! Services reach it through the traits in ports.rs; they never execute SQL.
//!
//! The connection sits behind a mutex so one store can be shared across
//! threads. Multi-statement writes run inside a transaction.

use crate::{
    error::{CompError, CompResult},
    event::{CompEvent, EventLogEntry},
    ports::{NotificationDispatcher, NotifyError},
    types::ParseLabelError,
};
use rusqlite::{params, types::Type, Connection, Row};
use serde::de::DeserializeOwned;
use std::{
    str::FromStr,
    sync::{Mutex, MutexGuard},
};

mod agent;
mod commission;
mod lead;
mod quality;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> CompResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> CompResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> CompResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(include_str!("../../../migrations/001_agents.sql"))?;
        conn.execute_batch(include_str!("../../../migrations/002_leads.sql"))?;
        conn.execute_batch(include_str!("../../../migrations/003_commissions.sql"))?;
        conn.execute_batch(include_str!("../../../migrations/004_payouts.sql"))?;
        conn.execute_batch(include_str!("../../../migrations/005_event_log.sql"))?;
        conn.execute_batch(include_str!("../../../migrations/006_agent_quality.sql"))?;
        conn.execute_batch(include_str!("../../../migrations/007_commission_lead_unique.sql"))?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> CompResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CompError::Other(anyhow::anyhow!("store connection lock poisoned")))
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> CompResult<()> {
        self.conn()?.execute(
            "INSERT INTO event_log (agent_id, event_type, payload, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![entry.agent_id, entry.event_type, entry.payload, entry.recorded_at],
        )?;
        Ok(())
    }

    pub fn events_for_agent(&self, agent_id: &str) -> CompResult<Vec<EventLogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, agent_id, event_type, payload, recorded_at
             FROM event_log WHERE agent_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![agent_id], |row| {
                Ok(EventLogEntry {
                    id:          Some(row.get(0)?),
                    agent_id:    row.get(1)?,
                    event_type:  row.get(2)?,
                    payload:     row.get(3)?,
                    recorded_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

/// Outbox dispatcher: every notification becomes an event_log row for a
/// downstream relay to deliver.
impl NotificationDispatcher for SqliteStore {
    fn notify(&self, agent_id: &str, event: &CompEvent) -> Result<(), NotifyError> {
        let payload =
            serde_json::to_string(event).map_err(|e| NotifyError::Transport(e.to_string()))?;
        let entry = EventLogEntry {
            id:          None,
            agent_id:    agent_id.to_string(),
            event_type:  event.event_type().to_string(),
            payload,
            recorded_at: event.occurred_at(),
        };
        self.append_event(&entry)
            .map_err(|e| NotifyError::Transport(e.to_string()))
    }
}

// ── Row helpers ────────────────────────────────────────────────────

/// Read a text column into one of the label enums.
pub(crate) fn label<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = ParseLabelError>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a JSON text column.
pub(crate) fn json<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// A UNIQUE index rejected the row. Foreign-key and NOT NULL failures do not count.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// `?n` placeholders for an IN list starting at parameter `first`.
pub(crate) fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
