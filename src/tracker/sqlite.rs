// src/tracker/sqlite.rs
//! SQLite-backed `RecordStore`. One connection behind a mutex; every query runs
//! on the blocking pool.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::tracker::{AutomationRecord, NewAutomationRecord, RecordStore, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS automation_records (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    engineer_id TEXT NOT NULL,
    tool_name   TEXT NOT NULL,
    start_time  TEXT NOT NULL,
    end_time    TEXT NOT NULL,
    description TEXT,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_records_engineer ON automation_records(engineer_id);
";

const SELECT_COLUMNS: &str =
    "SELECT id, engineer_id, tool_name, start_time, end_time, description, created_at FROM automation_records";

#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

/// `sqlite://path`, `sqlite:path` or a bare path; `:memory:` for an in-memory db.
fn database_path(url: &str) -> &str {
    let url = url.trim();
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}

fn parse_ts(raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<AutomationRecord> {
    Ok(AutomationRecord {
        id: row.get(0)?,
        engineer_id: row.get(1)?,
        tool_name: row.get(2)?,
        start_time: parse_ts(row.get(3)?)?,
        end_time: parse_ts(row.get(4)?)?,
        description: row.get(5)?,
        created_at: parse_ts(row.get(6)?)?,
    })
}

impl SqliteRecordStore {
    pub fn open(database_url: &str) -> anyhow::Result<Self> {
        let path = database_path(database_url);
        let conn = if path == ":memory:" || path.is_empty() {
            Connection::open_in_memory()?
        } else {
            Connection::open(Path::new(path))?
        };
        conn.execute_batch(SCHEMA)?;
        tracing::info!(path, "record store ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        Self::open(":memory:")
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Database("connection mutex poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Database(format!("blocking task failed: {e}")))?
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert(&self, record: NewAutomationRecord) -> Result<AutomationRecord, StoreError> {
        let record = record.validated()?;
        let created_at = Utc::now();
        let stored = self
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO automation_records
                     (engineer_id, tool_name, start_time, end_time, description, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        record.engineer_id,
                        record.tool_name,
                        record.start_time.to_rfc3339(),
                        record.end_time.to_rfc3339(),
                        record.description,
                        created_at.to_rfc3339(),
                    ],
                )?;
                Ok(AutomationRecord {
                    id: conn.last_insert_rowid(),
                    engineer_id: record.engineer_id,
                    tool_name: record.tool_name,
                    start_time: record.start_time,
                    end_time: record.end_time,
                    description: record.description,
                    created_at,
                })
            })
            .await?;
        counter!("records_created_total").increment(1);
        tracing::info!(id = stored.id, engineer = %stored.engineer_id, tool = %stored.tool_name, "automation recorded");
        Ok(stored)
    }

    async fn get(&self, id: i64) -> Result<AutomationRecord, StoreError> {
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                row_to_record,
            )
            .optional()?
            .ok_or(StoreError::NotFound(id))
        })
        .await
    }

    async fn list(&self, engineer_id: Option<&str>) -> Result<Vec<AutomationRecord>, StoreError> {
        let engineer_id = engineer_id.map(str::to_string);
        self.with_conn(move |conn| {
            let records = match engineer_id {
                Some(eng) => {
                    let mut stmt = conn.prepare(&format!(
                        "{SELECT_COLUMNS} WHERE engineer_id = ?1 ORDER BY start_time, id"
                    ))?;
                    let rows = stmt.query_map(params![eng], row_to_record)?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                }
                None => {
                    let mut stmt =
                        conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY start_time, id"))?;
                    let rows = stmt.query_map([], row_to_record)?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                }
            };
            Ok(records)
        })
        .await
    }
}
