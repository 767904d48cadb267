// src/tracker/mod.rs
//! Automation event records: model, validation, persistence, analytics.

pub mod analytics;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

pub use analytics::{DailyUsage, ToolUsage, TotalTime, UsageReport};
pub use sqlite::SqliteRecordStore;

/// Request shape for a new automation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAutomationRecord {
    pub engineer_id: String,
    pub tool_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewAutomationRecord {
    /// Trim identifiers and reject empty ids or a negative duration.
    pub fn validated(mut self) -> Result<Self, StoreError> {
        self.engineer_id = self.engineer_id.trim().to_string();
        self.tool_name = self.tool_name.trim().to_string();
        if self.engineer_id.is_empty() {
            return Err(StoreError::Validation("engineer_id must not be empty".into()));
        }
        if self.tool_name.is_empty() {
            return Err(StoreError::Validation("tool_name must not be empty".into()));
        }
        if self.end_time < self.start_time {
            return Err(StoreError::Validation(
                "end_time must not be before start_time".into(),
            ));
        }
        self.description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationRecord {
    pub id: i64,
    pub engineer_id: String,
    pub tool_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AutomationRecord {
    /// Whole seconds between start and end; never negative.
    pub fn duration_secs(&self) -> i64 {
        (self.end_time - self.start_time).num_seconds().max(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid record: {0}")]
    Validation(String),
    #[error("record {0} not found")]
    NotFound(i64),
    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Validation(_) => ErrorKind::ValidationError,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Database(_) => ErrorKind::Internal,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Validate and persist; returns the stored record with its id.
    async fn insert(&self, record: NewAutomationRecord) -> Result<AutomationRecord, StoreError>;
    async fn get(&self, id: i64) -> Result<AutomationRecord, StoreError>;
    /// All records, optionally for one engineer, ordered by start time.
    async fn list(&self, engineer_id: Option<&str>) -> Result<Vec<AutomationRecord>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn new_record(start_h: u32, end_h: u32) -> NewAutomationRecord {
        NewAutomationRecord {
            engineer_id: " eng-1 ".into(),
            tool_name: "copilot".into(),
            start_time: Utc.with_ymd_and_hms(2024, 3, 1, start_h, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2024, 3, 1, end_h, 0, 0).unwrap(),
            description: Some("  ".into()),
        }
    }

    #[test]
    fn validation_trims_and_accepts_ordered_times() {
        let r = new_record(9, 10).validated().unwrap();
        assert_eq!(r.engineer_id, "eng-1");
        assert!(r.description.is_none());
    }

    #[test]
    fn end_before_start_is_rejected() {
        let err = new_record(10, 9).validated().unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn empty_tool_is_rejected() {
        let mut r = new_record(9, 10);
        r.tool_name = "".into();
        assert!(r.validated().is_err());
    }
}
