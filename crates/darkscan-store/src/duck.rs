//! DuckDB-backed feedback store.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use darkscan_core::FeedbackRecord;
use duckdb::{Connection, params};
use serde_json::Value;
use tracing::info;

use crate::StoreError;
use crate::feedback::{FeedbackSink, validate_document};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS feedback (
    id UUID PRIMARY KEY DEFAULT uuid(),
    document VARCHAR NOT NULL,
    received_at VARCHAR NOT NULL
)";

/// File-backed DuckDB store for feedback documents.
///
/// Every call opens its own connection and closes it when done; nothing is
/// pooled. Documents are stored as their JSON text, untouched, and the
/// database assigns each one a UUID.
pub struct DuckFeedbackStore {
    path: PathBuf,
    // Calls in this process take turns on the database file.
    lock: Mutex<()>,
}

impl DuckFeedbackStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored feedback documents.
    pub fn count(&self) -> Result<usize, StoreError> {
        self.with_connection(|conn| {
            let count: i64 = conn.query_row("SELECT count(*) FROM feedback", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }

    fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let conn = Connection::open(&self.path)
            .map_err(|e| StoreError::Connection(format!("{}: {e}", self.path.display())))?;
        conn.execute_batch(CREATE_TABLE)?;
        f(&conn)
    }
}

impl FeedbackSink for DuckFeedbackStore {
    fn submit(&self, document: &Value) -> Result<String, StoreError> {
        validate_document(document)?;
        let json = serde_json::to_string(document)?;
        let received_at = Utc::now().to_rfc3339();

        let id = self.with_connection(|conn| {
            let id: String = conn.query_row(
                "INSERT INTO feedback (document, received_at) VALUES (?, ?) RETURNING CAST(id AS VARCHAR)",
                params![json, received_at],
                |row| row.get(0),
            )?;
            Ok(id)
        })?;

        info!(id = %id, bytes = json.len(), "stored feedback");
        Ok(id)
    }

    fn get(&self, id: &str) -> Result<Option<FeedbackRecord>, StoreError> {
        let row = self.with_connection(|conn| {
            let row = conn.query_row(
                "SELECT CAST(id AS VARCHAR), document, received_at FROM feedback WHERE id = TRY_CAST(? AS UUID)",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            );
            match row {
                Ok(row) => Ok(Some(row)),
                Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })?;

        let Some((id, document, received_at)) = row else {
            return Ok(None);
        };

        let received_at = DateTime::parse_from_rfc3339(&received_at)
            .map_err(|e| StoreError::Other(format!("bad received_at {received_at:?}: {e}")))?
            .with_timezone(&Utc);

        Ok(Some(FeedbackRecord {
            id,
            document: serde_json::from_str(&document)?,
            received_at,
        }))
    }
}
