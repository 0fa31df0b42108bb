//! DuckDB-backed note store.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::{Connection, OptionalExt, params};
use tracing::{debug, info};
use waflens_core::{EntityType, NoteKey, NoteRecord};

use crate::{NoteStore, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS waf_notes (
    partition_key VARCHAR NOT NULL,
    row_key       VARCHAR NOT NULL,
    content       VARCHAR NOT NULL,
    entity_type   VARCHAR NOT NULL,
    context       VARCHAR NOT NULL,
    updated_at    VARCHAR NOT NULL,
    PRIMARY KEY (partition_key, row_key)
)";

const COLUMNS: &str = "partition_key, row_key, content, entity_type, context, updated_at";

/// Notes in a single `waf_notes` table keyed by (partition_key, row_key).
///
/// Use [`open`](Self::open) for an in-memory database and
/// [`open_persistent`](Self::open_persistent) for a file that survives
/// restarts. The connection sits behind a mutex and every statement runs on a
/// blocking thread.
#[derive(Clone)]
pub struct DuckNoteStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckNoteStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let store = Self::init(Connection::open(path)?)?;
        info!(path = %path.display(), "opened notes database");
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of stored notes.
    pub async fn count(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT count(*) FROM waf_notes", [], |row| row.get(0))?;
            Ok(usize::try_from(n).unwrap_or_default())
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::Other(format!("mutex poisoned: {e}")))?;
            f(&conn)
        })
        .await?
    }
}

// ── Row conversion ──

type RawRow = (String, String, String, String, String, String);

fn read_row(row: &duckdb::Row<'_>) -> duckdb::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn to_record(raw: RawRow) -> Result<NoteRecord, StoreError> {
    let (partition_key, row_key, content, entity_type, context, updated_at) = raw;
    let corrupt = |reason: String| StoreError::Corrupt {
        key: format!("{partition_key}/{row_key}"),
        reason,
    };
    let entity_type: EntityType = entity_type.parse().map_err(|e| corrupt(format!("{e}")))?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| corrupt(format!("updated_at: {e}")))?
        .with_timezone(&Utc);
    let context = serde_json::from_str(&context)?;
    Ok(NoteRecord {
        partition_key,
        row_key,
        content,
        entity_type,
        context,
        updated_at,
    })
}

#[async_trait]
impl NoteStore for DuckNoteStore {
    async fn get(&self, key: &NoteKey) -> Result<Option<NoteRecord>, StoreError> {
        let key = key.clone();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM waf_notes WHERE partition_key = ? AND row_key = ?"
            );
            let raw = conn
                .query_row(&sql, params![key.partition_key, key.row_key], read_row)
                .optional()?;
            raw.map(to_record).transpose()
        })
        .await
    }

    async fn upsert(&self, record: &NoteRecord) -> Result<(), StoreError> {
        let record = record.clone();
        let context = serde_json::to_string(&record.context)?;
        self.with_conn(move |conn| {
            let sql = format!("INSERT OR REPLACE INTO waf_notes ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)");
            conn.execute(
                &sql,
                params![
                    record.partition_key,
                    record.row_key,
                    record.content,
                    record.entity_type.as_str(),
                    context,
                    record.updated_at.to_rfc3339(),
                ],
            )?;
            debug!(key = %record.key(), "upserted note");
            Ok(())
        })
        .await
    }

    async fn query_partition(&self, partition_key: &str) -> Result<Vec<NoteRecord>, StoreError> {
        let partition_key = partition_key.to_string();
        self.with_conn(move |conn| {
            let sql =
                format!("SELECT {COLUMNS} FROM waf_notes WHERE partition_key = ? ORDER BY row_key");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![partition_key], read_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(to_record).collect()
        })
        .await
    }
}
