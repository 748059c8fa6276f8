//! SQLite thread store
//!
//! # Concurrency Model
//!
//! One `Mutex<Connection>`; WAL mode and `busy_timeout` cover other processes
//! sharing the file. Statements are short and run inline on the calling task.
//!
//! # Schema
//!
//! ```text
//! threads  (thread_id PK, account_id, title, metadata, created_at, updated_at)
//! messages (seq PK AUTOINCREMENT, message_id UNIQUE, thread_id FK ON DELETE CASCADE,
//!           role, content, metadata, archived, created_at, updated_at)
//! ```
//!
//! `seq` breaks ties between messages created in the same microsecond.
//! Timestamps are stored as fixed-width RFC 3339 text so that string
//! comparison matches time order.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use suna_domain::{
    Message, Role, StoreError, SummaryMode, Thread, ThreadPatch, ThreadRepository,
};
use tracing::{info, warn};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS threads (
    thread_id  TEXT PRIMARY KEY,
    account_id TEXT NOT NULL,
    title      TEXT,
    metadata   TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS messages (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id TEXT NOT NULL UNIQUE,
    thread_id  TEXT NOT NULL REFERENCES threads(thread_id) ON DELETE CASCADE,
    role       TEXT NOT NULL CHECK (role IN ('user', 'assistant', 'system', 'tool')),
    content    TEXT NOT NULL,
    metadata   TEXT,
    archived   INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_thread_order
    ON messages(thread_id, archived, created_at, seq);
CREATE INDEX IF NOT EXISTS idx_threads_updated ON threads(updated_at);
";

const MESSAGE_COLUMNS: &str =
    "message_id, thread_id, role, content, metadata, created_at, updated_at";

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// A second row with the same `message_id` trips the UNIQUE constraint.
fn insert_error(message_id: &str, e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            StoreError::DuplicateMessage(message_id.to_string())
        }
        other => backend(other),
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp '{raw}': {e}")))
}

fn encode_json<T: serde::Serialize>(value: Option<&T>) -> Result<Option<String>, StoreError> {
    value
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn decode_json<T: serde::de::DeserializeOwned>(raw: Option<String>) -> Result<Option<T>, StoreError> {
    raw.map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| StoreError::Corrupt(format!("metadata: {e}")))
}

/// Column values as read, decoded outside the rusqlite row callback.
struct ThreadRow {
    thread_id: String,
    account_id: String,
    title: Option<String>,
    metadata: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ThreadRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            thread_id: row.get(0)?,
            account_id: row.get(1)?,
            title: row.get(2)?,
            metadata: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn decode(self) -> Result<Thread, StoreError> {
        Ok(Thread {
            thread_id: self.thread_id,
            account_id: self.account_id,
            title: self.title,
            metadata: decode_json(self.metadata)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct MessageRow {
    message_id: String,
    thread_id: String,
    role: String,
    content: String,
    metadata: Option<String>,
    created_at: String,
    updated_at: String,
}

impl MessageRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            message_id: row.get(0)?,
            thread_id: row.get(1)?,
            role: row.get(2)?,
            content: row.get(3)?,
            metadata: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn decode(self) -> Result<Message, StoreError> {
        Ok(Message {
            role: self.role.parse::<Role>().map_err(StoreError::Corrupt)?,
            metadata: decode_json(self.metadata)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            message_id: self.message_id,
            thread_id: self.thread_id,
            content: self.content,
        })
    }
}

/// [`ThreadRepository`] backed by a SQLite file.
pub struct SqliteThreadStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteThreadStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("create {}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path).map_err(backend)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        };
        store.initialize()?;
        info!(path = %path.display(), "SQLite thread store opened");
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        };
        store.initialize()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn initialize(&self) -> Result<(), StoreError> {
        let conn = self.lock();
        // journal_mode returns a row, so pragma_update reports an error we ignore
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        let _ = conn.pragma_update(None, "busy_timeout", "5000");
        conn.pragma_update(None, "foreign_keys", "ON").map_err(backend)?;
        conn.execute_batch(SCHEMA).map_err(backend)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("SQLite store mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn query_messages(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Message>, StoreError> {
        let mut stmt = conn.prepare(sql).map_err(backend)?;
        let rows = stmt
            .query_map(params, MessageRow::read)
            .map_err(backend)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(backend)?;
        rows.into_iter().map(MessageRow::decode).collect()
    }

    fn get_thread_locked(conn: &Connection, thread_id: &str) -> Result<Option<Thread>, StoreError> {
        conn.query_row(
            "SELECT thread_id, account_id, title, metadata, created_at, updated_at
             FROM threads WHERE thread_id = ?1",
            params![thread_id],
            ThreadRow::read,
        )
        .optional()
        .map_err(backend)?
        .map(ThreadRow::decode)
        .transpose()
    }
}

fn placeholders(n: usize, offset: usize) -> String {
    (0..n)
        .map(|i| format!("?{}", i + offset))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Insert one message and bump its thread's `updated_at`, inside `conn`'s
/// open transaction.
fn append_message(conn: &Connection, message: &Message) -> Result<(), StoreError> {
    let metadata = encode_json(message.metadata.as_ref())?;
    let created = timestamp(&message.created_at);

    let touched = conn
        .execute(
            "UPDATE threads SET updated_at = MAX(updated_at, ?2) WHERE thread_id = ?1",
            params![message.thread_id, created],
        )
        .map_err(backend)?;
    if touched == 0 {
        return Err(StoreError::ThreadNotFound(message.thread_id.clone()));
    }

    conn.execute(
        "INSERT INTO messages (message_id, thread_id, role, content, metadata, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            message.message_id,
            message.thread_id,
            message.role.as_str(),
            message.content,
            metadata,
            created,
            timestamp(&message.updated_at),
        ],
    )
    .map_err(|e| insert_error(&message.message_id, e))?;
    Ok(())
}

#[async_trait]
impl ThreadRepository for SqliteThreadStore {
    async fn insert_thread(&self, thread: &Thread) -> Result<(), StoreError> {
        let metadata = encode_json(thread.metadata.as_ref())?;
        self.lock()
            .execute(
                "INSERT INTO threads (thread_id, account_id, title, metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    thread.thread_id,
                    thread.account_id,
                    thread.title,
                    metadata,
                    timestamp(&thread.created_at),
                    timestamp(&thread.updated_at),
                ],
            )
            .map_err(backend)?;
        Ok(())
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>, StoreError> {
        Self::get_thread_locked(&self.lock(), thread_id)
    }

    async fn update_thread(
        &self,
        thread_id: &str,
        patch: &ThreadPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Thread>, StoreError> {
        let metadata = encode_json(patch.metadata.as_ref())?;
        let conn = self.lock();
        let changed = conn
            .execute(
                "UPDATE threads SET
                    title = COALESCE(?2, title),
                    metadata = COALESCE(?3, metadata),
                    updated_at = ?4
                 WHERE thread_id = ?1",
                params![thread_id, patch.title, metadata, timestamp(&updated_at)],
            )
            .map_err(backend)?;
        if changed == 0 {
            return Ok(None);
        }
        Self::get_thread_locked(&conn, thread_id)
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<bool, StoreError> {
        let deleted = self
            .lock()
            .execute("DELETE FROM threads WHERE thread_id = ?1", params![thread_id])
            .map_err(backend)?;
        Ok(deleted > 0)
    }

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(backend)?;
        append_message(&tx, message)?;
        tx.commit().map_err(backend)
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, StoreError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE thread_id = ?1 AND archived = 0
             ORDER BY created_at, seq
             LIMIT ?2"
        );
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        Self::query_messages(&self.lock(), &sql, params![thread_id, limit])
    }

    async fn update_message_metadata(
        &self,
        thread_id: &str,
        message_id: &str,
        patch: &Map<String, Value>,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Message>, StoreError> {
        let conn = self.lock();
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE thread_id = ?1 AND message_id = ?2"
        );
        let Some(mut message) = Self::query_messages(&conn, &sql, params![thread_id, message_id])?
            .pop()
        else {
            return Ok(None);
        };

        message
            .metadata
            .get_or_insert_with(Map::new)
            .extend(patch.iter().map(|(k, v)| (k.clone(), v.clone())));
        message.updated_at = updated_at;

        conn.execute(
            "UPDATE messages SET metadata = ?3, updated_at = ?4
             WHERE thread_id = ?1 AND message_id = ?2",
            params![
                thread_id,
                message_id,
                encode_json(message.metadata.as_ref())?,
                timestamp(&updated_at),
            ],
        )
        .map_err(backend)?;
        Ok(Some(message))
    }

    async fn replace_with_summary(
        &self,
        summary: &Message,
        superseded: &[String],
        mode: SummaryMode,
    ) -> Result<usize, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(backend)?;
        append_message(&tx, summary)?;

        let affected = if superseded.is_empty() {
            0
        } else {
            let ids = placeholders(superseded.len(), 2);
            let sql = match mode {
                SummaryMode::Archive => format!(
                    "UPDATE messages SET archived = 1
                     WHERE thread_id = ?1 AND archived = 0 AND message_id IN ({ids})"
                ),
                SummaryMode::Delete => {
                    format!("DELETE FROM messages WHERE thread_id = ?1 AND message_id IN ({ids})")
                }
            };
            let values = std::iter::once(summary.thread_id.as_str())
                .chain(superseded.iter().map(String::as_str));
            tx.execute(&sql, params_from_iter(values)).map_err(backend)?
        };

        // dropping an uncommitted transaction rolls it back
        tx.commit().map_err(backend)?;
        Ok(affected)
    }

    async fn list_archived_messages(&self, thread_id: &str) -> Result<Vec<Message>, StoreError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE thread_id = ?1 AND archived = 1
             ORDER BY created_at, seq"
        );
        Self::query_messages(&self.lock(), &sql, params![thread_id])
    }

    async fn list_threads_updated_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT thread_id FROM threads WHERE updated_at < ?1 ORDER BY updated_at")
            .map_err(backend)?;
        stmt.query_map(params![timestamp(&cutoff)], |row| row.get(0))
            .map_err(backend)?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::conformance;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_conformance_in_memory() {
        conformance::run_all(&SqliteThreadStore::in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("threads.db");
        let now = Utc::now();
        {
            let store = SqliteThreadStore::open(&path).unwrap();
            store
                .insert_thread(&Thread {
                    thread_id: "t1".into(),
                    account_id: "u1".into(),
                    created_at: now,
                    updated_at: now,
                    title: None,
                    metadata: None,
                })
                .await
                .unwrap();
        }

        let reopened = SqliteThreadStore::open(&path).unwrap();
        let thread = reopened.get_thread("t1").await.unwrap().unwrap();
        assert_eq!(thread.account_id, "u1");
        assert_eq!(reopened.db_path(), path.as_path());
    }

    #[tokio::test]
    async fn test_corrupt_role_surfaces_as_error() {
        let store = SqliteThreadStore::in_memory().unwrap();
        let now = timestamp(&Utc::now());
        {
            let conn = store.lock();
            conn.execute(
                "INSERT INTO threads VALUES ('t', 'u', NULL, NULL, ?1, ?1)",
                params![now],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO messages (message_id, thread_id, role, content, metadata, created_at, updated_at)
                 VALUES ('m', 't', 'user', 'x', '{not json', ?1, ?1)",
                params![now],
            )
            .unwrap();
        }
        let err = store.list_messages("t", None).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
