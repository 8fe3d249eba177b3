//! Durable key-value document store over sqlite.
//!
//! Two tables: rate-limit counters keyed by (namespace, key) with a window
//! reset timestamp, and upserted JSON documents keyed by a stable
//! identifier. All statements are short; the connection sits behind a
//! mutex.

use anyhow::Result;
use concierge_common::cache::Cache;
use concierge_common::error::CoreError;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

pub struct DocumentStore {
    conn: Mutex<Connection>,
}

impl DocumentStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS rate_limits (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                count INTEGER NOT NULL,
                window_reset_at INTEGER NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            CREATE TABLE IF NOT EXISTS documents (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Count a hit in the sliding window for `(namespace, key)`.
    ///
    /// Returns `true` when the hit exceeds `max` inside the current window.
    /// A window that has elapsed resets the counter.
    pub fn rate_limit_hit(
        &self,
        namespace: &str,
        key: &str,
        max: u32,
        window: Duration,
    ) -> Result<bool> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let conn = self.conn.lock().unwrap();

        let row: Option<(i64, i64)> = conn
            .query_row(
                "SELECT count, window_reset_at FROM rate_limits
                 WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((count, reset_at)) if now_ms < reset_at => {
                let count = count + 1;
                conn.execute(
                    "UPDATE rate_limits SET count = ?3
                     WHERE namespace = ?1 AND key = ?2",
                    params![namespace, key, count],
                )?;
                Ok(count > max as i64)
            }
            _ => {
                let reset_at = now_ms + window.as_millis() as i64;
                conn.execute(
                    "INSERT INTO rate_limits (namespace, key, count, window_reset_at)
                     VALUES (?1, ?2, 1, ?3)
                     ON CONFLICT (namespace, key)
                     DO UPDATE SET count = 1, window_reset_at = ?3",
                    params![namespace, key, reset_at],
                )?;
                Ok(max == 0)
            }
        }
    }

    /// Upsert a document. Last write wins.
    pub fn put_document(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO documents (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (key) DO UPDATE SET value = ?2, updated_at = ?3",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn get_document(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM documents WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn delete_document(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM documents WHERE key = ?1", params![key])?;
        Ok(deleted > 0)
    }

    /// Delete every document whose key starts with `prefix`. Returns the
    /// number of rows removed.
    pub fn delete_documents_with_prefix(&self, prefix: &str) -> Result<usize> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM documents WHERE key LIKE ?1 ESCAPE '\\'",
            params![pattern],
        )?;
        Ok(deleted)
    }

    pub fn clear_documents(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM documents", [])?;
        Ok(deleted)
    }
}

/// Durable tier behind the shared [`Cache`] contract. Write failures are
/// logged and swallowed: the in-memory tiers keep the response usable.
pub struct DurableCache {
    store: Arc<DocumentStore>,
}

impl DurableCache {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }
}

impl Cache for DurableCache {
    fn get(&self, key: &str) -> Option<String> {
        match self.store.get_document(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Durable cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str, _ttl: Option<Duration>) {
        if let Err(e) = self.store.put_document(key, value) {
            // Not fatal: the in-memory tiers keep the response usable.
            warn!("{} ({})", CoreError::CacheWrite(e.to_string()), key);
        }
    }

    fn delete(&self, key: &str) -> bool {
        match self.store.delete_document(key) {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!("Durable cache delete failed for {}: {}", key, e);
                false
            }
        }
    }

    fn clear(&self) {
        if let Err(e) = self.store.clear_documents() {
            warn!("Durable cache clear failed: {}", e);
        }
    }
}
