// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Durability store: append-only SQLite log of receipts that no transport
// could deliver.
//
// Schema:
//   saved_receipts(
//     id          INTEGER PRIMARY KEY AUTOINCREMENT,
//     printer_id  TEXT NOT NULL,
//     document    TEXT NOT NULL,   -- ReceiptDocument as JSON
//     saved_at    TEXT NOT NULL,   -- RFC 3339
//     fingerprint TEXT NOT NULL    -- SHA-256 hex of `document`
//   )

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use tillwerk_core::error::{Result, TillwerkError};
use tillwerk_core::types::{PersistedReceipt, ReceiptDocument};

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS saved_receipts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        printer_id TEXT NOT NULL,
        document TEXT NOT NULL,
        saved_at TEXT NOT NULL,
        fingerprint TEXT NOT NULL
    )
"#;

const SELECT_COLUMNS: &str = "SELECT id, printer_id, document, saved_at, fingerprint FROM saved_receipts";

fn db_err(context: &str, e: rusqlite::Error) -> TillwerkError {
    TillwerkError::Database(format!("{context}: {e}"))
}

/// Append-only store for undelivered receipts.
///
/// Appends from several threads are safe; the connection is behind a mutex
/// and ids come from `AUTOINCREMENT`.
pub struct ReceiptStore {
    conn: Mutex<Connection>,
}

impl ReceiptStore {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(|e| db_err("open", e))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| db_err("WAL pragma", e))?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| db_err("create table", e))?;
        info!("receipt store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| db_err("open in-memory", e))?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| db_err("create table", e))?;
        debug!("in-memory receipt store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Save a receipt. Returns the stored record.
    #[instrument(skip(self, document))]
    pub fn append(&self, printer_id: &str, document: &ReceiptDocument) -> Result<PersistedReceipt> {
        let json = serde_json::to_string(document)?;
        let fingerprint = fingerprint(&json);
        let saved_at = Utc::now();

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO saved_receipts (printer_id, document, saved_at, fingerprint)
             VALUES (?1, ?2, ?3, ?4)",
            params![printer_id, json, saved_at.to_rfc3339(), fingerprint],
        )
        .map_err(|e| db_err("insert receipt", e))?;
        let id = conn.last_insert_rowid();

        info!(id, %fingerprint, "receipt saved locally");
        Ok(PersistedReceipt {
            id,
            printer_id: printer_id.to_string(),
            document: document.clone(),
            saved_at,
            fingerprint,
        })
    }

    /// Every saved receipt, oldest first.
    pub fn all(&self) -> Result<Vec<PersistedReceipt>> {
        self.query(&format!("{SELECT_COLUMNS} ORDER BY id ASC"), None)
    }

    /// The `limit` most recent receipts, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<PersistedReceipt>> {
        self.query(
            &format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ?1"),
            Some(limit as i64),
        )
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM saved_receipts", [], |row| row.get(0))
            .map_err(|e| db_err("count", e))?;
        Ok(n as usize)
    }

    fn query(&self, sql: &str, limit: Option<i64>) -> Result<Vec<PersistedReceipt>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(|e| db_err("prepare", e))?;
        let map_row = |row: &rusqlite::Row<'_>| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        };
        let rows = match limit {
            Some(n) => stmt.query_map(params![n], map_row),
            None => stmt.query_map([], map_row),
        }
        .map_err(|e| db_err("query receipts", e))?;

        let mut receipts = Vec::new();
        for row in rows {
            let (id, printer_id, document, saved_at, fingerprint) =
                row.map_err(|e| db_err("read row", e))?;
            let saved_at = DateTime::parse_from_rfc3339(&saved_at)
                .map_err(|e| TillwerkError::Database(format!("bad saved_at '{saved_at}': {e}")))?
                .with_timezone(&Utc);
            receipts.push(PersistedReceipt {
                id,
                printer_id,
                document: serde_json::from_str(&document)?,
                saved_at,
                fingerprint,
            });
        }
        Ok(receipts)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TillwerkError::Database("receipt store lock poisoned".into()))
    }
}

/// SHA-256 hex digest of a serialized document.
pub fn fingerprint(document_json: &str) -> String {
    hex::encode(Sha256::digest(document_json.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tillwerk_core::types::LineItem;

    fn order(total: f64) -> ReceiptDocument {
        ReceiptDocument::new("Table 4", total).with_item(LineItem::new("Soup", 1, total))
    }

    #[test]
    fn append_then_read_back() {
        let store = ReceiptStore::open_in_memory().unwrap();
        let saved = store.append("kitchen-1", &order(6.5)).unwrap();
        assert_eq!(saved.fingerprint.len(), 64);

        let all = store.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, saved.id);
        assert_eq!(all[0].printer_id, "kitchen-1");
        assert_eq!(all[0].document, order_with_time(6.5, &saved.document));
        assert_eq!(all[0].fingerprint, saved.fingerprint);
    }

    fn order_with_time(total: f64, like: &ReceiptDocument) -> ReceiptDocument {
        let mut doc = order(total);
        doc.timestamp = like.timestamp;
        doc
    }

    #[test]
    fn recent_is_newest_first() {
        let store = ReceiptStore::open_in_memory().unwrap();
        for total in [1.0, 2.0, 3.0] {
            store.append("bar-1", &order(total)).unwrap();
        }
        let recent = store.recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].document.total, Some(3.0));
        assert_eq!(recent[1].document.total, Some(2.0));
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn concurrent_appends_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ReceiptStore::open(dir.path().join("receipts.db")).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.append(&format!("p-{i}"), &order(i as f64)).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let ids: std::collections::HashSet<_> =
            store.all().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(fingerprint("{}"), fingerprint("{}"));
        assert_ne!(fingerprint("{}"), fingerprint("[]"));
    }
}
