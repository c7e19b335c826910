// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer registry backed by SQLite.
//
// The whole catalog is loaded into memory on open; reads never touch the
// database. Each mutation rewrites the `printers` table inside a single
// transaction and only then swaps the in-memory copy, so a failed write
// leaves both unchanged.

use std::path::Path;
use std::sync::{Mutex, RwLock};

use rusqlite::{Connection, params};
use tracing::{debug, info, instrument, warn};

use tillwerk_core::error::{Result, TillwerkError};
use tillwerk_core::types::{DeviceId, PrinterDevice};

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS printers (
        position INTEGER PRIMARY KEY,
        id TEXT NOT NULL UNIQUE,
        device TEXT NOT NULL
    )
"#;

fn db_err(context: &str, e: rusqlite::Error) -> TillwerkError {
    TillwerkError::Database(format!("{context}: {e}"))
}

/// Catalog of known printers, ordered by registration.
pub struct PrinterRegistry {
    /// Held for the whole of a mutation; serialises writers.
    conn: Mutex<Connection>,
    devices: RwLock<Vec<PrinterDevice>>,
}

impl PrinterRegistry {
    /// Open (or create) the registry database at `path` and load the catalog.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(|e| db_err("open", e))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| db_err("WAL pragma", e))?;
        let registry = Self::from_connection(conn)?;
        info!(printers = registry.len(), "printer registry opened");
        Ok(registry)
    }

    /// Open an in-memory registry (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| db_err("open in-memory", e))?;
        let registry = Self::from_connection(conn)?;
        debug!("in-memory printer registry opened");
        Ok(registry)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| db_err("create table", e))?;
        let devices = load_catalog(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            devices: RwLock::new(devices),
        })
    }

    /// Add a device. Ids are unique; a duplicate leaves the catalog untouched.
    #[instrument(skip(self, device), fields(printer_id = %device.id))]
    pub fn register(&self, device: PrinterDevice) -> Result<DeviceId> {
        let mut conn = self.lock_writer()?;

        let mut next = self.list();
        if next.iter().any(|d| d.id == device.id) {
            warn!("printer id already registered");
            return Err(TillwerkError::DuplicateId(device.id));
        }
        let id = device.id.clone();
        next.push(device);

        persist_catalog(&mut conn, &next)?;
        self.swap(next);
        info!("printer registered");
        Ok(id)
    }

    /// Look up a device by id.
    pub fn get(&self, id: &str) -> Result<PrinterDevice> {
        self.devices
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| TillwerkError::DeviceNotFound(id.to_string()))
    }

    /// All devices in registration order.
    pub fn list(&self) -> Vec<PrinterDevice> {
        self.devices
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.devices.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove a device by id.
    #[instrument(skip(self))]
    pub fn remove(&self, id: &str) -> Result<()> {
        let mut conn = self.lock_writer()?;

        let mut next = self.list();
        let before = next.len();
        next.retain(|d| d.id != id);
        if next.len() == before {
            return Err(TillwerkError::DeviceNotFound(id.to_string()));
        }

        persist_catalog(&mut conn, &next)?;
        self.swap(next);
        info!("printer removed");
        Ok(())
    }

    fn lock_writer(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TillwerkError::Database("registry connection lock poisoned".into()))
    }

    fn swap(&self, next: Vec<PrinterDevice>) {
        *self.devices.write().unwrap_or_else(|e| e.into_inner()) = next;
    }
}

fn load_catalog(conn: &Connection) -> Result<Vec<PrinterDevice>> {
    let mut stmt = conn
        .prepare("SELECT device FROM printers ORDER BY position ASC")
        .map_err(|e| db_err("prepare load", e))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| db_err("query printers", e))?;

    let mut devices = Vec::new();
    for row in rows {
        let json = row.map_err(|e| db_err("read row", e))?;
        devices.push(serde_json::from_str(&json)?);
    }
    Ok(devices)
}

/// Replace the stored catalog with `devices` in one transaction.
fn persist_catalog(conn: &mut Connection, devices: &[PrinterDevice]) -> Result<()> {
    let tx = conn.transaction().map_err(|e| db_err("begin", e))?;
    tx.execute("DELETE FROM printers", [])
        .map_err(|e| db_err("clear printers", e))?;
    {
        let mut insert = tx
            .prepare("INSERT INTO printers (position, id, device) VALUES (?1, ?2, ?3)")
            .map_err(|e| db_err("prepare insert", e))?;
        for (position, device) in devices.iter().enumerate() {
            let json = serde_json::to_string(device)?;
            insert
                .execute(params![position as i64, device.id, json])
                .map_err(|e| db_err("insert printer", e))?;
        }
    }
    tx.commit().map_err(|e| db_err("commit", e))?;
    debug!(printers = devices.len(), "printer catalog persisted");
    Ok(())
}
