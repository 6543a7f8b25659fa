//! Persistent variable store on SQLite.
//!
//! Values are stored as JSON text, so numeric precision of string-encoded
//! decimals survives a round trip.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, params};

use super::schema::init_schema;
use super::{VariableEntry, VariableStore};
use crate::value::Value;
use crate::{Error, Result};

/// Variable store backed by a single SQLite connection.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a store file.
    pub fn open(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL")?;
        Self::with_connection(conn)
    }

    /// A private in-memory database.
    pub fn in_memory() -> Result<Arc<Self>> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Arc<Self>> {
        init_schema(&conn)?;
        Ok(Arc::new(Self {
            conn: Mutex::new(conn),
        }))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Internal("sqlite store poisoned".to_string()))
    }
}

fn read_value(name: &str, text: Option<String>) -> Result<Value> {
    let text = text.ok_or_else(|| Error::UnknownVariable(name.to_string()))?;
    Ok(serde_json::from_str(&text)?)
}

impl VariableStore for SqliteStore {
    fn register(&self, name: &str, value: Value, writable: bool) -> Result<bool> {
        let encoded = serde_json::to_string(&value)?;
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO variables (name, value, writable) VALUES (?1, ?2, ?3)",
            params![name, encoded, writable],
        )?;
        Ok(inserted == 1)
    }

    fn get(&self, name: &str) -> Result<Value> {
        let conn = self.conn()?;
        let text: Option<String> = conn
            .query_row(
                "SELECT value FROM variables WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        read_value(name, text)
    }

    fn set(&self, name: &str, value: Value) -> Result<Value> {
        let encoded = serde_json::to_string(&value)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let previous: Option<String> = tx
            .query_row(
                "SELECT value FROM variables WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        let previous = read_value(name, previous)?;
        tx.execute(
            "UPDATE variables SET value = ?2 WHERE name = ?1",
            params![name, encoded],
        )?;
        tx.commit()?;
        Ok(previous)
    }

    fn variables(&self) -> Result<Vec<VariableEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name, value, writable FROM variables ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (name, text, writable) = row?;
            entries.push(VariableEntry {
                value: serde_json::from_str(&text)?,
                name,
                writable,
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn in_memory_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.register("limits.max", json!("10.50"), false).unwrap());
        assert_eq!(store.set("limits.max", json!(12)).unwrap(), json!("10.50"));
        assert_eq!(store.get("limits.max").unwrap(), json!(12));
    }

    #[test]
    fn unknown_variable_on_set_leaves_table_untouched() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(matches!(store.set("x", json!(1)), Err(Error::UnknownVariable(_))));
        assert!(store.variables().unwrap().is_empty());
    }
}
