//! # Variable Store SQLite Schema

use rusqlite::{Connection, OptionalExtension};

use crate::{Error, Result};

const STORE_SCHEMA_VERSION: i32 = 1;

const CREATE_VARIABLES: &str = r#"
CREATE TABLE IF NOT EXISTS variables (
    name     TEXT PRIMARY KEY,
    value    TEXT NOT NULL,
    writable INTEGER NOT NULL
)
"#;

const CREATE_METADATA: &str = r#"
CREATE TABLE IF NOT EXISTS store_metadata (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
"#;

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA synchronous = NORMAL")?;
    conn.execute_batch("PRAGMA temp_store = MEMORY")?;
    conn.execute_batch(CREATE_VARIABLES)?;
    conn.execute_batch(CREATE_METADATA)?;

    ensure_schema_version(conn)
}

fn ensure_schema_version(conn: &Connection) -> Result<()> {
    let version: Option<String> = conn
        .query_row(
            "SELECT value FROM store_metadata WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match version {
        Some(value) => {
            let parsed: i32 = value
                .parse()
                .map_err(|_| Error::Schema("store schema version is invalid".to_string()))?;
            if parsed != STORE_SCHEMA_VERSION {
                return Err(Error::Schema(format!(
                    "store schema version mismatch: database has version {parsed}, expected {STORE_SCHEMA_VERSION}"
                )));
            }
        }
        None => {
            conn.execute(
                "INSERT INTO store_metadata (key, value) VALUES ('schema_version', ?)",
                [STORE_SCHEMA_VERSION.to_string()],
            )?;
        }
    }

    Ok(())
}
