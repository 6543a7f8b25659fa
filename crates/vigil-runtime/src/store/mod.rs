//! # Variable Store
//!
//! Namespace variables live in a store shared by every monitor of a runtime
//! context, addressed by fully-qualified name (`cpu.load`, `limits.max`).
//!
//! Registration is put-if-absent: a namespace registering its variables
//! against a store that already holds them (a reopened SQLite file, a second
//! runtime context) keeps the stored values.

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::value::Value;

mod memory;
mod schema;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A registered variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableEntry {
    pub name: String,
    pub value: Value,
    /// Write access recorded at registration. Stores keep it as metadata;
    /// access control happens in the proxies.
    pub writable: bool,
}

/// Remote-variable capability used by namespace proxies.
pub trait VariableStore: Send + Sync {
    /// Registers a variable with its initial value. Returns `false` when the
    /// name was already registered (the stored value is kept).
    fn register(&self, name: &str, value: Value, writable: bool) -> Result<bool>;

    /// Reads a variable.
    fn get(&self, name: &str) -> Result<Value>;

    /// Writes a variable and returns its previous value.
    fn set(&self, name: &str, value: Value) -> Result<Value>;

    /// Every registered variable, sorted by name.
    fn variables(&self) -> Result<Vec<VariableEntry>>;
}
