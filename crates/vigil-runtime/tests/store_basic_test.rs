use serde_json::json;

use vigil_runtime::Error;
use vigil_runtime::bus::LocalBus;
use vigil_runtime::proxy::{NamespaceProxy, ProxyShape, RootConnection};
use vigil_runtime::store::{SqliteStore, VariableStore};

#[test]
fn sqlite_store_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("vars.db");

    {
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.register("cpu.load", json!(1), false).unwrap());
        store.set("cpu.load", json!("12.75")).unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    assert!(!store.register("cpu.load", json!(1), false).unwrap());
    assert_eq!(store.get("cpu.load").unwrap(), json!("12.75"));

    let entries = store.variables().unwrap();
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].writable);
}

#[test]
fn schema_version_mismatch_is_rejected() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("vars.db");
    drop(SqliteStore::open(&path).unwrap());

    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute(
        "UPDATE store_metadata SET value = '99' WHERE key = 'schema_version'",
        [],
    )
    .unwrap();
    drop(conn);

    assert!(matches!(SqliteStore::open(&path), Err(Error::Schema(_))));
}

#[test]
fn proxy_round_trip_against_sqlite() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = SqliteStore::open(dir.path().join("vars.db")).unwrap();
    let connection = RootConnection::new("app", "demo.App", store, LocalBus::new());
    connection
        .register_all(&[("app.mode".to_string(), json!("idle"), false)])
        .unwrap();

    let root = NamespaceProxy::build(
        &ProxyShape {
            name: "app".to_string(),
            variables: vec![("mode".to_string(), true)],
            children: Vec::new(),
        },
        Some(connection),
    );

    assert_eq!(root.set("mode", json!("busy")).unwrap(), json!("idle"));
    assert_eq!(root.get("mode").unwrap(), json!("busy"));
}
