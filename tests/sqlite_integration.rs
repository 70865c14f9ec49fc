//! End-to-end SQL through the slsql VFS
//!
//! Every connection names the VFS in its URI, so the default VFS stays
//! untouched for the rest of the process.

use rusqlite::{params, Connection, OpenFlags};
use slsql::{register_vfs, registered_vfs_name, VfsConfig, VfsError, DEFAULT_VFS_NAME};
use std::path::Path;
use std::sync::Once;
use tempfile::TempDir;

static REGISTER: Once = Once::new();

fn ensure_registered() {
    REGISTER.call_once(|| {
        let config = VfsConfig {
            make_default: false,
            ..VfsConfig::default()
        };
        register_vfs(&config).unwrap();
    });
}

fn open_slsql(path: &Path) -> Connection {
    ensure_registered();
    let uri = format!("file:{}?vfs={}", path.display(), DEFAULT_VFS_NAME);
    Connection::open_with_flags(
        &uri,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_URI,
    )
    .unwrap()
}

#[test]
fn test_registered_once() {
    ensure_registered();
    assert_eq!(registered_vfs_name().as_deref(), Some("slsql"));

    let err = register_vfs(&VfsConfig::default()).unwrap_err();
    assert!(matches!(err, VfsError::AlreadyRegistered(_)));
}

#[test]
fn test_create_insert_select() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let conn = open_slsql(&db_path);
    conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)", [])
        .unwrap();
    conn.execute(
        "INSERT INTO test (id, name) VALUES (1, 'hello'), (2, 'world'), (3, 'OK')",
        [],
    )
    .unwrap();

    let names: Vec<String> = {
        let mut stmt = conn.prepare("SELECT name FROM test ORDER BY id").unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    };
    assert_eq!(names, vec!["hello", "world", "OK"]);
    drop(conn);

    // The file on disk is a regular SQLite database
    let content = std::fs::read(&db_path).unwrap();
    assert!(content.len() > 0);
    assert_eq!(&content[0..16], b"SQLite format 3\0");
}

#[test]
fn test_reopen_native_database() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("native.db");

    // Build with SQLite's default VFS
    {
        let conn = Connection::open(&db_path).unwrap();
        conn.pragma_update(None, "page_size", 65536).unwrap();
        conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)", [])
            .unwrap();
        conn.execute(
            "INSERT INTO test (id, name) VALUES (1, 'hello'), (2, 'world'), (3, 'OK')",
            [],
        )
        .unwrap();
    }

    let conn = open_slsql(&db_path);
    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "PERSIST", |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_lowercase(), "persist");

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM test", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 3);

    conn.execute("INSERT INTO test (id, name) VALUES (4, 'Oh...')", [])
        .unwrap();
    let name: String = conn
        .query_row("SELECT name FROM test WHERE id = 4", [], |row| row.get(0))
        .unwrap();
    assert_eq!(name, "Oh...");
    drop(conn);

    // And the default VFS still reads what slsql wrote
    let conn = Connection::open(&db_path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM test", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 4);
}

#[test]
fn test_persistence_across_connections() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("persist.db");

    {
        let conn = open_slsql(&db_path);
        conn.execute(
            "CREATE TABLE products (id INTEGER PRIMARY KEY, name TEXT, price REAL)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO products (name, price) VALUES (?1, ?2)",
            params!["Widget", 19.99],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO products (name, price) VALUES (?1, ?2)",
            params!["Gadget", 29.99],
        )
        .unwrap();
        conn.close().unwrap();
    }

    let conn = open_slsql(&db_path);
    let total: f64 = conn
        .query_row("SELECT SUM(price) FROM products", [], |row| row.get(0))
        .unwrap();
    assert!((total - 49.98).abs() < 0.01);
}

#[test]
fn test_transactions() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("txn.db");

    let mut conn = open_slsql(&db_path);
    conn.execute("CREATE TABLE accounts (id INTEGER PRIMARY KEY, balance REAL)", [])
        .unwrap();
    conn.execute("INSERT INTO accounts (balance) VALUES (100.0)", [])
        .unwrap();

    {
        let tx = conn.transaction().unwrap();
        tx.execute("UPDATE accounts SET balance = balance - 50.0 WHERE id = 1", [])
            .unwrap();
        tx.commit().unwrap();
    }

    {
        let tx = conn.transaction().unwrap();
        tx.execute("UPDATE accounts SET balance = balance - 100.0 WHERE id = 1", [])
            .unwrap();
        // Dropped without commit: rolls back
    }

    let balance: f64 = conn
        .query_row("SELECT balance FROM accounts WHERE id = 1", [], |row| row.get(0))
        .unwrap();
    assert_eq!(balance, 50.0);

    // Rollback journal is deleted through the VFS after commit
    drop(conn);
    assert!(!temp_dir.path().join("txn.db-journal").exists());
}

#[test]
fn test_memory_database_bypasses_vfs() {
    ensure_registered();

    // SQLite serves :memory: itself and never calls xOpen for it
    let conn = Connection::open_with_flags(
        "file::memory:?vfs=slsql",
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_URI,
    )
    .unwrap();
    let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
    assert_eq!(one, 1);
}
