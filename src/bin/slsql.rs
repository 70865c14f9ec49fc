//! slsql demo driver
//!
//! Creates a database with SQLite's default VFS, then registers the slsql VFS
//! and keeps working on the same database through it.

use anyhow::{Context, Result};
use clap::Parser;
use rusqlite::{Connection, OpenFlags};
use slsql::{register_vfs, BackingFile, VfsConfig};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "slsql")]
#[command(about = "Run a small SQL workload through the slsql VFS")]
struct Args {
    /// Database file to create
    #[arg(short = 'd', long, default_value = "test.db")]
    db: PathBuf,

    /// VFS configuration file (TOML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Example file written through the positioned I/O helpers
    #[arg(long, default_value = "example.txt")]
    example_file: PathBuf,

    /// Print every environment variable before starting
    #[arg(long)]
    dump_env: bool,
}

fn dump_env() {
    for (key, value) in std::env::vars_os() {
        eprintln!("dump_env: {}={}", key.to_string_lossy(), value.to_string_lossy());
    }
}

/// Two 128-byte blocks, the second directly after the first, then a 12-byte read back
fn write_example_file(path: &Path) -> Result<()> {
    let file = BackingFile::new(path);

    let mut first = [0u8; 128];
    first[..12].copy_from_slice(b"Hello\0World!");
    let mut second = [0u8; 128];
    second[..14].copy_from_slice(b"Just for test!");

    file.write_at(&first, 0)?;
    file.write_at(&second, first.len() as u64)?;

    let mut buf = [0u8; 12];
    file.read_at(&mut buf, 0)?;
    info!("Read: {:?}", String::from_utf8_lossy(&buf));
    Ok(())
}

fn db_uri(db: &Path, vfs: Option<&str>) -> String {
    match vfs {
        Some(vfs) => format!("file:{}?cache=shared&vfs={}", db.display(), vfs),
        None => format!("file:{}?cache=shared", db.display()),
    }
}

fn open(uri: &str) -> Result<Connection> {
    Connection::open_with_flags(
        uri,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_URI,
    )
    .with_context(|| format!("cannot open database {}", uri))
}

fn dump_rows(conn: &Connection) -> Result<()> {
    let mut stmt = conn
        .prepare("SELECT id, name FROM test ORDER BY id")
        .context("cannot select rows")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
    for row in rows {
        let (id, name) = row?;
        info!("id: {}, name: {}", id, name);
    }
    info!("------");
    Ok(())
}

/// Build the database with SQLite's own VFS
fn create_with_default_vfs(db: &Path) -> Result<()> {
    let conn = open(&db_uri(db, None))?;

    conn.pragma_update(None, "page_size", 65536)
        .context("cannot set pragma")?;
    conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)", [])
        .context("cannot create table")?;
    conn.execute(
        "INSERT INTO test (id, name) VALUES (1, 'hello'), (2, 'world'), (3, 'OK')",
        [],
    )
    .context("cannot insert rows")?;
    dump_rows(&conn)?;

    conn.close().map_err(|(_, e)| e).context("cannot close")?;
    info!("database created");
    Ok(())
}

/// Reopen the same database through the slsql VFS
fn exercise_slsql_vfs(db: &Path, vfs: &str) -> Result<()> {
    let conn = open(&db_uri(db, Some(vfs)))?;

    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "PERSIST", |row| row.get(0))
        .context("cannot set pragma")?;
    info!("journal_mode: {}", mode);

    info!("select rows");
    dump_rows(&conn)?;

    info!("insert rows");
    conn.execute("INSERT INTO test (id, name) VALUES (4, 'Oh...')", [])
        .context("cannot insert rows")?;

    info!("select rows");
    dump_rows(&conn)?;

    info!("close database");
    conn.close().map_err(|(_, e)| e).context("cannot close")?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.dump_env {
        dump_env();
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = match &args.config {
        Some(path) => VfsConfig::load(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => VfsConfig::default(),
    };

    info!("CWD: {}", std::env::current_dir()?.display());
    info!("SQLite version: {}", rusqlite::version());

    write_example_file(&args.example_file)?;

    if args.db.exists() {
        std::fs::remove_file(&args.db)
            .with_context(|| format!("cannot remove {}", args.db.display()))?;
    }
    create_with_default_vfs(&args.db)?;

    info!("register new vfs");
    register_vfs(&config).context("cannot register slsql vfs")?;
    exercise_slsql_vfs(&args.db, &config.name)?;

    info!("end");
    Ok(())
}
