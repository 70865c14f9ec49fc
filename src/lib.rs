//! # slsql - Whole-File SQLite VFS
//!
//! `slsql` plugs a custom virtual file system into SQLite. Instead of SQLite's
//! default OS layer, every read and write is served by reopening the database
//! file by path and doing a single positioned transfer:
//!
//! - **No held descriptors**: each read/write opens, seeks, transfers, closes
//! - **No locking or durability work**: lock, sync and truncate always succeed
//! - **Sparse reads**: reads past end of file are zero-filled short reads
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slsql::{register_vfs, Result, VfsConfig};
//!
//! # fn main() -> Result<()> {
//! let config = VfsConfig {
//!     make_default: false,
//!     ..VfsConfig::default()
//! };
//! register_vfs(&config)?;
//!
//! let conn = rusqlite::Connection::open_with_flags(
//!     "file:test.db?vfs=slsql",
//!     rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
//!         | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
//!         | rusqlite::OpenFlags::SQLITE_OPEN_URI,
//! )
//! .expect("open");
//! conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)", [])
//!     .expect("create");
//! # Ok(())
//! # }
//! ```
//!
//! ## Limitations
//!
//! Two connections on the same path are not coordinated. Interleaved writers
//! can corrupt each other, so use one writer per database file. Relative
//! paths are passed through unresolved.

pub mod config;
pub mod error;
pub mod io;
pub mod vfs;

pub use crate::config::{VfsConfig, DEFAULT_MAX_PATHNAME, DEFAULT_SECTOR_SIZE, DEFAULT_VFS_NAME};
pub use crate::error::{Result, ResultCode, VfsError};
pub use crate::io::{BackingFile, Transfer};
pub use crate::vfs::{
    register_vfs, registered_vfs_name, unregister_vfs, AccessMode, DatabaseFile,
    DeviceCharacteristics, FileKind, LockLevel, OpenFlags, SlsFile, SlsVfs, Vfs, MEMORY_DB,
};
