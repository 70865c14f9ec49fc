//! SQLite VFS (Virtual File System) backed by plain files
//!
//! This module provides a custom SQLite VFS that redirects SQLite's file I/O
//! to whole-file positioned reads and writes:
//!
//! - Every read and write reopens the file by path
//! - Locking, sync and truncate are accepted and ignored
//! - Reads past end of file come back zero-filled as short reads
//! - One process-wide registration, removable with [`unregister_vfs`]

mod file;
mod flags;
mod registry;
mod vfs;


pub use file::{DatabaseFile, FileHandle, SlsFile, DEVICE_CHARACTERISTICS};
pub use flags::{AccessMode, DeviceCharacteristics, FileKind, LockLevel, OpenFlags};
pub use vfs::{register_vfs, registered_vfs_name, unregister_vfs, SlsVfs, Vfs, MEMORY_DB};
