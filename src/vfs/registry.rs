//! Process-wide VFS registration slot
//!
//! SQLite keeps one global list of VFSes. This crate claims a single entry in
//! it: [`register`] fills the slot once, [`unregister`] empties it.

use super::vfs::{build_descriptor, release_descriptor, Vfs};
use crate::config::VfsConfig;
use crate::error::{Result, VfsError};
use libsqlite3_sys as ffi;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

struct Registration {
    name: String,
    descriptor: *mut ffi::sqlite3_vfs,
    release: unsafe fn(*mut ffi::sqlite3_vfs),
    open_files: Arc<AtomicUsize>,
}

// The descriptor is only touched by SQLite (which synchronizes its VFS list)
// and by `unregister`, which holds the slot lock and only frees it once no
// handle refers to it.
unsafe impl Send for Registration {}

static REGISTRATION: Mutex<Option<Registration>> = parking_lot::const_mutex(None);

pub(crate) fn register<V: Vfs + 'static>(vfs: V, config: &VfsConfig) -> Result<()> {
    let mut slot = REGISTRATION.lock();
    if let Some(existing) = slot.as_ref() {
        return Err(VfsError::AlreadyRegistered(existing.name.clone()));
    }

    let open_files = Arc::new(AtomicUsize::new(0));
    let descriptor = build_descriptor(vfs, config, Arc::clone(&open_files))?;
    let rc = unsafe { ffi::sqlite3_vfs_register(descriptor, config.make_default as i32) };
    if rc != ffi::SQLITE_OK {
        error!("Cannot register VFS '{}': rc={}", config.name, rc);
        unsafe { release_descriptor::<V>(descriptor) };
        return Err(VfsError::RegistrationFailed(rc));
    }

    info!(
        "Registered VFS '{}' (default={})",
        config.name, config.make_default
    );
    *slot = Some(Registration {
        name: config.name.clone(),
        descriptor,
        release: release_descriptor::<V>,
        open_files,
    });
    Ok(())
}

pub(crate) fn unregister() -> Result<()> {
    let mut slot = REGISTRATION.lock();
    let registration = match slot.take() {
        Some(r) => r,
        None => return Ok(()),
    };

    // Open handles keep pointers into the descriptor's method table
    let open = registration.open_files.load(Ordering::Acquire);
    if open > 0 {
        warn!(
            "Cannot unregister VFS '{}': {} file(s) still open",
            registration.name, open
        );
        let name = registration.name.clone();
        *slot = Some(registration);
        return Err(VfsError::InUse { name, open });
    }

    let rc = unsafe { ffi::sqlite3_vfs_unregister(registration.descriptor) };
    if rc != ffi::SQLITE_OK {
        error!("Cannot unregister VFS '{}': rc={}", registration.name, rc);
        *slot = Some(registration);
        return Err(VfsError::RegistrationFailed(rc));
    }

    unsafe { (registration.release)(registration.descriptor) };
    debug!("Unregistered VFS '{}'", registration.name);
    Ok(())
}

pub(crate) fn registered_name() -> Option<String> {
    REGISTRATION.lock().as_ref().map(|r| r.name.clone())
}
