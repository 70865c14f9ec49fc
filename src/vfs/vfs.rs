//! SQLite VFS implementation
//!
//! Implements the sqlite3_vfs interface on top of a [`Vfs`] implementation.
//! [`SlsVfs`] serves plain files from the local filesystem through
//! [`SlsFile`] handles.

use super::file::{io_methods, DatabaseFile, FileHandle, OpenHandle, SlsFile};
use super::flags::{AccessMode, OpenFlags};
use super::registry;
use crate::config::VfsConfig;
use crate::error::{Result, ResultCode, VfsError};
use crate::io::BackingFile;
use chrono::Utc;
use libsqlite3_sys as ffi;
use rand::RngCore;
use std::borrow::Cow;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;
use std::slice;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Path SQLite uses for in-memory databases
pub const MEMORY_DB: &str = ":memory:";

/// Julian day of the Unix epoch, in milliseconds
const UNIX_EPOCH_JULIAN_MS: i64 = 210_866_760_000_000;

const MS_PER_DAY: f64 = 86_400_000.0;

const DL_ERROR_MESSAGE: &str = "Loadable extensions are not supported";

/// Filesystem-level operations SQLite performs through a VFS
pub trait Vfs: Send + Sync {
    type File: DatabaseFile;

    /// Open `path`. `None` asks for a temporary file.
    fn open(&self, path: Option<&str>, flags: OpenFlags) -> Result<Self::File>;

    fn delete(&self, path: &str, sync_dir: bool) -> Result<()>;

    /// Answer an access question. The boolean is the answer; `Err` means
    /// the question itself could not be asked.
    fn access(&self, path: &str, mode: AccessMode) -> Result<bool>;

    fn full_pathname<'a>(&self, path: &'a str) -> Result<Cow<'a, str>>;

    fn dl_open(&self, _path: Option<&str>) -> Result<()> {
        Err(VfsError::NotSupported("dl_open"))
    }

    fn dl_error(&self) -> String {
        DL_ERROR_MESSAGE.to_string()
    }

    fn dl_sym(&self, _symbol: &str) -> Result<()> {
        Err(VfsError::NotSupported("dl_sym"))
    }

    fn dl_close(&self) {}

    /// Fill `buf` with random bytes, returning how many were written
    fn randomness(&self, buf: &mut [u8]) -> usize;

    /// Block the calling thread, returning how long it slept
    fn sleep(&self, duration: Duration) -> Duration;

    /// Current time as a Julian day number
    fn current_time(&self) -> f64 {
        self.current_time_int64() as f64 / MS_PER_DAY
    }

    /// Current time as Julian day milliseconds
    fn current_time_int64(&self) -> i64;
}

/// Whole-file read/write VFS over the local filesystem
#[derive(Debug, Clone)]
pub struct SlsVfs {
    sector_size: u32,
}

impl SlsVfs {
    pub fn new(config: &VfsConfig) -> Self {
        SlsVfs {
            sector_size: config.sector_size,
        }
    }
}

impl Default for SlsVfs {
    fn default() -> Self {
        Self::new(&VfsConfig::default())
    }
}

impl Vfs for SlsVfs {
    type File = SlsFile;

    fn open(&self, path: Option<&str>, flags: OpenFlags) -> Result<SlsFile> {
        debug!(
            "Opening {:?} as {:?} (flags 0x{:x})",
            path,
            flags.kind(),
            flags.raw()
        );

        let path = match path {
            Some(p) if !p.is_empty() => p,
            _ => {
                warn!("Refusing to open a database without a name");
                return Err(VfsError::CannotOpen("empty database name".into()));
            }
        };
        if path == MEMORY_DB {
            warn!("Refusing to open an in-memory database");
            return Err(VfsError::MemoryDatabase);
        }

        let backing = BackingFile::new(path);
        backing.touch().map_err(|e| {
            warn!("Cannot create {}: {}", path, e);
            VfsError::CannotOpen(format!("{}: {}", path, e))
        })?;
        if backing.is_empty().unwrap_or(false) {
            debug!("{} is empty, SQLite will initialize it", path);
        }

        trace!("OS open flags for {}: 0x{:x}", path, flags.os_flags());
        Ok(SlsFile::new(path, self.sector_size, flags))
    }

    fn delete(&self, path: &str, sync_dir: bool) -> Result<()> {
        debug!("Deleting {} (sync_dir={})", path, sync_dir);
        let file = BackingFile::new(path);
        if !file.exists() {
            warn!("Cannot delete {}: file does not exist", path);
            return Err(VfsError::DeleteFailed {
                path: path.to_string(),
                reason: "file does not exist".into(),
            });
        }

        file.remove().map_err(|e| {
            warn!("Cannot delete {}: {}", path, e);
            VfsError::DeleteFailed {
                path: path.to_string(),
                reason: e.to_string(),
            }
        })
    }

    fn access(&self, path: &str, mode: AccessMode) -> Result<bool> {
        let c_path = match CString::new(path) {
            Ok(p) => p,
            Err(_) => return Ok(false),
        };
        let allowed = unsafe { libc::access(c_path.as_ptr(), mode.libc_mode()) } == 0;
        trace!("Access {:?} on {}: {}", mode, path, allowed);
        Ok(allowed)
    }

    /// Paths are returned as given. Relative paths are not resolved, so
    /// callers must pass canonical paths.
    fn full_pathname<'a>(&self, path: &'a str) -> Result<Cow<'a, str>> {
        Ok(Cow::Borrowed(path))
    }

    fn randomness(&self, buf: &mut [u8]) -> usize {
        rand::thread_rng().fill_bytes(buf);
        buf.len()
    }

    fn sleep(&self, duration: Duration) -> Duration {
        trace!("Sleeping {:?}", duration);
        std::thread::sleep(duration);
        duration
    }

    fn current_time_int64(&self) -> i64 {
        UNIX_EPOCH_JULIAN_MS + Utc::now().timestamp_millis()
    }
}

/// Everything a registered VFS needs to outlive its registration call
pub(crate) struct VfsState<V: Vfs> {
    pub(crate) vfs: V,
    pub(crate) name: CString,
    pub(crate) io_methods: ffi::sqlite3_io_methods,
    /// Handles opened through this VFS and not yet closed
    pub(crate) open_files: Arc<AtomicUsize>,
}

/// Build the boxed descriptor for `vfs`. Ownership of both allocations passes
/// to the returned pointer; release it with [`release_descriptor`].
/// `open_files` tracks the handles opened through it.
pub(crate) fn build_descriptor<V: Vfs + 'static>(
    vfs: V,
    config: &VfsConfig,
    open_files: Arc<AtomicUsize>,
) -> Result<*mut ffi::sqlite3_vfs> {
    let state = Box::new(VfsState {
        vfs,
        name: CString::new(config.name.as_str())?,
        io_methods: io_methods::<V::File>(),
        open_files,
    });
    let z_name = state.name.as_ptr();
    let state_ptr = Box::into_raw(state);

    let descriptor = Box::new(ffi::sqlite3_vfs {
        iVersion: 2,
        szOsFile: std::mem::size_of::<FileHandle<V::File>>() as c_int,
        mxPathname: config.max_pathname as c_int,
        pNext: ptr::null_mut(),
        zName: z_name,
        pAppData: state_ptr as *mut c_void,
        xOpen: Some(vfs_open::<V>),
        xDelete: Some(vfs_delete::<V>),
        xAccess: Some(vfs_access::<V>),
        xFullPathname: Some(vfs_full_pathname::<V>),
        xDlOpen: Some(vfs_dl_open::<V>),
        xDlError: Some(vfs_dl_error::<V>),
        xDlSym: Some(vfs_dl_sym::<V>),
        xDlClose: Some(vfs_dl_close::<V>),
        xRandomness: Some(vfs_randomness::<V>),
        xSleep: Some(vfs_sleep::<V>),
        xCurrentTime: Some(vfs_current_time::<V>),
        xGetLastError: None,
        xCurrentTimeInt64: Some(vfs_current_time_int64::<V>),
        xSetSystemCall: None,
        xGetSystemCall: None,
        xNextSystemCall: None,
    });

    Ok(Box::into_raw(descriptor))
}

/// Free a descriptor made by [`build_descriptor`].
///
/// # Safety
/// `raw` must come from `build_descriptor::<V>`, must no longer be registered
/// with SQLite, and no file opened through it may still be open.
pub(crate) unsafe fn release_descriptor<V: Vfs>(raw: *mut ffi::sqlite3_vfs) {
    let descriptor = Box::from_raw(raw);
    if !descriptor.pAppData.is_null() {
        drop(Box::from_raw(descriptor.pAppData as *mut VfsState<V>));
    }
}

/// Register the slsql VFS with SQLite.
///
/// The VFS is a process-wide singleton: a second call fails with
/// [`VfsError::AlreadyRegistered`] until [`unregister_vfs`] runs. Failing to
/// register leaves SQLite without the backend, so callers should treat an
/// error here as fatal.
pub fn register_vfs(config: &VfsConfig) -> Result<()> {
    config.validate()?;
    registry::register(SlsVfs::new(config), config)
}

/// Unregister the slsql VFS and free its descriptor.
///
/// Fails with [`VfsError::InUse`] while any file opened through the VFS is
/// still open, so connections using it must be closed first.
pub fn unregister_vfs() -> Result<()> {
    registry::unregister()
}

/// Name of the currently registered VFS, if any
pub fn registered_vfs_name() -> Option<String> {
    registry::registered_name()
}

// VFS callback functions

unsafe fn vfs_state<'a, V: Vfs>(vfs: *mut ffi::sqlite3_vfs) -> Option<&'a VfsState<V>> {
    let vfs = vfs.as_ref()?;
    (vfs.pAppData as *const VfsState<V>).as_ref()
}

unsafe fn c_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}

unsafe extern "C" fn vfs_open<V: Vfs>(
    vfs: *mut ffi::sqlite3_vfs,
    z_name: *const c_char,
    file: *mut ffi::sqlite3_file,
    flags: c_int,
    p_out_flags: *mut c_int,
) -> c_int {
    let state = match vfs_state::<V>(vfs) {
        Some(s) => s,
        None => return ffi::SQLITE_ERROR,
    };
    if file.is_null() {
        return ffi::SQLITE_CANTOPEN;
    }

    let name = if z_name.is_null() {
        None
    } else {
        match c_str(z_name) {
            Some(name) => Some(name),
            None => return ffi::SQLITE_CANTOPEN,
        }
    };

    let flags = OpenFlags::from_raw(flags);
    let opened = match state.vfs.open(name, flags) {
        Ok(f) => f,
        Err(e) => return e.code(),
    };

    let handle = file as *mut FileHandle<V::File>;
    ptr::write_bytes(handle, 0, 1);
    (*handle).file.write(opened);
    (*handle).open.write(OpenHandle::new(&state.open_files));
    (*handle).base.pMethods = &state.io_methods;

    if !p_out_flags.is_null() {
        *p_out_flags = flags.raw();
    }
    ffi::SQLITE_OK
}

unsafe extern "C" fn vfs_delete<V: Vfs>(
    vfs: *mut ffi::sqlite3_vfs,
    z_name: *const c_char,
    sync_dir: c_int,
) -> c_int {
    let state = match vfs_state::<V>(vfs) {
        Some(s) => s,
        None => return ffi::SQLITE_ERROR,
    };
    let path = match c_str(z_name) {
        Some(p) => p,
        None => return ffi::SQLITE_IOERR_DELETE,
    };

    ResultCode::from(&state.vfs.delete(path, sync_dir != 0)).raw()
}

unsafe extern "C" fn vfs_access<V: Vfs>(
    vfs: *mut ffi::sqlite3_vfs,
    z_name: *const c_char,
    flags: c_int,
    p_res_out: *mut c_int,
) -> c_int {
    let state = match vfs_state::<V>(vfs) {
        Some(s) => s,
        None => return ffi::SQLITE_ERROR,
    };
    let (path, mode) = match (c_str(z_name), AccessMode::from_raw(flags)) {
        (Some(p), Some(m)) => (p, m),
        _ => return ffi::SQLITE_IOERR_ACCESS,
    };

    match state.vfs.access(path, mode) {
        Ok(allowed) => {
            if !p_res_out.is_null() {
                *p_res_out = allowed as c_int;
            }
            ffi::SQLITE_OK
        }
        Err(e) => e.code(),
    }
}

unsafe extern "C" fn vfs_full_pathname<V: Vfs>(
    vfs: *mut ffi::sqlite3_vfs,
    z_name: *const c_char,
    n_out: c_int,
    z_out: *mut c_char,
) -> c_int {
    let state = match vfs_state::<V>(vfs) {
        Some(s) => s,
        None => return ffi::SQLITE_ERROR,
    };
    let path = match c_str(z_name) {
        Some(p) => p,
        None => return ffi::SQLITE_CANTOPEN,
    };

    let full = match state.vfs.full_pathname(path) {
        Ok(full) => full,
        Err(e) => return e.code(),
    };
    trace!("Full pathname of {} is {}", path, full);

    let bytes = full.as_bytes();
    if z_out.is_null() || n_out < 0 || bytes.len() >= n_out as usize {
        return ffi::SQLITE_CANTOPEN;
    }
    let out = slice::from_raw_parts_mut(z_out as *mut u8, bytes.len() + 1);
    out[..bytes.len()].copy_from_slice(bytes);
    out[bytes.len()] = 0;
    ffi::SQLITE_OK
}

unsafe extern "C" fn vfs_dl_open<V: Vfs>(
    vfs: *mut ffi::sqlite3_vfs,
    z_filename: *const c_char,
) -> *mut c_void {
    if let Some(state) = vfs_state::<V>(vfs) {
        let _ = state.vfs.dl_open(c_str(z_filename));
    }
    ptr::null_mut()
}

unsafe extern "C" fn vfs_dl_error<V: Vfs>(
    vfs: *mut ffi::sqlite3_vfs,
    n_byte: c_int,
    z_err_msg: *mut c_char,
) {
    if z_err_msg.is_null() || n_byte <= 0 {
        return;
    }
    let message = match vfs_state::<V>(vfs) {
        Some(state) => state.vfs.dl_error(),
        None => DL_ERROR_MESSAGE.to_string(),
    };

    let out = slice::from_raw_parts_mut(z_err_msg as *mut u8, n_byte as usize);
    let len = message.len().min(out.len() - 1);
    out[..len].copy_from_slice(&message.as_bytes()[..len]);
    out[len] = 0;
}

unsafe extern "C" fn vfs_dl_sym<V: Vfs>(
    vfs: *mut ffi::sqlite3_vfs,
    _p_handle: *mut c_void,
    z_symbol: *const c_char,
) -> Option<unsafe extern "C" fn(*mut ffi::sqlite3_vfs, *mut c_void, *const c_char)> {
    if let (Some(state), Some(symbol)) = (vfs_state::<V>(vfs), c_str(z_symbol)) {
        let _ = state.vfs.dl_sym(symbol);
    }
    None
}

unsafe extern "C" fn vfs_dl_close<V: Vfs>(vfs: *mut ffi::sqlite3_vfs, _p_handle: *mut c_void) {
    if let Some(state) = vfs_state::<V>(vfs) {
        state.vfs.dl_close();
    }
}

unsafe extern "C" fn vfs_randomness<V: Vfs>(
    vfs: *mut ffi::sqlite3_vfs,
    n_byte: c_int,
    z_out: *mut c_char,
) -> c_int {
    let state = match vfs_state::<V>(vfs) {
        Some(s) => s,
        None => return 0,
    };
    if z_out.is_null() || n_byte <= 0 {
        return 0;
    }

    let buf = slice::from_raw_parts_mut(z_out as *mut u8, n_byte as usize);
    state.vfs.randomness(buf) as c_int
}

unsafe extern "C" fn vfs_sleep<V: Vfs>(vfs: *mut ffi::sqlite3_vfs, microseconds: c_int) -> c_int {
    let state = match vfs_state::<V>(vfs) {
        Some(s) => s,
        None => return 0,
    };
    let requested = Duration::from_micros(microseconds.max(0) as u64);
    state.vfs.sleep(requested).as_micros().min(c_int::MAX as u128) as c_int
}

unsafe extern "C" fn vfs_current_time<V: Vfs>(
    vfs: *mut ffi::sqlite3_vfs,
    p_time_out: *mut f64,
) -> c_int {
    match (vfs_state::<V>(vfs), p_time_out.is_null()) {
        (Some(state), false) => {
            *p_time_out = state.vfs.current_time();
            ffi::SQLITE_OK
        }
        _ => ffi::SQLITE_ERROR,
    }
}

unsafe extern "C" fn vfs_current_time_int64<V: Vfs>(
    vfs: *mut ffi::sqlite3_vfs,
    p_time_out: *mut ffi::sqlite3_int64,
) -> c_int {
    match (vfs_state::<V>(vfs), p_time_out.is_null()) {
        (Some(state), false) => {
            *p_time_out = state.vfs.current_time_int64();
            ffi::SQLITE_OK
        }
        _ => ffi::SQLITE_ERROR,
    }
}
