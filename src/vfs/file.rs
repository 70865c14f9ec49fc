//! SQLite file I/O methods implementation
//!
//! Implements sqlite3_io_methods by dispatching every callback into a
//! [`DatabaseFile`]. [`SlsFile`] is the whole-file read/write implementation
//! backed by [`BackingFile`].

use super::flags::{DeviceCharacteristics, LockLevel, OpenFlags};
use crate::error::{ResultCode, Result, VfsError};
use crate::io::BackingFile;
use libsqlite3_sys as ffi;
use std::mem::MaybeUninit;
use std::os::raw::{c_int, c_void};
use std::slice;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Per-handle operations SQLite performs on an open file
pub trait DatabaseFile: Send {
    /// Path the handle was opened with
    fn name(&self) -> &str;

    fn close(&mut self) -> Result<()>;

    /// Fill `buf` from `offset`. Bytes that don't exist must read as zero.
    fn read(&mut self, buf: &mut [u8], offset: u64) -> Result<()>;

    fn write(&mut self, buf: &[u8], offset: u64) -> Result<()>;

    fn truncate(&mut self, size: u64) -> Result<()>;

    fn sync(&mut self, flags: c_int) -> Result<()>;

    fn file_size(&self) -> Result<u64>;

    fn lock(&mut self, level: LockLevel) -> Result<()>;

    fn unlock(&mut self, level: LockLevel) -> Result<()>;

    fn check_reserved_lock(&self) -> Result<bool>;

    fn file_control(&mut self, op: c_int) -> Result<()>;

    fn sector_size(&self) -> u32;

    fn device_characteristics(&self) -> DeviceCharacteristics;
}

/// Capabilities advertised for every file. They describe the storage the
/// positioned writes land on; nothing here enforces them.
pub const DEVICE_CHARACTERISTICS: DeviceCharacteristics = DeviceCharacteristics::empty()
    .union(DeviceCharacteristics::ATOMIC_64K)
    .union(DeviceCharacteristics::SAFE_APPEND)
    .union(DeviceCharacteristics::POWERSAFE_OVERWRITE)
    .union(DeviceCharacteristics::UNDELETABLE_WHEN_OPEN);

/// A database file that is reopened by path on every read and write
#[derive(Debug)]
pub struct SlsFile {
    name: String,
    backing: BackingFile,
    /// Size of the most recent write; diagnostics only
    block_size: usize,
    sector_size: u32,
    flags: OpenFlags,
}

impl SlsFile {
    pub fn new(name: &str, sector_size: u32, flags: OpenFlags) -> Self {
        SlsFile {
            name: name.to_string(),
            backing: BackingFile::new(name),
            block_size: 0,
            sector_size,
            flags,
        }
    }

    /// Length of the last write request
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn open_flags(&self) -> OpenFlags {
        self.flags
    }
}

impl DatabaseFile for SlsFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) -> Result<()> {
        debug!("Closing {} (last block {} bytes)", self.name, self.block_size);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], offset: u64) -> Result<()> {
        trace!("Reading {} bytes at {} from {}", buf.len(), offset, self.name);
        buf.fill(0);

        let transfer = self.backing.read_at(buf, offset)?;
        if !transfer.is_complete() {
            trace!(
                "Short read on {}: expected {} got {}",
                self.name,
                transfer.requested,
                transfer.transferred
            );
            return Err(VfsError::ShortRead {
                expected: transfer.requested,
                actual: transfer.transferred,
            });
        }
        Ok(())
    }

    fn write(&mut self, buf: &[u8], offset: u64) -> Result<()> {
        self.block_size = buf.len();
        trace!("Writing {} bytes at {} to {}", buf.len(), offset, self.name);

        let transfer = self.backing.write_at(buf, offset).map_err(|e| {
            warn!("Write to {} failed: {}", self.name, e);
            VfsError::WriteFailed(e)
        })?;
        if !transfer.is_complete() {
            warn!(
                "Short write on {}: expected {} wrote {}",
                self.name, transfer.requested, transfer.transferred
            );
            return Err(VfsError::WriteShortfall {
                expected: transfer.requested,
                actual: transfer.transferred,
            });
        }
        Ok(())
    }

    fn truncate(&mut self, size: u64) -> Result<()> {
        trace!("Ignoring truncate of {} to {}", self.name, size);
        Ok(())
    }

    fn sync(&mut self, flags: c_int) -> Result<()> {
        trace!("Ignoring sync of {} (flags 0x{:x})", self.name, flags);
        Ok(())
    }

    fn file_size(&self) -> Result<u64> {
        if !self.backing.exists() {
            warn!("File size requested for missing file {}", self.name);
            return Err(VfsError::NotFound(self.name.clone()));
        }
        let size = self.backing.len()?;
        trace!("Size of {} is {}", self.name, size);
        Ok(size)
    }

    fn lock(&mut self, level: LockLevel) -> Result<()> {
        trace!("Lock {:?} on {}", level, self.name);
        Ok(())
    }

    fn unlock(&mut self, level: LockLevel) -> Result<()> {
        trace!("Unlock to {:?} on {}", level, self.name);
        Ok(())
    }

    fn check_reserved_lock(&self) -> Result<bool> {
        Ok(false)
    }

    fn file_control(&mut self, op: c_int) -> Result<()> {
        trace!("File control {} on {}", op, self.name);
        Err(VfsError::NotSupported("file_control"))
    }

    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn device_characteristics(&self) -> DeviceCharacteristics {
        DEVICE_CHARACTERISTICS
    }
}

/// Counts one open handle against its VFS for as long as it lives
#[derive(Debug)]
pub struct OpenHandle(Arc<AtomicUsize>);

impl OpenHandle {
    pub fn new(open_files: &Arc<AtomicUsize>) -> Self {
        open_files.fetch_add(1, Ordering::AcqRel);
        OpenHandle(Arc::clone(open_files))
    }
}

impl Drop for OpenHandle {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Handle record allocated by SQLite (`szOsFile` bytes)
#[repr(C)]
pub struct FileHandle<F> {
    /// Base sqlite3_file structure (MUST be first field)
    pub base: ffi::sqlite3_file,
    /// Initialized by xOpen once it succeeds, dropped by xClose
    pub file: MaybeUninit<F>,
    /// Same lifetime as `file`
    pub open: MaybeUninit<OpenHandle>,
}

/// Method table bound to every handle of file type `F`
pub fn io_methods<F: DatabaseFile>() -> ffi::sqlite3_io_methods {
    ffi::sqlite3_io_methods {
        iVersion: 1,
        xClose: Some(file_close::<F>),
        xRead: Some(file_read::<F>),
        xWrite: Some(file_write::<F>),
        xTruncate: Some(file_truncate::<F>),
        xSync: Some(file_sync::<F>),
        xFileSize: Some(file_file_size::<F>),
        xLock: Some(file_lock::<F>),
        xUnlock: Some(file_unlock::<F>),
        xCheckReservedLock: Some(file_check_reserved_lock::<F>),
        xFileControl: Some(file_file_control::<F>),
        xSectorSize: Some(file_sector_size::<F>),
        xDeviceCharacteristics: Some(file_device_characteristics::<F>),
        xShmMap: None,
        xShmLock: None,
        xShmBarrier: None,
        xShmUnmap: None,
        xFetch: None,
        xUnfetch: None,
    }
}

/// Recover the Rust file state behind a handle SQLite passes back in.
///
/// # Safety
/// `file` must point to a `FileHandle<F>` that a successful xOpen populated
/// and that has not been closed.
unsafe fn file_state<'a, F>(file: *mut ffi::sqlite3_file) -> Option<&'a mut F> {
    let handle = (file as *mut FileHandle<F>).as_mut()?;
    Some(handle.file.assume_init_mut())
}

fn report<T>(result: &Result<T>) -> c_int {
    ResultCode::from(result).raw()
}

// File I/O method implementations

unsafe extern "C" fn file_close<F: DatabaseFile>(file: *mut ffi::sqlite3_file) -> c_int {
    let handle = match (file as *mut FileHandle<F>).as_mut() {
        Some(h) => h,
        None => return ffi::SQLITE_IOERR_CLOSE,
    };

    let result = handle.file.assume_init_mut().close();
    handle.file.assume_init_drop();
    handle.open.assume_init_drop();
    handle.base.pMethods = std::ptr::null();
    report(&result)
}

unsafe extern "C" fn file_read<F: DatabaseFile>(
    file: *mut ffi::sqlite3_file,
    buf: *mut c_void,
    amt: c_int,
    offset: ffi::sqlite3_int64,
) -> c_int {
    let state = match file_state::<F>(file) {
        Some(f) => f,
        None => return ffi::SQLITE_IOERR_READ,
    };
    if buf.is_null() || amt < 0 || offset < 0 {
        return ffi::SQLITE_IOERR_READ;
    }

    let buf = slice::from_raw_parts_mut(buf as *mut u8, amt as usize);
    report(&state.read(buf, offset as u64))
}

unsafe extern "C" fn file_write<F: DatabaseFile>(
    file: *mut ffi::sqlite3_file,
    buf: *const c_void,
    amt: c_int,
    offset: ffi::sqlite3_int64,
) -> c_int {
    let state = match file_state::<F>(file) {
        Some(f) => f,
        None => return ffi::SQLITE_IOERR_WRITE,
    };
    if buf.is_null() || amt < 0 || offset < 0 {
        return ffi::SQLITE_IOERR_WRITE;
    }

    let buf = slice::from_raw_parts(buf as *const u8, amt as usize);
    report(&state.write(buf, offset as u64))
}

unsafe extern "C" fn file_truncate<F: DatabaseFile>(
    file: *mut ffi::sqlite3_file,
    size: ffi::sqlite3_int64,
) -> c_int {
    let state = match file_state::<F>(file) {
        Some(f) => f,
        None => return ffi::SQLITE_IOERR_TRUNCATE,
    };
    if size < 0 {
        return ffi::SQLITE_IOERR_TRUNCATE;
    }
    report(&state.truncate(size as u64))
}

unsafe extern "C" fn file_sync<F: DatabaseFile>(
    file: *mut ffi::sqlite3_file,
    flags: c_int,
) -> c_int {
    match file_state::<F>(file) {
        Some(state) => report(&state.sync(flags)),
        None => ffi::SQLITE_IOERR_FSYNC,
    }
}

unsafe extern "C" fn file_file_size<F: DatabaseFile>(
    file: *mut ffi::sqlite3_file,
    p_size: *mut ffi::sqlite3_int64,
) -> c_int {
    let state = match file_state::<F>(file) {
        Some(f) => f,
        None => return ffi::SQLITE_IOERR_FSTAT,
    };

    let result = state.file_size();
    if let (Ok(size), false) = (&result, p_size.is_null()) {
        *p_size = *size as ffi::sqlite3_int64;
    }
    report(&result)
}

unsafe extern "C" fn file_lock<F: DatabaseFile>(
    file: *mut ffi::sqlite3_file,
    lock_type: c_int,
) -> c_int {
    match file_state::<F>(file) {
        Some(state) => report(&state.lock(LockLevel::from_raw(lock_type))),
        None => ffi::SQLITE_IOERR_LOCK,
    }
}

unsafe extern "C" fn file_unlock<F: DatabaseFile>(
    file: *mut ffi::sqlite3_file,
    lock_type: c_int,
) -> c_int {
    match file_state::<F>(file) {
        Some(state) => report(&state.unlock(LockLevel::from_raw(lock_type))),
        None => ffi::SQLITE_IOERR_UNLOCK,
    }
}

unsafe extern "C" fn file_check_reserved_lock<F: DatabaseFile>(
    file: *mut ffi::sqlite3_file,
    p_res_out: *mut c_int,
) -> c_int {
    let state = match file_state::<F>(file) {
        Some(f) => f,
        None => return ffi::SQLITE_IOERR_CHECKRESERVEDLOCK,
    };

    let result = state.check_reserved_lock();
    if !p_res_out.is_null() {
        *p_res_out = matches!(result, Ok(true)) as c_int;
    }
    report(&result)
}

unsafe extern "C" fn file_file_control<F: DatabaseFile>(
    file: *mut ffi::sqlite3_file,
    op: c_int,
    _p_arg: *mut c_void,
) -> c_int {
    match file_state::<F>(file) {
        Some(state) => report(&state.file_control(op)),
        None => ffi::SQLITE_NOTFOUND,
    }
}

unsafe extern "C" fn file_sector_size<F: DatabaseFile>(file: *mut ffi::sqlite3_file) -> c_int {
    match file_state::<F>(file) {
        Some(state) => state.sector_size() as c_int,
        None => 0,
    }
}

unsafe extern "C" fn file_device_characteristics<F: DatabaseFile>(
    file: *mut ffi::sqlite3_file,
) -> c_int {
    match file_state::<F>(file) {
        Some(state) => state.device_characteristics().raw(),
        None => 0,
    }
}
