//! Error types for VFS operations

use libsqlite3_sys as ffi;
use std::os::raw::c_int;
use thiserror::Error;

/// VFS operation result type
pub type Result<T> = std::result::Result<T, VfsError>;

/// VFS operation errors
#[derive(Error, Debug)]
pub enum VfsError {
    /// Underlying file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fewer bytes were available than requested
    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    /// Write could not start: the file could not be opened, positioned or flushed
    #[error("Write failed: {0}")]
    WriteFailed(#[source] std::io::Error),

    /// Fewer bytes were written than requested
    #[error("Short write: expected {expected} bytes, wrote {actual}")]
    WriteShortfall { expected: usize, actual: usize },

    /// Database file could not be opened or created
    #[error("Cannot open database: {0}")]
    CannotOpen(String),

    /// In-memory databases never reach this VFS
    #[error("In-memory databases are not supported")]
    MemoryDatabase,

    /// File does not exist
    #[error("File not found: {0}")]
    NotFound(String),

    /// File could not be removed
    #[error("Cannot delete {path}: {reason}")]
    DeleteFailed { path: String, reason: String },

    /// Operation is not implemented by this VFS
    #[error("Operation not supported: {0}")]
    NotSupported(&'static str),

    #[error("VFS registration failed: {0}")]
    RegistrationFailed(i32),

    #[error("VFS already registered: {0}")]
    AlreadyRegistered(String),

    /// Handles opened through the VFS are still live
    #[error("VFS {name} still has {open} open file(s)")]
    InUse { name: String, open: usize },

    #[error("Invalid VFS name: {0}")]
    InvalidName(#[from] std::ffi::NulError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration parse error: {0}")]
    Config(#[from] toml::de::Error),
}

impl VfsError {
    /// Result code reported to SQLite for this error
    pub fn result_code(&self) -> ResultCode {
        match self {
            VfsError::ShortRead { .. } => ResultCode::ShortRead,
            VfsError::WriteFailed(_) | VfsError::WriteShortfall { .. } => ResultCode::WriteError,
            VfsError::CannotOpen(_) => ResultCode::CannotOpen,
            VfsError::NotFound(_) => ResultCode::NotFound,
            VfsError::DeleteFailed { .. } => ResultCode::DeleteError,
            VfsError::NotSupported(_) => ResultCode::NotSupported,
            VfsError::Io(_) | VfsError::MemoryDatabase => ResultCode::IoError,
            VfsError::RegistrationFailed(_)
            | VfsError::AlreadyRegistered(_)
            | VfsError::InUse { .. }
            | VfsError::InvalidName(_)
            | VfsError::InvalidConfig(_)
            | VfsError::Config(_) => ResultCode::IoError,
        }
    }

    /// Raw SQLite code for this error
    pub fn code(&self) -> c_int {
        self.result_code().raw()
    }
}

/// Outcome vocabulary shared with SQLite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Ok,
    IoError,
    ShortRead,
    WriteError,
    CannotOpen,
    NotFound,
    DeleteError,
    NotSupported,
}

impl ResultCode {
    /// Map to the SQLite primary or extended result code
    pub fn raw(self) -> c_int {
        match self {
            ResultCode::Ok => ffi::SQLITE_OK,
            ResultCode::IoError => ffi::SQLITE_IOERR,
            ResultCode::ShortRead => ffi::SQLITE_IOERR_SHORT_READ,
            ResultCode::WriteError => ffi::SQLITE_IOERR_WRITE,
            ResultCode::CannotOpen => ffi::SQLITE_CANTOPEN,
            ResultCode::NotFound => ffi::SQLITE_NOTFOUND,
            ResultCode::DeleteError => ffi::SQLITE_IOERR_DELETE,
            // SQLite expects NOTFOUND for file controls it can't service
            ResultCode::NotSupported => ffi::SQLITE_NOTFOUND,
        }
    }
}

impl<T> From<&Result<T>> for ResultCode {
    fn from(result: &Result<T>) -> Self {
        match result {
            Ok(_) => ResultCode::Ok,
            Err(e) => e.result_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_family_codes() {
        let short = VfsError::ShortRead {
            expected: 10,
            actual: 4,
        };
        assert_eq!(short.code(), ffi::SQLITE_IOERR_SHORT_READ);

        let write = VfsError::WriteShortfall {
            expected: 10,
            actual: 0,
        };
        assert_eq!(write.code(), ffi::SQLITE_IOERR_WRITE);

        let failed = VfsError::WriteFailed(std::io::Error::from(std::io::ErrorKind::Other));
        assert_eq!(failed.code(), ffi::SQLITE_IOERR_WRITE);

        let delete = VfsError::DeleteFailed {
            path: "gone.db".into(),
            reason: "missing".into(),
        };
        assert_eq!(delete.code(), ffi::SQLITE_IOERR_DELETE);

        let io = VfsError::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert_eq!(io.code(), ffi::SQLITE_IOERR);
    }

    #[test]
    fn test_open_and_lookup_codes() {
        assert_eq!(VfsError::CannotOpen("x".into()).code(), ffi::SQLITE_CANTOPEN);
        assert_eq!(VfsError::MemoryDatabase.code(), ffi::SQLITE_IOERR);
        assert_eq!(VfsError::NotFound("x".into()).code(), ffi::SQLITE_NOTFOUND);
        assert_eq!(
            VfsError::NotSupported("file_control").code(),
            ffi::SQLITE_NOTFOUND
        );
    }

    #[test]
    fn test_result_code_from_result() {
        let ok: Result<u64> = Ok(12);
        assert_eq!(ResultCode::from(&ok), ResultCode::Ok);
        assert_eq!(ResultCode::from(&ok).raw(), ffi::SQLITE_OK);

        let err: Result<u64> = Err(VfsError::NotFound("t.db".into()));
        assert_eq!(ResultCode::from(&err), ResultCode::NotFound);
    }
}
