//! Flag vocabulary exchanged with SQLite

use libsqlite3_sys as ffi;
use std::os::raw::c_int;

/// Flags SQLite passes to xOpen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags(c_int);

impl OpenFlags {
    pub fn from_raw(flags: c_int) -> Self {
        OpenFlags(flags)
    }

    pub fn raw(self) -> c_int {
        self.0
    }

    pub fn is_readonly(self) -> bool {
        self.0 & ffi::SQLITE_OPEN_READONLY != 0
    }

    pub fn is_readwrite(self) -> bool {
        self.0 & ffi::SQLITE_OPEN_READWRITE != 0
    }

    pub fn is_create(self) -> bool {
        self.0 & ffi::SQLITE_OPEN_CREATE != 0
    }

    pub fn is_exclusive(self) -> bool {
        self.0 & ffi::SQLITE_OPEN_EXCLUSIVE != 0
    }

    pub fn is_delete_on_close(self) -> bool {
        self.0 & ffi::SQLITE_OPEN_DELETEONCLOSE != 0
    }

    /// Which kind of file SQLite is asking for
    pub fn kind(self) -> Option<FileKind> {
        let flags = self.0;
        match flags {
            f if f & ffi::SQLITE_OPEN_MAIN_DB != 0 => Some(FileKind::MainDb),
            f if f & ffi::SQLITE_OPEN_MAIN_JOURNAL != 0 => Some(FileKind::MainJournal),
            f if f & ffi::SQLITE_OPEN_TEMP_DB != 0 => Some(FileKind::TempDb),
            f if f & ffi::SQLITE_OPEN_TEMP_JOURNAL != 0 => Some(FileKind::TempJournal),
            f if f & ffi::SQLITE_OPEN_TRANSIENT_DB != 0 => Some(FileKind::TransientDb),
            f if f & ffi::SQLITE_OPEN_SUBJOURNAL != 0 => Some(FileKind::SubJournal),
            f if f & ffi::SQLITE_OPEN_SUPER_JOURNAL != 0 => Some(FileKind::SuperJournal),
            f if f & ffi::SQLITE_OPEN_WAL != 0 => Some(FileKind::Wal),
            _ => None,
        }
    }

    /// Equivalent `open(2)` flags.
    ///
    /// Diagnostic only: I/O reopens the file by path on every call.
    pub fn os_flags(self) -> c_int {
        let mut oflags = 0;
        if self.is_exclusive() {
            oflags |= libc::O_EXCL;
        }
        if self.is_create() {
            oflags |= libc::O_CREAT;
        }
        if self.is_readonly() {
            oflags |= libc::O_RDONLY;
        }
        if self.is_readwrite() {
            oflags |= libc::O_RDWR;
        }
        oflags
    }
}

/// The object type being opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    MainDb,
    MainJournal,
    TempDb,
    TempJournal,
    TransientDb,
    SubJournal,
    SuperJournal,
    Wal,
}

/// Question asked by xAccess
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Exists,
    Read,
    ReadWrite,
}

impl AccessMode {
    pub fn from_raw(flags: c_int) -> Option<Self> {
        match flags {
            ffi::SQLITE_ACCESS_EXISTS => Some(AccessMode::Exists),
            ffi::SQLITE_ACCESS_READ => Some(AccessMode::Read),
            ffi::SQLITE_ACCESS_READWRITE => Some(AccessMode::ReadWrite),
            _ => None,
        }
    }

    /// Mode argument for `access(2)`
    pub fn libc_mode(self) -> c_int {
        match self {
            AccessMode::Exists => libc::F_OK,
            AccessMode::Read => libc::R_OK,
            AccessMode::ReadWrite => libc::R_OK | libc::W_OK,
        }
    }
}

/// SQLite lock levels, in escalation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LockLevel {
    None,
    Shared,
    Reserved,
    Pending,
    Exclusive,
}

impl LockLevel {
    pub fn from_raw(level: c_int) -> Self {
        match level {
            ffi::SQLITE_LOCK_SHARED => LockLevel::Shared,
            ffi::SQLITE_LOCK_RESERVED => LockLevel::Reserved,
            ffi::SQLITE_LOCK_PENDING => LockLevel::Pending,
            ffi::SQLITE_LOCK_EXCLUSIVE => LockLevel::Exclusive,
            _ => LockLevel::None,
        }
    }
}

/// Capability bits returned from xDeviceCharacteristics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCharacteristics(c_int);

impl DeviceCharacteristics {
    pub const ATOMIC_64K: Self = DeviceCharacteristics(ffi::SQLITE_IOCAP_ATOMIC64K);
    pub const SAFE_APPEND: Self = DeviceCharacteristics(ffi::SQLITE_IOCAP_SAFE_APPEND);
    pub const POWERSAFE_OVERWRITE: Self =
        DeviceCharacteristics(ffi::SQLITE_IOCAP_POWERSAFE_OVERWRITE);
    pub const UNDELETABLE_WHEN_OPEN: Self =
        DeviceCharacteristics(ffi::SQLITE_IOCAP_UNDELETABLE_WHEN_OPEN);

    pub const fn empty() -> Self {
        DeviceCharacteristics(0)
    }

    pub const fn union(self, other: Self) -> Self {
        DeviceCharacteristics(self.0 | other.0)
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn raw(self) -> c_int {
        self.0
    }
}
