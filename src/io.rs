//! Positioned I/O on plain files addressed by path
//!
//! Every call reopens the file, seeks, transfers, and closes it again. No
//! descriptor outlives a single call.

use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Outcome of a positioned transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    /// Bytes the caller asked for
    pub requested: usize,
    /// Bytes actually moved
    pub transferred: usize,
}

impl Transfer {
    /// True when every requested byte was moved
    pub fn is_complete(&self) -> bool {
        self.transferred >= self.requested
    }
}

/// A file on disk, addressed by path rather than by an open descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackingFile {
    path: PathBuf,
}

impl BackingFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        BackingFile { path: path.into() }
    }

    /// Get file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Create the file if it does not exist yet. Existing content is left alone.
    pub fn touch(&self) -> io::Result<()> {
        if self.exists() {
            return Ok(());
        }
        OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        Ok(())
    }

    /// Current length in bytes
    pub fn len(&self) -> io::Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Read up to `buf.len()` bytes starting at `offset`.
    ///
    /// Stops at end of file; bytes past it are left untouched in `buf`.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<Transfer> {
        let mut file = OpenOptions::new().read(true).open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut read = 0;
        while read < buf.len() {
            match file.read(&mut buf[read..]) {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(Transfer {
            requested: buf.len(),
            transferred: read,
        })
    }

    /// Write `buf` starting at `offset`, creating the file if it is missing.
    ///
    /// Writing past the end leaves a zero-filled gap.
    pub fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<Transfer> {
        let mut file = match OpenOptions::new().read(true).write(true).open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(&self.path)?,
            Err(e) => return Err(e),
        };
        file.seek(SeekFrom::Start(offset))?;

        let mut written = 0;
        while written < buf.len() {
            match file.write(&buf[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if written > 0 => {
                    warn!(
                        "Write to {:?} stopped after {} of {} bytes: {}",
                        self.path,
                        written,
                        buf.len(),
                        e
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        file.flush()?;

        Ok(Transfer {
            requested: buf.len(),
            transferred: written,
        })
    }

    /// Remove the file from disk
    pub fn remove(&self) -> io::Result<()> {
        fs::remove_file(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_touch_creates_empty_file() {
        let dir = TempDir::new().unwrap();
        let file = BackingFile::new(dir.path().join("touched.db"));

        assert!(!file.exists());
        file.touch().unwrap();
        assert!(file.exists());
        assert_eq!(file.len().unwrap(), 0);
        assert!(file.is_empty().unwrap());
    }

    #[test]
    fn test_touch_keeps_existing_content() {
        let dir = TempDir::new().unwrap();
        let file = BackingFile::new(dir.path().join("keep.db"));

        file.write_at(b"payload", 0).unwrap();
        file.touch().unwrap();
        assert_eq!(file.len().unwrap(), 7);
        assert!(!file.is_empty().unwrap());
    }

    #[test]
    fn test_write_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let file = BackingFile::new(dir.path().join("fresh.db"));

        let transfer = file.write_at(b"Hello", 0).unwrap();
        assert!(transfer.is_complete());
        assert_eq!(transfer.transferred, 5);
        assert_eq!(std::fs::read(file.path()).unwrap(), b"Hello");
    }

    #[test]
    fn test_write_past_end_leaves_zero_gap() {
        let dir = TempDir::new().unwrap();
        let file = BackingFile::new(dir.path().join("gap.db"));

        file.write_at(b"AB", 0).unwrap();
        file.write_at(b"Z", 5).unwrap();
        assert_eq!(std::fs::read(file.path()).unwrap(), b"AB\0\0\0Z");
    }

    #[test]
    fn test_read_stops_at_end_of_file() {
        let dir = TempDir::new().unwrap();
        let file = BackingFile::new(dir.path().join("short.db"));
        file.write_at(b"abc", 0).unwrap();

        let mut buf = [0xAAu8; 8];
        let transfer = file.read_at(&mut buf, 1).unwrap();
        assert_eq!(transfer.requested, 8);
        assert_eq!(transfer.transferred, 2);
        assert!(!transfer.is_complete());
        assert_eq!(&buf[..2], b"bc");
        assert_eq!(&buf[2..], &[0xAA; 6]);
    }

    #[test]
    fn test_read_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let file = BackingFile::new(dir.path().join("missing.db"));

        let mut buf = [0u8; 4];
        let err = file.read_at(&mut buf, 0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let file = BackingFile::new(dir.path().join("remove.db"));
        file.touch().unwrap();

        file.remove().unwrap();
        assert!(!file.exists());
        assert!(file.remove().is_err());
    }
}
