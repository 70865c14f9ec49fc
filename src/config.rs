//! VFS configuration
//!
//! Defaults match the stock `slsql` registration. A TOML file may override
//! any subset of fields:
//!
//! ```toml
//! name = "slsql"
//! max_pathname = 1024
//! sector_size = 65536
//! make_default = false
//! ```

use crate::error::{Result, VfsError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name the VFS registers under unless configured otherwise
pub const DEFAULT_VFS_NAME: &str = "slsql";

/// Longest path SQLite may hand to the VFS
pub const DEFAULT_MAX_PATHNAME: usize = 1024;

/// Sector size reported to SQLite
pub const DEFAULT_SECTOR_SIZE: u32 = 65536;

const MIN_SECTOR_SIZE: u32 = 512;
const MAX_SECTOR_SIZE: u32 = 65536;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// Name passed to `sqlite3_vfs_register` and used in `?vfs=` URIs
    pub name: String,

    /// `mxPathname` advertised to SQLite
    pub max_pathname: usize,

    /// Value returned from xSectorSize
    pub sector_size: u32,

    /// Register as SQLite's default VFS
    pub make_default: bool,
}

impl Default for VfsConfig {
    fn default() -> Self {
        VfsConfig {
            name: DEFAULT_VFS_NAME.to_string(),
            max_pathname: DEFAULT_MAX_PATHNAME,
            sector_size: DEFAULT_SECTOR_SIZE,
            make_default: true,
        }
    }
}

impl VfsConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: VfsConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(VfsError::InvalidConfig("VFS name must not be empty".into()));
        }
        if self.max_pathname == 0 || self.max_pathname > i32::MAX as usize {
            return Err(VfsError::InvalidConfig(format!(
                "max_pathname out of range: {}",
                self.max_pathname
            )));
        }
        if !self.sector_size.is_power_of_two()
            || !(MIN_SECTOR_SIZE..=MAX_SECTOR_SIZE).contains(&self.sector_size)
        {
            return Err(VfsError::InvalidConfig(format!(
                "sector_size must be a power of two between {} and {}, got {}",
                MIN_SECTOR_SIZE, MAX_SECTOR_SIZE, self.sector_size
            )));
        }
        Ok(())
    }
}
