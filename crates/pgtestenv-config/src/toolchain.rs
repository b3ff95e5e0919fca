//! Resolves the PostgreSQL binaries used to create and control an instance.
//!
//! Debian-style installs keep one tree per major version under
//! `/usr/lib/postgresql/<version>/bin`. The version string therefore becomes a
//! path component, so it is validated before any path is derived.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::Config;

const INITDB: &str = "initdb";
const PG_CTL: &str = "pg_ctl";

/// Canonical paths of the binaries serving one server version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    version: String,
    bin_dir: PathBuf,
    initdb: PathBuf,
    pg_ctl: PathBuf,
}

impl Toolchain {
    /// Derives binary paths for `version` from the shared configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ToolchainError::InvalidVersion`] when `version` is empty,
    /// contains a path separator, or is a relative path component.
    pub fn resolve(config: &Config, version: &str) -> Result<Self, ToolchainError> {
        validate_version(version)?;
        let bin_dir = match config.bin_dir() {
            Some(dir) => dir.as_std_path().to_path_buf(),
            None => config.bin_root().as_std_path().join(version).join("bin"),
        };
        Ok(Self {
            version: version.to_owned(),
            initdb: bin_dir.join(INITDB),
            pg_ctl: bin_dir.join(PG_CTL),
            bin_dir,
        })
    }

    /// Server version the toolchain was resolved for.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Directory holding the binaries.
    #[must_use]
    pub fn bin_dir(&self) -> &Path {
        self.bin_dir.as_path()
    }

    /// Path to `initdb`, which creates a new data directory.
    #[must_use]
    pub fn initdb(&self) -> &Path {
        self.initdb.as_path()
    }

    /// Path to `pg_ctl`, which starts and stops the server.
    #[must_use]
    pub fn pg_ctl(&self) -> &Path {
        self.pg_ctl.as_path()
    }
}

fn validate_version(version: &str) -> Result<(), ToolchainError> {
    let trimmed = version.trim();
    let invalid = trimmed.is_empty()
        || trimmed != version
        || version == "."
        || version == ".."
        || version.contains(['/', '\\', '\0']);
    if invalid {
        return Err(ToolchainError::InvalidVersion {
            version: version.to_owned(),
        });
    }
    Ok(())
}

/// Errors raised while resolving server binaries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolchainError {
    /// The version cannot be used as a directory name.
    #[error("invalid server version '{version}'")]
    InvalidVersion {
        /// Rejected version string.
        version: String,
    },
}
