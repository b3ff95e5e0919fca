//! Derives and exposes the fixed file layout of an instance directory.

use std::env;
use std::path::{Component, Path, PathBuf};

use crate::error::InstanceError;

/// Name of the persisted instance record.
pub const RECORD_FILE: &str = "pgtestenv.json";
/// Name of the version marker written by `initdb`.
pub const VERSION_FILE: &str = "PG_VERSION";
/// Name of the server log written by `pg_ctl start`.
pub const LOG_FILE: &str = "postgresql.log";

/// Canonical paths inside one instance directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancePaths {
    data_dir: PathBuf,
    record_path: PathBuf,
    version_path: PathBuf,
    log_path: PathBuf,
}

impl InstancePaths {
    /// Derives the layout for `path`, making it absolute first.
    pub(crate) fn resolve(path: &Path) -> Result<Self, InstanceError> {
        let data_dir = absolute(path)?;
        Ok(Self::for_absolute(data_dir))
    }

    fn for_absolute(data_dir: PathBuf) -> Self {
        Self {
            record_path: data_dir.join(RECORD_FILE),
            version_path: data_dir.join(VERSION_FILE),
            log_path: data_dir.join(LOG_FILE),
            data_dir,
        }
    }

    /// Absolute instance directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        self.data_dir.as_path()
    }

    /// Path to the persisted instance record.
    #[must_use]
    pub fn record_path(&self) -> &Path {
        self.record_path.as_path()
    }

    /// Path to the `PG_VERSION` marker.
    #[must_use]
    pub fn version_path(&self) -> &Path {
        self.version_path.as_path()
    }

    /// Path to the server log.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        self.log_path.as_path()
    }

    /// Path to the Unix socket the server creates while accepting
    /// connections on `port`.
    #[must_use]
    pub fn socket_path(&self, port: u16) -> PathBuf {
        self.data_dir.join(socket_file_name(port))
    }
}

/// File name of the server socket for `port`.
#[must_use]
pub fn socket_file_name(port: u16) -> String {
    format!(".s.PGSQL.{port}")
}

/// Joins relative paths onto the working directory and folds `.` and `..`
/// lexically. Symlinks are left alone.
fn absolute(path: &Path) -> Result<PathBuf, InstanceError> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map_err(|source| InstanceError::CurrentDir { source })?
            .join(path)
    };
    let mut normalised = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalised.pop();
            }
            other => normalised.push(other.as_os_str()),
        }
    }
    Ok(normalised)
}
