//! Persisted identity of an instance directory.
//!
//! The record is a small JSON document tagged with a schema number. Loading
//! checks the schema first and then parses the full field set strictly, so a
//! record written by a different layout fails loudly instead of yielding a
//! half-populated configuration. The server version always comes from the
//! `PG_VERSION` marker that `initdb` writes, never from the record.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::files::atomic_write;
use crate::paths::InstancePaths;

const RECORD_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::record");

/// Record layout version written by this crate.
pub const RECORD_SCHEMA: u32 = 1;

/// Identity and settings of one instance directory.
///
/// Only `path` is known for an uninitialized directory; the remaining fields
/// are populated from the persisted record or by `initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceConfig {
    path: PathBuf,
    server_version: Option<String>,
    port: Option<u16>,
    encoding: Option<String>,
    locale: Option<String>,
    superuser: Option<String>,
}

impl InstanceConfig {
    pub(crate) const fn uninitialized(path: PathBuf) -> Self {
        Self {
            path,
            server_version: None,
            port: None,
            encoding: None,
            locale: None,
            superuser: None,
        }
    }

    /// Absolute instance directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Server version read from the `PG_VERSION` marker.
    #[must_use]
    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    /// Port recorded at initialization.
    #[must_use]
    pub const fn port(&self) -> Option<u16> {
        self.port
    }

    /// Database encoding chosen at initialization.
    #[must_use]
    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    /// Locale chosen at initialization.
    #[must_use]
    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    /// Name of the bootstrap superuser.
    #[must_use]
    pub fn superuser(&self) -> Option<&str> {
        self.superuser.as_deref()
    }

    /// Whether the identity fields have been populated.
    #[must_use]
    pub const fn is_populated(&self) -> bool {
        self.server_version.is_some()
    }

    pub(crate) fn apply(&mut self, record: StoredRecord, server_version: String) {
        self.server_version = Some(server_version);
        self.port = Some(record.port);
        self.encoding = Some(record.encoding);
        self.locale = Some(record.locale);
        self.superuser = Some(record.superuser);
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::uninitialized(std::mem::take(&mut self.path));
    }
}

/// On-disk form of the instance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct StoredRecord {
    pub(crate) schema: u32,
    pub(crate) path: PathBuf,
    pub(crate) version: String,
    pub(crate) port: u16,
    pub(crate) encoding: String,
    pub(crate) locale: String,
    pub(crate) superuser: String,
}

#[derive(Debug, Deserialize)]
struct SchemaProbe {
    schema: u32,
}

/// Errors raised while reading or writing the instance record.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The record exists but could not be read.
    #[error("failed to read record: {source}")]
    Read {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The record is not valid JSON or does not match the schema.
    #[error("malformed record: {source}")]
    Parse {
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// The record was written with an unknown schema.
    #[error("unsupported record schema {found} (expected {expected})")]
    UnsupportedSchema {
        /// Schema number found on disk.
        found: u32,
        /// Schema number this crate understands.
        expected: u32,
    },
    /// The record exists but `PG_VERSION` does not.
    #[error("version marker '{path}' is missing")]
    MissingVersionMarker {
        /// Expected marker path.
        path: PathBuf,
    },
    /// `PG_VERSION` exists but could not be read.
    #[error("failed to read version marker '{path}': {source}")]
    ReadVersionMarker {
        /// Marker path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// `PG_VERSION` is empty.
    #[error("version marker '{path}' is empty")]
    EmptyVersionMarker {
        /// Marker path.
        path: PathBuf,
    },
    /// Serialising the record failed.
    #[error("failed to serialise record: {source}")]
    Serialise {
        /// Underlying serialisation error.
        #[source]
        source: serde_json::Error,
    },
    /// Persisting the record failed.
    #[error("failed to persist record: {source}")]
    Write {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Record and marker version as found on disk.
#[derive(Debug)]
pub(crate) struct LoadedRecord {
    pub(crate) record: StoredRecord,
    pub(crate) server_version: String,
}

/// Loads the record for `paths`. A missing record yields `Ok(None)`.
pub(crate) fn load(paths: &InstancePaths) -> Result<Option<LoadedRecord>, RecordError> {
    let contents = match fs::read(paths.record_path()) {
        Ok(contents) => contents,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            debug!(
                target: RECORD_TARGET,
                file = %paths.record_path().display(),
                "no instance record present"
            );
            return Ok(None);
        }
        Err(source) => return Err(RecordError::Read { source }),
    };
    let record = parse(&contents)?;
    if record.path != paths.data_dir() {
        debug!(
            target: RECORD_TARGET,
            recorded = %record.path.display(),
            actual = %paths.data_dir().display(),
            "instance directory was moved since initialization"
        );
    }
    let server_version = read_version_marker(paths.version_path())?;
    if record.version != server_version {
        debug!(
            target: RECORD_TARGET,
            schema = record.schema,
            recorded = %record.version,
            marker = %server_version,
            "version marker differs from the requested version"
        );
    }
    Ok(Some(LoadedRecord {
        record,
        server_version,
    }))
}

/// Writes the record for a freshly initialized directory.
pub(crate) fn store(paths: &InstancePaths, record: &StoredRecord) -> Result<(), RecordError> {
    let mut payload =
        serde_json::to_vec_pretty(record).map_err(|source| RecordError::Serialise { source })?;
    payload.push(b'\n');
    atomic_write(paths.record_path(), &payload).map_err(|source| RecordError::Write { source })?;
    debug!(
        target: RECORD_TARGET,
        file = %paths.record_path().display(),
        "instance record written"
    );
    Ok(())
}

fn parse(contents: &[u8]) -> Result<StoredRecord, RecordError> {
    let probe: SchemaProbe =
        serde_json::from_slice(contents).map_err(|source| RecordError::Parse { source })?;
    if probe.schema != RECORD_SCHEMA {
        return Err(RecordError::UnsupportedSchema {
            found: probe.schema,
            expected: RECORD_SCHEMA,
        });
    }
    serde_json::from_slice(contents).map_err(|source| RecordError::Parse { source })
}

fn read_version_marker(path: &Path) -> Result<String, RecordError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return Err(RecordError::MissingVersionMarker {
                path: path.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(RecordError::ReadVersionMarker {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let version = raw.trim();
    if version.is_empty() {
        return Err(RecordError::EmptyVersionMarker {
            path: path.to_path_buf(),
        });
    }
    Ok(version.to_owned())
}
