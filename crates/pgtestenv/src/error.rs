//! Defines the unified error surface for instance lifecycle operations.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use pgtestenv_config::ToolchainError;

use crate::record::RecordError;

/// Errors surfaced by [`crate::Instance`] operations.
#[derive(Debug, Error)]
pub enum InstanceError {
    /// The operation needs an initialized directory and none was found.
    #[error("directory '{path}' is not initialized")]
    UninitializedInstance {
        /// Instance directory.
        path: PathBuf,
    },
    /// `initialize` was called on an initialized or pre-existing directory.
    #[error("cannot initialize, directory '{path}' already exists")]
    AlreadyInitialized {
        /// Instance directory.
        path: PathBuf,
    },
    /// A control binary exited with an unexpected status.
    #[error("command '{command}' failed with status {code}: {output}", code = display_status(.status.as_ref()))]
    CommandFailed {
        /// Rendered command line.
        command: String,
        /// Exit code, or `None` when the process was killed by a signal.
        status: Option<i32>,
        /// Captured stdout followed by stderr.
        output: String,
    },
    /// A control binary could not be launched at all.
    #[error("failed to launch '{command}': {source}")]
    Spawn {
        /// Rendered command line.
        command: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// `destroy` was refused because the server is accepting connections.
    #[error("the server in '{path}' is still running, not deleting anything")]
    InstanceRunning {
        /// Instance directory.
        path: PathBuf,
    },
    /// The persisted record exists but could not be used.
    #[error("failed to load instance record in '{path}': {source}")]
    ConfigLoad {
        /// Instance directory.
        path: PathBuf,
        /// Underlying record error.
        #[source]
        source: RecordError,
    },
    /// Writing the persisted record failed after the directory was created.
    #[error("failed to write instance record '{path}': {source}")]
    RecordWrite {
        /// Record path.
        path: PathBuf,
        /// Underlying record error.
        #[source]
        source: RecordError,
    },
    /// Removing the instance directory failed part way.
    #[error("failed to remove directory '{path}': {source}")]
    RemoveDirectory {
        /// Instance directory.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The instance path could not be inspected.
    #[error("failed to inspect '{path}': {source}")]
    Inspect {
        /// Instance directory.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A relative instance path could not be made absolute.
    #[error("failed to resolve the current directory: {source}")]
    CurrentDir {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// `start` was called without any port known for the instance.
    #[error("no port configured for instance '{path}'")]
    MissingPort {
        /// Instance directory.
        path: PathBuf,
    },
    /// The server version could not be mapped onto binaries.
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
    /// Tool configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Interactive confirmation could not be obtained.
    #[error("failed to read confirmation: {source}")]
    Confirmation {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl From<Arc<OrthoError>> for InstanceError {
    fn from(source: Arc<OrthoError>) -> Self {
        Self::Configuration { source }
    }
}

fn display_status(status: Option<&i32>) -> String {
    status.map_or_else(|| String::from("<signal>"), ToString::to_string)
}
