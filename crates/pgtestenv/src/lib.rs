//! Lifecycle management for throwaway PostgreSQL test instances.
//!
//! An instance is a directory on the local filesystem. [`Instance`] creates
//! it with `initdb`, starts and stops its server with `pg_ctl`, reports
//! whether the server is accepting connections, and deletes the directory
//! again. A small JSON record written at initialization makes the directory
//! self-describing, so a later process can reopen it with nothing but its
//! path.
//!
//! The server listens only on a Unix socket inside the instance directory.
//! Liveness is the existence of that socket file; nothing connects to the
//! server to find out.
//!
//! ## Cleanup
//!
//! Plain handles leave the instance on disk when dropped. Wrap a handle in
//! [`ScopedInstance`] (or run code through [`with_cleanup`]) to stop the
//! server and delete the directory on every exit path. Teardown failures are
//! reported through a [`CleanupReporter`] rather than raised.
//!
//! ## Binaries
//!
//! The binaries for server version `V` are looked up in
//! `<bin_root>/V/bin` unless an explicit `bin_dir` is configured; see
//! [`pgtestenv_config::Config`].

mod cleanup;
mod command;
mod confirm;
mod connection;
mod error;
mod files;
mod instance;
mod paths;
mod record;
mod scoped;
pub mod telemetry;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use cleanup::{CleanupReport, CleanupReporter, TracingCleanupReporter};
pub use command::{
    CommandOutput, CommandRunner, ControlCommand, SUCCESS, SystemCommandRunner, run_checked,
};
pub use confirm::{Confirmation, FixedAnswer, StdinConfirmation};
pub use connection::ConnectionParams;
pub use error::InstanceError;
pub use instance::{
    DEFAULT_ENCODING, DEFAULT_LOCALE, DEFAULT_SUPERUSER, DestroyOutcome, InitOptions, Instance,
    InstanceInfo,
};
pub use paths::{InstancePaths, LOG_FILE, RECORD_FILE, VERSION_FILE, socket_file_name};
pub use record::{InstanceConfig, RECORD_SCHEMA, RecordError};
pub use scoped::{ScopedInstance, with_cleanup};
pub use telemetry::{TelemetryError, TelemetryHandle};

pub use pgtestenv_config::{Config, Toolchain, ToolchainError};

#[cfg(test)]
mod tests;
