//! Lifecycle of one PostgreSQL instance directory.
//!
//! An [`Instance`] is bound to a single directory. Its state on disk decides
//! what it may do: a directory without a record is uninitialized, a directory
//! with a record is initialized, and an initialized directory whose socket
//! file exists is running. Every operation except [`Instance::initialize`]
//! reloads the record first, so a handle always acts on what is currently on
//! disk rather than on a cached view.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ortho_config::OrthoConfig as _;
use serde::Serialize;
use tracing::{debug, info};

use pgtestenv_config::{Config, Toolchain};

use crate::command::{CommandRunner, ControlCommand, SUCCESS, SystemCommandRunner, run_checked};
use crate::confirm::Confirmation;
use crate::connection::ConnectionParams;
use crate::error::InstanceError;
use crate::paths::InstancePaths;
use crate::record::{self, InstanceConfig, RECORD_SCHEMA, StoredRecord};

pub(crate) const INSTANCE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::instance");

/// Encoding used when none is requested.
pub const DEFAULT_ENCODING: &str = "UTF-8";
/// Locale used when none is requested.
pub const DEFAULT_LOCALE: &str = "en_US.UTF-8";
/// Bootstrap superuser used when none is requested.
pub const DEFAULT_SUPERUSER: &str = "postgres";

/// Settings for creating a new instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOptions {
    version: String,
    port: u16,
    encoding: String,
    locale: String,
    superuser: String,
}

impl InitOptions {
    /// Options for `version` listening on `port` with default encoding,
    /// locale, and superuser.
    #[must_use]
    pub fn new(version: impl Into<String>, port: u16) -> Self {
        Self {
            version: version.into(),
            port,
            encoding: String::from(DEFAULT_ENCODING),
            locale: String::from(DEFAULT_LOCALE),
            superuser: String::from(DEFAULT_SUPERUSER),
        }
    }

    /// Sets the database encoding.
    #[must_use]
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    /// Sets the locale.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Sets the bootstrap superuser.
    #[must_use]
    pub fn with_superuser(mut self, superuser: impl Into<String>) -> Self {
        self.superuser = superuser.into();
        self
    }

    /// Requested server version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Port recorded for the instance.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Requested encoding.
    #[must_use]
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Requested locale.
    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Requested superuser.
    #[must_use]
    pub fn superuser(&self) -> &str {
        &self.superuser
    }
}

/// Result of [`Instance::destroy_confirmed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyOutcome {
    /// The directory was deleted.
    Removed,
    /// Deletion was declined and nothing was touched.
    Declined,
}

/// Snapshot of an initialized instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceInfo {
    /// Absolute instance directory.
    pub path: PathBuf,
    /// Server version from `PG_VERSION`.
    pub version: String,
    /// Effective port, including any override passed to `start`.
    pub port: u16,
    /// Database encoding.
    pub encoding: String,
    /// Locale.
    pub locale: String,
    /// Bootstrap superuser.
    pub superuser: String,
    /// Whether the socket file is present.
    pub running: bool,
}

impl fmt::Display for InstanceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "path = {}", self.path.display())?;
        writeln!(f, "version = {}", self.version)?;
        writeln!(f, "port = {}", self.port)?;
        writeln!(f, "encoding = {}", self.encoding)?;
        writeln!(f, "locale = {}", self.locale)?;
        writeln!(f, "superuser = {}", self.superuser)?;
        write!(f, "running = {}", self.running)
    }
}

/// Handle on one instance directory.
///
/// Handles never clean up after themselves; wrap one in
/// [`crate::ScopedInstance`] to stop and delete the instance on drop.
#[derive(Debug)]
pub struct Instance<R = SystemCommandRunner> {
    paths: InstancePaths,
    config: InstanceConfig,
    settings: Config,
    runner: R,
    port_override: Option<u16>,
}

impl Instance<SystemCommandRunner> {
    /// Opens `path` with configuration from the default sources and real
    /// child processes.
    ///
    /// Process arguments are not consulted; only the configuration file and
    /// `PGTESTENV_*` environment variables override the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::Configuration`] when the configuration cannot
    /// be loaded, and otherwise the same errors as [`Instance::open`].
    pub fn open_default(path: impl AsRef<Path>) -> Result<Self, InstanceError> {
        let settings = Config::load_from_iter([OsString::from(env!("CARGO_PKG_NAME"))])?;
        Self::open(path, settings, SystemCommandRunner)
    }
}

impl<R> Instance<R>
where
    R: CommandRunner,
{
    /// Binds a handle to `path` and loads its record if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::CurrentDir`] when a relative path cannot be
    /// resolved and [`InstanceError::ConfigLoad`] when a record exists but is
    /// unusable.
    pub fn open(
        path: impl AsRef<Path>,
        settings: Config,
        runner: R,
    ) -> Result<Self, InstanceError> {
        let paths = InstancePaths::resolve(path.as_ref())?;
        let mut instance = Self {
            config: InstanceConfig::uninitialized(paths.data_dir().to_path_buf()),
            paths,
            settings,
            runner,
            port_override: None,
        };
        let initialized = instance.reload()?;
        debug!(
            target: INSTANCE_TARGET,
            path = %instance.path().display(),
            initialized,
            "instance opened"
        );
        Ok(instance)
    }

    /// Absolute instance directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.paths.data_dir()
    }

    /// File layout of the instance directory.
    #[must_use]
    pub const fn paths(&self) -> &InstancePaths {
        &self.paths
    }

    /// Configuration as of the most recent reload.
    #[must_use]
    pub const fn config(&self) -> &InstanceConfig {
        &self.config
    }

    /// Tool configuration used to locate binaries.
    #[must_use]
    pub const fn settings(&self) -> &Config {
        &self.settings
    }

    /// Runner used for control commands.
    #[must_use]
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    /// Port the server uses: the override from `start` if any, otherwise the
    /// recorded port.
    #[must_use]
    pub fn effective_port(&self) -> Option<u16> {
        self.port_override.or(self.config.port())
    }

    /// Reloads the record and reports whether the directory is initialized.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::ConfigLoad`] when a record exists but is
    /// unusable.
    pub fn is_initialized(&mut self) -> Result<bool, InstanceError> {
        self.reload()
    }

    /// Fails unless the directory is initialized.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::UninitializedInstance`] when no record exists
    /// and [`InstanceError::ConfigLoad`] when the record is unusable.
    pub fn ensure_initialized(&mut self) -> Result<(), InstanceError> {
        if self.reload()? {
            Ok(())
        } else {
            Err(InstanceError::UninitializedInstance {
                path: self.path().to_path_buf(),
            })
        }
    }

    /// Creates the instance with `initdb` and persists its record.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::AlreadyInitialized`] when the directory is
    /// initialized or exists at all, [`InstanceError::Inspect`] when the path
    /// cannot be checked, [`InstanceError::Toolchain`] for an
    /// unusable version, [`InstanceError::CommandFailed`] or
    /// [`InstanceError::Spawn`] when `initdb` fails, and
    /// [`InstanceError::RecordWrite`] when the record cannot be written.
    pub fn initialize(&mut self, options: &InitOptions) -> Result<(), InstanceError> {
        match fs::symlink_metadata(self.path()) {
            Ok(_) => {
                return Err(InstanceError::AlreadyInitialized {
                    path: self.path().to_path_buf(),
                });
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(InstanceError::Inspect {
                    path: self.path().to_path_buf(),
                    source,
                });
            }
        }
        if self.reload()? {
            return Err(InstanceError::AlreadyInitialized {
                path: self.path().to_path_buf(),
            });
        }
        let toolchain = self.settings.toolchain(options.version())?;
        let command = ControlCommand::initdb(
            &toolchain,
            &self.paths,
            options.encoding(),
            options.locale(),
            options.superuser(),
        );
        run_checked(&self.runner, &command, SUCCESS)?;

        let stored = StoredRecord {
            schema: RECORD_SCHEMA,
            path: self.path().to_path_buf(),
            version: options.version().to_owned(),
            port: options.port(),
            encoding: options.encoding().to_owned(),
            locale: options.locale().to_owned(),
            superuser: options.superuser().to_owned(),
        };
        record::store(&self.paths, &stored).map_err(|source| InstanceError::RecordWrite {
            path: self.paths.record_path().to_path_buf(),
            source,
        })?;
        self.ensure_initialized()?;
        info!(
            target: INSTANCE_TARGET,
            path = %self.path().display(),
            version = ?self.config.server_version(),
            port = options.port(),
            "instance initialized"
        );
        Ok(())
    }

    /// Starts the server, optionally on a port other than the recorded one.
    ///
    /// A supplied port is remembered by this handle for later calls but is
    /// never written to the record.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::UninitializedInstance`] before invoking
    /// anything when the directory is not initialized,
    /// [`InstanceError::MissingPort`] when no port is known, and
    /// [`InstanceError::CommandFailed`] when `pg_ctl` fails.
    pub fn start(&mut self, port: Option<u16>) -> Result<(), InstanceError> {
        self.ensure_initialized()?;
        if let Some(requested) = port {
            self.port_override = Some(requested);
        }
        let effective = self
            .effective_port()
            .ok_or_else(|| InstanceError::MissingPort {
                path: self.path().to_path_buf(),
            })?;
        let toolchain = self.toolchain()?;
        let command = ControlCommand::pg_ctl_start(&toolchain, &self.paths, effective);
        run_checked(&self.runner, &command, SUCCESS)?;
        info!(
            target: INSTANCE_TARGET,
            path = %self.path().display(),
            port = effective,
            "server started"
        );
        Ok(())
    }

    /// Stops the server in fast mode.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::UninitializedInstance`] when the directory is
    /// not initialized and [`InstanceError::CommandFailed`] when `pg_ctl`
    /// fails, including when no server was running.
    pub fn stop(&mut self) -> Result<(), InstanceError> {
        self.ensure_initialized()?;
        let toolchain = self.toolchain()?;
        let command = ControlCommand::pg_ctl_stop(&toolchain, &self.paths);
        run_checked(&self.runner, &command, SUCCESS)?;
        info!(
            target: INSTANCE_TARGET,
            path = %self.path().display(),
            "server stopped"
        );
        Ok(())
    }

    /// Reports whether the server socket file exists.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::UninitializedInstance`] when the directory is
    /// not initialized.
    pub fn is_running(&mut self) -> Result<bool, InstanceError> {
        self.ensure_initialized()?;
        Ok(self
            .effective_port()
            .is_some_and(|port| self.paths.socket_path(port).exists()))
    }

    /// Describes the instance and its liveness.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::UninitializedInstance`] when the directory is
    /// not initialized.
    pub fn info(&mut self) -> Result<InstanceInfo, InstanceError> {
        let running = self.is_running()?;
        let (Some(version), Some(port), Some(encoding), Some(locale), Some(superuser)) = (
            self.config.server_version(),
            self.effective_port(),
            self.config.encoding(),
            self.config.locale(),
            self.config.superuser(),
        ) else {
            return Err(self.uninitialized());
        };
        Ok(InstanceInfo {
            path: self.path().to_path_buf(),
            version: version.to_owned(),
            port,
            encoding: encoding.to_owned(),
            locale: locale.to_owned(),
            superuser: superuser.to_owned(),
            running,
        })
    }

    /// Parameters for connecting to the instance as its superuser.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::UninitializedInstance`] when the directory is
    /// not initialized.
    pub fn connection_params(&mut self) -> Result<ConnectionParams, InstanceError> {
        self.ensure_initialized()?;
        let (Some(port), Some(superuser)) = (self.effective_port(), self.config.superuser())
        else {
            return Err(self.uninitialized());
        };
        Ok(ConnectionParams::new(
            self.path().to_path_buf(),
            port,
            superuser.to_owned(),
        ))
    }

    /// Deletes the instance directory without asking.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::UninitializedInstance`] when the directory is
    /// not initialized, [`InstanceError::InstanceRunning`] when the server is
    /// running, and [`InstanceError::RemoveDirectory`] when deletion fails.
    pub fn destroy(&mut self) -> Result<(), InstanceError> {
        self.refuse_if_running()?;
        self.remove_directory()
    }

    /// Asks `confirmation` before deleting the instance directory.
    ///
    /// The running check happens before the question is asked.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Instance::destroy`], plus
    /// [`InstanceError::Confirmation`] when the answer cannot be read.
    pub fn destroy_confirmed(
        &mut self,
        confirmation: &mut dyn Confirmation,
    ) -> Result<DestroyOutcome, InstanceError> {
        self.refuse_if_running()?;
        let approved = confirmation
            .confirm(self.path())
            .map_err(|source| InstanceError::Confirmation { source })?;
        if !approved {
            info!(
                target: INSTANCE_TARGET,
                path = %self.path().display(),
                "deletion declined"
            );
            return Ok(DestroyOutcome::Declined);
        }
        self.remove_directory()?;
        Ok(DestroyOutcome::Removed)
    }

    /// Releases the runner.
    #[must_use]
    pub fn into_runner(self) -> R {
        self.runner
    }

    fn reload(&mut self) -> Result<bool, InstanceError> {
        match record::load(&self.paths) {
            Ok(Some(loaded)) => {
                self.config.apply(loaded.record, loaded.server_version);
                Ok(true)
            }
            Ok(None) => {
                self.config.reset();
                Ok(false)
            }
            Err(source) => Err(InstanceError::ConfigLoad {
                path: self.path().to_path_buf(),
                source,
            }),
        }
    }

    fn toolchain(&self) -> Result<Toolchain, InstanceError> {
        let version = self
            .config
            .server_version()
            .ok_or_else(|| self.uninitialized())?;
        Ok(self.settings.toolchain(version)?)
    }

    fn refuse_if_running(&mut self) -> Result<(), InstanceError> {
        if self.is_running()? {
            return Err(InstanceError::InstanceRunning {
                path: self.path().to_path_buf(),
            });
        }
        Ok(())
    }

    fn remove_directory(&mut self) -> Result<(), InstanceError> {
        fs::remove_dir_all(self.path()).map_err(|source| InstanceError::RemoveDirectory {
            path: self.path().to_path_buf(),
            source,
        })?;
        self.config.reset();
        self.port_override = None;
        info!(
            target: INSTANCE_TARGET,
            path = %self.path().display(),
            "instance directory removed"
        );
        Ok(())
    }

    fn uninitialized(&self) -> InstanceError {
        InstanceError::UninitializedInstance {
            path: self.path().to_path_buf(),
        }
    }
}
