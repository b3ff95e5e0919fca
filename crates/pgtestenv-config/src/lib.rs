//! Shared configuration for the pgtestenv instance manager.
//!
//! Settings are layered with `ortho_config`: built-in defaults, then a TOML
//! file (`--config-path` or `PGTESTENV_CONFIG_PATH`), then `PGTESTENV_*`
//! environment variables, then command-line style arguments. The resulting
//! [`Config`] tells the manager where the PostgreSQL binaries live and how to
//! format its logs. [`Toolchain`] turns a configuration plus a server version
//! into concrete `initdb` and `pg_ctl` paths.

mod defaults;
mod logging;
mod toolchain;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_BIN_ROOT, DEFAULT_LOG_FILTER, default_bin_root, default_log_filter,
    default_log_filter_string, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use toolchain::{Toolchain, ToolchainError};

/// Tool-level configuration shared by every instance handle.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "PGTESTENV")]
pub struct Config {
    /// Root holding one `<version>/bin` directory per installed server.
    #[ortho_config(default = default_bin_root())]
    pub bin_root: Utf8PathBuf,
    /// Explicit binary directory; bypasses the versioned layout under
    /// `bin_root` when set.
    pub bin_dir: Option<Utf8PathBuf>,
    /// `tracing` filter expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for log records.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bin_root: default_bin_root(),
            bin_dir: None,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Root directory of the versioned PostgreSQL installations.
    #[must_use]
    pub fn bin_root(&self) -> &Utf8Path {
        self.bin_root.as_path()
    }

    /// Explicit binary directory override, if configured.
    #[must_use]
    pub fn bin_dir(&self) -> Option<&Utf8Path> {
        self.bin_dir.as_deref()
    }

    /// Log filter expression handed to the telemetry layer.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Resolves the binaries for `version` using this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ToolchainError::InvalidVersion`] when the version cannot be
    /// used as a directory name.
    pub fn toolchain(&self, version: &str) -> Result<Toolchain, ToolchainError> {
        Toolchain::resolve(self, version)
    }
}
