use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Debian-style root holding `<version>/bin/{initdb,pg_ctl}`.
pub const DEFAULT_BIN_ROOT: &str = "/usr/lib/postgresql";

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default installation root for the PostgreSQL binaries.
#[must_use]
pub fn default_bin_root() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_BIN_ROOT)
}

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}
