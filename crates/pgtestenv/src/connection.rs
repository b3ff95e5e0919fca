//! libpq-style connection parameters for a running instance.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Parameters a client needs to reach an instance over its Unix socket.
///
/// `host` is the instance directory because the server places its socket
/// there and listens on no TCP address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionParams {
    host: PathBuf,
    port: u16,
    user: String,
    dbname: Option<String>,
}

impl ConnectionParams {
    pub(crate) const fn new(host: PathBuf, port: u16, user: String) -> Self {
        Self {
            host,
            port,
            user,
            dbname: None,
        }
    }

    /// Replaces the connecting user.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Selects a database; the server default applies otherwise.
    #[must_use]
    pub fn with_dbname(mut self, dbname: impl Into<String>) -> Self {
        self.dbname = Some(dbname.into());
        self
    }

    /// Replaces the port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Socket directory.
    #[must_use]
    pub fn host(&self) -> &Path {
        self.host.as_path()
    }

    /// Server port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Connecting user.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Database name, if one was chosen.
    #[must_use]
    pub fn dbname(&self) -> Option<&str> {
        self.dbname.as_deref()
    }

    /// Renders a libpq keyword/value connection string.
    #[must_use]
    pub fn to_conninfo(&self) -> String {
        let mut conninfo = String::new();
        push_pair(&mut conninfo, "host", &self.host.to_string_lossy());
        push_pair(&mut conninfo, "port", &self.port.to_string());
        push_pair(&mut conninfo, "user", &self.user);
        if let Some(dbname) = &self.dbname {
            push_pair(&mut conninfo, "dbname", dbname);
        }
        conninfo
    }
}

fn push_pair(conninfo: &mut String, key: &str, value: &str) {
    if !conninfo.is_empty() {
        conninfo.push(' ');
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    conninfo.push_str(key);
    conninfo.push_str("='");
    conninfo.push_str(&escaped);
    conninfo.push('\'');
}
