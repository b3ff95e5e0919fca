//! Execution shim for the PostgreSQL control binaries.
//!
//! Commands are spawned directly with discrete arguments. The only value
//! that passes through a shell is the `-o` option string of `pg_ctl start`,
//! which `pg_ctl` hands to `/bin/sh`; every value placed there is
//! single-quoted.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use pgtestenv_config::Toolchain;

use crate::error::InstanceError;
use crate::paths::InstancePaths;

pub(crate) const COMMAND_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::command");

/// Exit status every control binary reports on success.
pub const SUCCESS: i32 = 0;

/// A program and its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ControlCommand {
    /// Starts a command for `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Program to execute.
    #[must_use]
    pub fn program(&self) -> &Path {
        self.program.as_path()
    }

    /// Arguments passed to the program, excluding the program itself.
    #[must_use]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub(crate) fn initdb(
        toolchain: &Toolchain,
        paths: &InstancePaths,
        encoding: &str,
        locale: &str,
        superuser: &str,
    ) -> Self {
        Self::new(toolchain.initdb())
            .arg("-D")
            .arg(paths.data_dir())
            .arg(format!("--encoding={encoding}"))
            .arg(format!("--locale={locale}"))
            .arg("-U")
            .arg(superuser)
    }

    pub(crate) fn pg_ctl_start(toolchain: &Toolchain, paths: &InstancePaths, port: u16) -> Self {
        Self::new(toolchain.pg_ctl())
            .arg("-w")
            .arg("-D")
            .arg(paths.data_dir())
            .arg("-l")
            .arg(paths.log_path())
            .arg("start")
            .arg("-o")
            .arg(server_options(paths.data_dir(), port))
    }

    pub(crate) fn pg_ctl_stop(toolchain: &Toolchain, paths: &InstancePaths) -> Self {
        Self::new(toolchain.pg_ctl())
            .arg("-D")
            .arg(paths.data_dir())
            .arg("stop")
            .arg("-m")
            .arg("fast")
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", display_word(self.program.as_os_str()))?;
        for arg in &self.args {
            write!(f, " {}", display_word(arg))?;
        }
        Ok(())
    }
}

/// Exit status and combined output of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, or `None` when the process was terminated by a signal.
    pub status: Option<i32>,
    /// Captured stdout followed by captured stderr.
    pub output: String,
}

impl CommandOutput {
    /// Builds an output record with the given exit code.
    #[must_use]
    pub fn exited(code: i32, output: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            output: output.into(),
        }
    }
}

/// Executes control commands on behalf of an instance.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    /// Runs `command` to completion.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the program cannot be launched or waited on.
    fn run(&self, command: &ControlCommand) -> io::Result<CommandOutput>;
}

impl<T> CommandRunner for &T
where
    T: CommandRunner + ?Sized,
{
    fn run(&self, command: &ControlCommand) -> io::Result<CommandOutput> {
        (**self).run(command)
    }
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, command: &ControlCommand) -> io::Result<CommandOutput> {
        let result = Command::new(command.program())
            .args(command.args())
            .stdin(Stdio::null())
            .output()?;
        let mut output = String::from_utf8_lossy(&result.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&result.stderr));
        Ok(CommandOutput {
            status: result.status.code(),
            output,
        })
    }
}

/// Runs `command` and fails unless it exits with `expected`.
///
/// # Errors
///
/// Returns [`InstanceError::Spawn`] when the program cannot be launched and
/// [`InstanceError::CommandFailed`] when it exits with any other status.
pub fn run_checked<R>(
    runner: &R,
    command: &ControlCommand,
    expected: i32,
) -> Result<CommandOutput, InstanceError>
where
    R: CommandRunner + ?Sized,
{
    debug!(target: COMMAND_TARGET, command = %command, "running control command");
    let result = runner.run(command).map_err(|source| InstanceError::Spawn {
        command: command.to_string(),
        source,
    })?;
    if result.status != Some(expected) {
        debug!(
            target: COMMAND_TARGET,
            command = %command,
            status = ?result.status,
            "control command failed"
        );
        return Err(InstanceError::CommandFailed {
            command: command.to_string(),
            status: result.status,
            output: result.output,
        });
    }
    Ok(result)
}

/// Builds the `-o` string for `pg_ctl start`: socket directory, port, and no
/// TCP listen address.
fn server_options(data_dir: &Path, port: u16) -> OsString {
    let mut options = OsString::from("-k ");
    options.push(shell_quote(data_dir.as_os_str()));
    options.push(" -p ");
    options.push(shell_quote(OsStr::new(&port.to_string())));
    options.push(" -h ''");
    options
}

/// Wraps `value` in single quotes, rewriting embedded quotes as `'\''`.
pub(crate) fn shell_quote(value: &OsStr) -> OsString {
    let mut quoted = Vec::with_capacity(value.len() + 2);
    quoted.push(b'\'');
    for byte in value.as_bytes() {
        if *byte == b'\'' {
            quoted.extend_from_slice(b"'\\''");
        } else {
            quoted.push(*byte);
        }
    }
    quoted.push(b'\'');
    OsString::from_vec(quoted)
}

fn display_word(word: &OsStr) -> String {
    let plain = !word.is_empty()
        && word
            .as_bytes()
            .iter()
            .all(|byte| byte.is_ascii_alphanumeric() || b"-_=./,:@%+".contains(byte));
    if plain {
        word.to_string_lossy().into_owned()
    } else {
        shell_quote(word).to_string_lossy().into_owned()
    }
}
