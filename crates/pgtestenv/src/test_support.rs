//! In-process stand-in for `initdb` and `pg_ctl`.
//!
//! [`RecordingCommandRunner`] applies the observable filesystem effects of the
//! real binaries to the instance directory and records every command it
//! receives. `initdb` creates the directory and its `PG_VERSION` marker,
//! `pg_ctl start` creates the socket file, and `pg_ctl stop` removes it.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::command::{CommandOutput, CommandRunner, ControlCommand, SUCCESS};
use crate::paths::{VERSION_FILE, socket_file_name};

/// Control operations the fake understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlOp {
    /// `initdb`.
    Initdb,
    /// `pg_ctl start`.
    Start,
    /// `pg_ctl stop`.
    Stop,
}

#[derive(Debug, Default)]
struct RunnerState {
    commands: Vec<ControlCommand>,
    failures: Vec<(ControlOp, i32, String)>,
    marker_version: Option<String>,
}

/// Records control commands and emulates their effects on disk.
#[derive(Debug, Clone, Default)]
pub struct RecordingCommandRunner {
    state: Arc<Mutex<RunnerState>>,
}

impl RecordingCommandRunner {
    /// Builds a runner with no injected failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `op` exit with `status` and `output` without any
    /// filesystem effect.
    pub fn fail_next(&self, op: ControlOp, status: i32, output: impl Into<String>) {
        self.lock().failures.push((op, status, output.into()));
    }

    /// Writes `version` into `PG_VERSION` instead of the version implied by
    /// the binary path.
    pub fn write_marker_version(&self, version: impl Into<String>) {
        self.lock().marker_version = Some(version.into());
    }

    /// Commands received so far, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<ControlCommand> {
        self.lock().commands.clone()
    }

    /// Operations received so far, in order. Unrecognised commands are
    /// skipped.
    #[must_use]
    pub fn operations(&self) -> Vec<ControlOp> {
        self.lock()
            .commands
            .iter()
            .filter_map(classify)
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, RunnerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_failure(&self, op: ControlOp) -> Option<CommandOutput> {
        let mut state = self.lock();
        let index = state.failures.iter().position(|(failing, _, _)| *failing == op)?;
        let (_, status, output) = state.failures.remove(index);
        Some(CommandOutput::exited(status, output))
    }
}

impl CommandRunner for RecordingCommandRunner {
    fn run(&self, command: &ControlCommand) -> io::Result<CommandOutput> {
        self.lock().commands.push(command.clone());
        let Some(op) = classify(command) else {
            return Ok(CommandOutput::exited(127, "unrecognised command"));
        };
        if let Some(failure) = self.take_failure(op) {
            return Ok(failure);
        }
        let Some(data_dir) = value_after(command, "-D").map(PathBuf::from) else {
            return Ok(CommandOutput::exited(1, "no data directory specified"));
        };
        match op {
            ControlOp::Initdb => self.emulate_initdb(command, &data_dir),
            ControlOp::Start => emulate_start(command, &data_dir),
            ControlOp::Stop => emulate_stop(&data_dir),
        }
    }
}

impl RecordingCommandRunner {
    fn emulate_initdb(&self, command: &ControlCommand, data_dir: &Path) -> io::Result<CommandOutput> {
        if data_dir.exists() {
            return Ok(CommandOutput::exited(
                1,
                format!("initdb: directory \"{}\" exists", data_dir.display()),
            ));
        }
        let version = self
            .lock()
            .marker_version
            .clone()
            .or_else(|| version_from_program(command.program()))
            .unwrap_or_else(|| String::from("0"));
        fs::create_dir_all(data_dir)?;
        fs::write(data_dir.join(VERSION_FILE), format!("{version}\n"))?;
        Ok(CommandOutput::exited(SUCCESS, "Success. You can now start the database server.\n"))
    }
}

fn emulate_start(command: &ControlCommand, data_dir: &Path) -> io::Result<CommandOutput> {
    let Some(port) = value_after(command, "-o").and_then(port_from_options) else {
        return Ok(CommandOutput::exited(1, "no port in server options"));
    };
    if running_socket(data_dir)?.is_some() {
        return Ok(CommandOutput::exited(
            1,
            "pg_ctl: another server might be running\n",
        ));
    }
    fs::write(data_dir.join(socket_file_name(port)), b"")?;
    Ok(CommandOutput::exited(SUCCESS, "server started\n"))
}

fn emulate_stop(data_dir: &Path) -> io::Result<CommandOutput> {
    match running_socket(data_dir)? {
        Some(socket) => {
            fs::remove_file(socket)?;
            Ok(CommandOutput::exited(SUCCESS, "server stopped\n"))
        }
        None => Ok(CommandOutput::exited(
            1,
            "pg_ctl: PID file does not exist\nIs server running?\n",
        )),
    }
}

fn classify(command: &ControlCommand) -> Option<ControlOp> {
    let name = command.program().file_name()?;
    if name == "initdb" {
        return Some(ControlOp::Initdb);
    }
    if name != "pg_ctl" {
        return None;
    }
    command.args().iter().find_map(|arg| {
        if arg == "start" {
            Some(ControlOp::Start)
        } else if arg == "stop" {
            Some(ControlOp::Stop)
        } else {
            None
        }
    })
}

fn value_after<'a>(command: &'a ControlCommand, flag: &str) -> Option<&'a OsStr> {
    let mut args = command.args().iter();
    args.by_ref().find(|arg| *arg == flag)?;
    args.next().map(|value| value.as_os_str())
}

fn version_from_program(program: &Path) -> Option<String> {
    let version_dir = program.parent()?.parent()?;
    version_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

fn port_from_options(options: &OsStr) -> Option<u16> {
    let text = options.to_str()?;
    let (_, rest) = text.split_once("-p '")?;
    let (port, _) = rest.split_once('\'')?;
    port.parse().ok()
}

fn running_socket(data_dir: &Path) -> io::Result<Option<PathBuf>> {
    for entry in fs::read_dir(data_dir)? {
        let path = entry?.path();
        let is_socket = path
            .file_name()
            .and_then(OsStr::to_str)
            .is_some_and(|name| name.starts_with(".s.PGSQL."));
        if is_socket {
            return Ok(Some(path));
        }
    }
    Ok(None)
}
