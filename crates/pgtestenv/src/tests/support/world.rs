//! BDD world: a scratch directory, the recording runner, and the handles and
//! outcomes the steps act on.

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use crate::cleanup::CleanupReport;
use crate::error::InstanceError;
use crate::instance::{InitOptions, Instance};
use crate::scoped::ScopedInstance;
use crate::test_support::RecordingCommandRunner;
use pgtestenv_config::Config;

use super::reporter::RecordingCleanupReporter;

/// Opens a handle on `dir/name` backed by `runner`.
pub fn open_instance(
    dir: &TempDir,
    name: &str,
    runner: &RecordingCommandRunner,
) -> Instance<RecordingCommandRunner> {
    Instance::open(dir.path().join(name), Config::default(), runner.clone())
        .expect("instance should open")
}

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    temp_dir: TempDir,
    pub runner: RecordingCommandRunner,
    pub reporter: Arc<RecordingCleanupReporter>,
    instance: Option<Instance<RecordingCommandRunner>>,
    scoped: Option<ScopedInstance<RecordingCommandRunner>>,
    last_error: Option<InstanceError>,
    report: Option<CleanupReport>,
}

impl TestWorld {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("temp dir"),
            runner: RecordingCommandRunner::new(),
            reporter: Arc::new(RecordingCleanupReporter::default()),
            instance: None,
            scoped: None,
            last_error: None,
            report: None,
        }
    }

    pub const fn temp_dir(&self) -> &TempDir {
        &self.temp_dir
    }

    pub fn data_dir(&self) -> PathBuf {
        self.temp_dir.path().join("pg")
    }

    pub fn open(&mut self) {
        self.instance = Some(open_instance(&self.temp_dir, "pg", &self.runner));
    }

    pub fn instance(&mut self) -> &mut Instance<RecordingCommandRunner> {
        self.instance.as_mut().expect("instance should be open")
    }

    /// Runs `operation`, keeping its error for later assertions.
    pub fn attempt(
        &mut self,
        operation: impl FnOnce(&mut Instance<RecordingCommandRunner>) -> Result<(), InstanceError>,
    ) {
        let result = operation(self.instance());
        self.last_error = result.err();
    }

    pub fn take_error(&mut self) -> InstanceError {
        self.last_error
            .take()
            .expect("the last operation should have failed")
    }

    pub fn initialize_running_scoped(&mut self) {
        let mut instance = open_instance(&self.temp_dir, "pg", &self.runner);
        instance
            .initialize(&InitOptions::new("14", 5500))
            .expect("initialize");
        instance.start(None).expect("start");
        let reporter = Arc::clone(&self.reporter);
        self.scoped = Some(ScopedInstance::with_reporter(instance, reporter));
    }

    pub fn scoped(&mut self) -> &mut ScopedInstance<RecordingCommandRunner> {
        self.scoped.as_mut().expect("scoped instance should exist")
    }

    pub fn drop_scoped(&mut self) {
        drop(self.scoped.take());
    }

    pub fn cleanup_scoped(&mut self) {
        let scoped = self.scoped.take().expect("scoped instance should exist");
        self.report = Some(scoped.cleanup());
    }

    pub fn report(&self) -> &CleanupReport {
        self.report.as_ref().expect("cleanup should have run")
    }
}
