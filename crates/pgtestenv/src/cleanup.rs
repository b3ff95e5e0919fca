//! Reporting for best-effort instance teardown.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::InstanceError;

pub(crate) const CLEANUP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::cleanup");

/// Observer for failures swallowed while tearing an instance down.
pub trait CleanupReporter: Send + Sync {
    /// Invoked when the instance state could not be determined.
    fn inspect_failed(&self, path: &Path, error: &InstanceError);

    /// Invoked when stopping the server failed.
    fn stop_failed(&self, path: &Path, error: &InstanceError);

    /// Invoked when removing the directory failed.
    fn destroy_failed(&self, path: &Path, error: &InstanceError);

    /// Invoked once teardown has finished, successfully or not.
    fn finished(&self, report: &CleanupReport);
}

impl<T> CleanupReporter for Arc<T>
where
    T: CleanupReporter + ?Sized,
{
    fn inspect_failed(&self, path: &Path, error: &InstanceError) {
        (**self).inspect_failed(path, error);
    }

    fn stop_failed(&self, path: &Path, error: &InstanceError) {
        (**self).stop_failed(path, error);
    }

    fn destroy_failed(&self, path: &Path, error: &InstanceError) {
        (**self).destroy_failed(path, error);
    }

    fn finished(&self, report: &CleanupReport) {
        (**self).finished(report);
    }
}

/// Default reporter that logs swallowed failures with `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCleanupReporter;

impl TracingCleanupReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl CleanupReporter for TracingCleanupReporter {
    fn inspect_failed(&self, path: &Path, error: &InstanceError) {
        tracing::warn!(
            target: CLEANUP_TARGET,
            event = "inspect_failed",
            path = %path.display(),
            error = %error,
            "could not determine instance state during cleanup"
        );
    }

    fn stop_failed(&self, path: &Path, error: &InstanceError) {
        tracing::warn!(
            target: CLEANUP_TARGET,
            event = "stop_failed",
            path = %path.display(),
            error = %error,
            "failed to stop server during cleanup"
        );
    }

    fn destroy_failed(&self, path: &Path, error: &InstanceError) {
        tracing::warn!(
            target: CLEANUP_TARGET,
            event = "destroy_failed",
            path = %path.display(),
            error = %error,
            "failed to remove instance directory during cleanup"
        );
    }

    fn finished(&self, report: &CleanupReport) {
        tracing::debug!(
            target: CLEANUP_TARGET,
            event = "finished",
            path = %report.path().display(),
            stopped = report.stop_attempted(),
            removed = report.removed(),
            failures = report.errors().len(),
            "instance cleanup finished"
        );
    }
}

/// Outcome of one teardown.
#[derive(Debug)]
pub struct CleanupReport {
    path: PathBuf,
    stop_attempted: bool,
    removed: bool,
    errors: Vec<InstanceError>,
}

impl CleanupReport {
    pub(crate) const fn new(path: PathBuf) -> Self {
        Self {
            path,
            stop_attempted: false,
            removed: false,
            errors: Vec::new(),
        }
    }

    pub(crate) const fn mark_stop_attempted(&mut self) {
        self.stop_attempted = true;
    }

    pub(crate) const fn mark_removed(&mut self) {
        self.removed = true;
    }

    pub(crate) fn push_error(&mut self, error: InstanceError) {
        self.errors.push(error);
    }

    /// Instance directory that was torn down.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Whether a running server was asked to stop.
    #[must_use]
    pub const fn stop_attempted(&self) -> bool {
        self.stop_attempted
    }

    /// Whether the directory was removed.
    #[must_use]
    pub const fn removed(&self) -> bool {
        self.removed
    }

    /// Failures swallowed during teardown, in the order they occurred.
    #[must_use]
    pub fn errors(&self) -> &[InstanceError] {
        &self.errors
    }

    /// Whether teardown completed without any failure.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}
