//! Instance handles that tear themselves down when dropped.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::cleanup::{CleanupReport, CleanupReporter, TracingCleanupReporter};
use crate::command::{CommandRunner, SystemCommandRunner};
use crate::instance::Instance;

/// An [`Instance`] that is stopped and deleted when it goes out of scope.
///
/// Teardown runs on every exit path, including early returns and panics.
/// Failures are never raised from `drop`; they go to the configured
/// [`CleanupReporter`] instead.
pub struct ScopedInstance<R = SystemCommandRunner>
where
    R: CommandRunner,
{
    instance: Instance<R>,
    reporter: Arc<dyn CleanupReporter>,
    armed: bool,
}

impl<R> ScopedInstance<R>
where
    R: CommandRunner,
{
    /// Wraps `instance`, logging teardown failures with `tracing`.
    #[must_use]
    pub fn new(instance: Instance<R>) -> Self {
        Self::with_reporter(instance, Arc::new(TracingCleanupReporter::new()))
    }

    /// Wraps `instance`, sending teardown failures to `reporter`.
    #[must_use]
    pub fn with_reporter(instance: Instance<R>, reporter: Arc<dyn CleanupReporter>) -> Self {
        Self {
            instance,
            reporter,
            armed: true,
        }
    }

    /// Tears the instance down now and returns what happened.
    #[must_use]
    pub fn cleanup(mut self) -> CleanupReport {
        self.armed = false;
        teardown(&mut self.instance, self.reporter.as_ref())
    }

    /// Turns off teardown so the instance outlives this handle.
    pub const fn disarm(&mut self) {
        self.armed = false;
    }

    /// Whether dropping this handle will tear the instance down.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.armed
    }
}

impl<R> Deref for ScopedInstance<R>
where
    R: CommandRunner,
{
    type Target = Instance<R>;

    fn deref(&self) -> &Self::Target {
        &self.instance
    }
}

impl<R> DerefMut for ScopedInstance<R>
where
    R: CommandRunner,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.instance
    }
}

impl<R> Drop for ScopedInstance<R>
where
    R: CommandRunner,
{
    fn drop(&mut self) {
        if self.armed {
            self.armed = false;
            drop(teardown(&mut self.instance, self.reporter.as_ref()));
        }
    }
}

impl<R> std::fmt::Debug for ScopedInstance<R>
where
    R: CommandRunner + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedInstance")
            .field("instance", &self.instance)
            .field("armed", &self.armed)
            .finish_non_exhaustive()
    }
}

/// Runs `body` with a scoped handle on `instance`, tearing it down afterwards.
pub fn with_cleanup<R, T, F>(instance: Instance<R>, body: F) -> T
where
    R: CommandRunner,
    F: FnOnce(&mut Instance<R>) -> T,
{
    let mut scoped = ScopedInstance::new(instance);
    body(&mut *scoped)
}

/// Stops a running server and deletes the directory, collecting failures.
///
/// Nothing happens for an uninitialized directory. Deletion is attempted even
/// when stopping failed; it still refuses while the socket file exists.
fn teardown<R>(instance: &mut Instance<R>, reporter: &dyn CleanupReporter) -> CleanupReport
where
    R: CommandRunner,
{
    let mut report = CleanupReport::new(instance.path().to_path_buf());
    match instance.is_initialized() {
        Ok(true) => {}
        Ok(false) => {
            reporter.finished(&report);
            return report;
        }
        Err(error) => {
            reporter.inspect_failed(instance.path(), &error);
            report.push_error(error);
            reporter.finished(&report);
            return report;
        }
    }

    match instance.is_running() {
        Ok(true) => {
            report.mark_stop_attempted();
            if let Err(error) = instance.stop() {
                reporter.stop_failed(instance.path(), &error);
                report.push_error(error);
            }
        }
        Ok(false) => {}
        Err(error) => {
            reporter.inspect_failed(instance.path(), &error);
            report.push_error(error);
        }
    }

    match instance.destroy() {
        Ok(()) => report.mark_removed(),
        Err(error) => {
            reporter.destroy_failed(instance.path(), &error);
            report.push_error(error);
        }
    }
    reporter.finished(&report);
    report
}
