//! Test double for [`CleanupReporter`] that records teardown events.

use std::path::Path;
use std::sync::Mutex;

use crate::cleanup::{CleanupReport, CleanupReporter};
use crate::error::InstanceError;

/// Teardown events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupEvent {
    InspectFailed(String),
    StopFailed(String),
    DestroyFailed(String),
    Finished { stopped: bool, removed: bool, failures: usize },
}

/// Records cleanup events for assertions.
#[derive(Debug, Default)]
pub struct RecordingCleanupReporter {
    events: Mutex<Vec<CleanupEvent>>,
}

impl RecordingCleanupReporter {
    pub fn events(&self) -> Vec<CleanupEvent> {
        self.events
            .lock()
            .expect("cleanup reporter mutex poisoned")
            .clone()
    }

    pub fn failures(&self) -> Vec<CleanupEvent> {
        self.events()
            .into_iter()
            .filter(|event| !matches!(event, CleanupEvent::Finished { .. }))
            .collect()
    }

    fn record(&self, event: CleanupEvent) {
        self.events
            .lock()
            .expect("cleanup reporter mutex poisoned")
            .push(event);
    }
}

impl CleanupReporter for RecordingCleanupReporter {
    fn inspect_failed(&self, _path: &Path, error: &InstanceError) {
        self.record(CleanupEvent::InspectFailed(error.to_string()));
    }

    fn stop_failed(&self, _path: &Path, error: &InstanceError) {
        self.record(CleanupEvent::StopFailed(error.to_string()));
    }

    fn destroy_failed(&self, _path: &Path, error: &InstanceError) {
        self.record(CleanupEvent::DestroyFailed(error.to_string()));
    }

    fn finished(&self, report: &CleanupReport) {
        self.record(CleanupEvent::Finished {
            stopped: report.stop_attempted(),
            removed: report.removed(),
            failures: report.errors().len(),
        });
    }
}
