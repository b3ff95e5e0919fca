//! Shared fixtures for the lifecycle and cleanup suites.

mod reporter;
mod world;

pub use reporter::{CleanupEvent, RecordingCleanupReporter};
pub use world::{TestWorld, open_instance};
