//! Test suites for the instance lifecycle manager.

mod behaviour;
mod support;
