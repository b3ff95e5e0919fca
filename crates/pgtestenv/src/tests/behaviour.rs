//! Behavioural tests for the instance lifecycle.

use std::cell::RefCell;
use std::fs;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::error::InstanceError;
use crate::instance::{InitOptions, Instance};
use crate::paths::{VERSION_FILE, socket_file_name};
use crate::test_support::RecordingCommandRunner;

use super::support::{TestWorld, open_instance};

#[fixture]
fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}

#[given("a fresh instance directory")]
fn given_fresh_directory(world: &RefCell<TestWorld>) {
    world.borrow_mut().open();
}

#[given("an existing empty directory")]
fn given_existing_directory(world: &RefCell<TestWorld>) {
    let mut world = world.borrow_mut();
    fs::create_dir(world.data_dir()).expect("create directory");
    world.open();
}

#[given("an initialized instance on port {port}")]
fn given_initialized_instance(world: &RefCell<TestWorld>, port: u16) {
    let mut world = world.borrow_mut();
    world.open();
    world
        .instance()
        .initialize(&InitOptions::new("14", port))
        .expect("initialize");
}

#[when("the instance is initialized with version \"{version}\" on port {port} as \"{superuser}\"")]
fn when_initialized(world: &RefCell<TestWorld>, version: String, port: u16, superuser: String) {
    let options = InitOptions::new(version, port).with_superuser(superuser);
    world
        .borrow_mut()
        .attempt(|instance| instance.initialize(&options));
}

#[when("the server is started")]
fn when_started(world: &RefCell<TestWorld>) {
    world.borrow_mut().attempt(|instance| instance.start(None));
}

#[when("the server is started on port {port}")]
fn when_started_on_port(world: &RefCell<TestWorld>, port: u16) {
    world
        .borrow_mut()
        .attempt(|instance| instance.start(Some(port)));
}

#[when("the server is stopped")]
fn when_stopped(world: &RefCell<TestWorld>) {
    world.borrow_mut().attempt(|instance| instance.stop());
}

#[when("the instance is destroyed")]
fn when_destroyed(world: &RefCell<TestWorld>) {
    world.borrow_mut().attempt(|instance| instance.destroy());
}

#[then("the instance is initialized")]
fn then_initialized(world: &RefCell<TestWorld>) {
    let initialized = world
        .borrow_mut()
        .instance()
        .is_initialized()
        .expect("record should load");
    assert!(initialized, "instance should be initialized");
}

#[then("the instance is not initialized")]
fn then_not_initialized(world: &RefCell<TestWorld>) {
    let initialized = world
        .borrow_mut()
        .instance()
        .is_initialized()
        .expect("record should load");
    assert!(!initialized, "instance should not be initialized");
}

#[then("a reopened handle reports port {port} and superuser \"{superuser}\"")]
fn then_reopened_reports(world: &RefCell<TestWorld>, port: u16, superuser: String) {
    let world = world.borrow();
    let reopened = open_instance_at(&world);
    let config = reopened.config();
    assert_eq!(config.port(), Some(port));
    assert_eq!(config.superuser(), Some(superuser.as_str()));
    assert_eq!(config.encoding(), Some("UTF-8"));
    assert_eq!(config.locale(), Some("en_US.UTF-8"));
}

#[then("a reopened handle reports the server version from PG_VERSION")]
fn then_reopened_version(world: &RefCell<TestWorld>) {
    let world = world.borrow();
    fs::write(world.data_dir().join(VERSION_FILE), "14.2\n").expect("rewrite marker");
    let reopened = open_instance_at(&world);
    assert_eq!(reopened.config().server_version(), Some("14.2"));
}

#[then("the server is running")]
fn then_running(world: &RefCell<TestWorld>) {
    let running = world
        .borrow_mut()
        .instance()
        .is_running()
        .expect("liveness check");
    assert!(running, "server should be running");
}

#[then("the server is not running")]
fn then_not_running(world: &RefCell<TestWorld>) {
    let running = world
        .borrow_mut()
        .instance()
        .is_running()
        .expect("liveness check");
    assert!(!running, "server should not be running");
}

#[then("the socket for port {port} exists")]
fn then_socket_exists(world: &RefCell<TestWorld>, port: u16) {
    let socket = world.borrow().data_dir().join(socket_file_name(port));
    assert!(socket.exists(), "missing socket {}", socket.display());
}

#[then("the operation fails because the server is running")]
fn then_fails_running(world: &RefCell<TestWorld>) {
    let error = world.borrow_mut().take_error();
    assert!(
        matches!(error, InstanceError::InstanceRunning { .. }),
        "unexpected error: {error:?}"
    );
}

#[then("the operation fails because the directory already exists")]
fn then_fails_existing(world: &RefCell<TestWorld>) {
    let error = world.borrow_mut().take_error();
    assert!(
        matches!(error, InstanceError::AlreadyInitialized { .. }),
        "unexpected error: {error:?}"
    );
}

#[then("the operation fails because the instance is not initialized")]
fn then_fails_uninitialized(world: &RefCell<TestWorld>) {
    let error = world.borrow_mut().take_error();
    assert!(
        matches!(error, InstanceError::UninitializedInstance { .. }),
        "unexpected error: {error:?}"
    );
}

#[then("no control command was run")]
fn then_no_commands(world: &RefCell<TestWorld>) {
    let commands = world.borrow().runner.commands();
    assert!(commands.is_empty(), "unexpected commands: {commands:?}");
}

#[then("the instance directory still exists")]
fn then_directory_exists(world: &RefCell<TestWorld>) {
    assert!(world.borrow().data_dir().is_dir());
}

#[then("the instance directory is still empty")]
fn then_directory_empty(world: &RefCell<TestWorld>) {
    let entries = fs::read_dir(world.borrow().data_dir())
        .expect("list directory")
        .count();
    assert_eq!(entries, 0);
}

#[then("the instance directory is gone")]
fn then_directory_gone(world: &RefCell<TestWorld>) {
    assert!(!world.borrow().data_dir().exists());
}

fn open_instance_at(world: &TestWorld) -> Instance<RecordingCommandRunner> {
    open_instance(world.temp_dir(), "pg", &world.runner)
}

#[scenario(
    path = "tests/features/instance_lifecycle.feature",
    name = "Full lifecycle of a test instance"
)]
fn full_lifecycle(world: RefCell<TestWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/instance_lifecycle.feature",
    name = "Initializing an existing directory is refused"
)]
fn initialize_existing_directory(world: RefCell<TestWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/instance_lifecycle.feature",
    name = "Starting an uninitialized instance is refused"
)]
fn start_uninitialized(world: RefCell<TestWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/instance_lifecycle.feature",
    name = "A port passed to start overrides the recorded port"
)]
fn start_port_override(world: RefCell<TestWorld>) {
    let _ = world;
}
