//! Behavioural coverage for layered configuration loading.

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::sync::{Mutex, MutexGuard};

use camino::Utf8PathBuf;
use once_cell::sync::Lazy;
use ortho_config::OrthoConfig as _;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use pgtestenv_config::{
    Config, default_bin_root, default_log_filter, default_log_format,
};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

const BIN_ROOT_ENV: &str = "PGTESTENV_BIN_ROOT";

struct Harness {
    temp_dir: TempDir,
    cli_args: RefCell<Vec<OsString>>,
    env_overrides: RefCell<Vec<(String, Option<OsString>)>>,
    loaded: RefCell<Option<Config>>,
    error: RefCell<Option<String>>,
    _env_guard: MutexGuard<'static, ()>,
}

impl Harness {
    fn new() -> Self {
        let env_guard = ENV_MUTEX.lock().unwrap_or_else(|poison| poison.into_inner());
        let temp_dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("failed to create temporary directory: {error}"),
        };
        let harness = Self {
            temp_dir,
            cli_args: RefCell::new(vec![OsString::from("pgtestenv")]),
            env_overrides: RefCell::new(Vec::new()),
            loaded: RefCell::new(None),
            error: RefCell::new(None),
            _env_guard: env_guard,
        };
        // Scenarios start from a clean slate even when the developer shell
        // exports overrides.
        harness.remove_env(BIN_ROOT_ENV);
        harness.remove_env("PGTESTENV_CONFIG_PATH");
        harness
    }

    fn write_config(&self, bin_root: &str) {
        let path = self.temp_dir.path().join("pgtestenv.toml");
        if let Err(error) = fs::write(&path, format!("bin_root = \"{bin_root}\"\n")) {
            panic!("failed to write configuration: {error}");
        }

        let mut args = self.cli_args.borrow_mut();
        args.push(OsString::from("--config-path"));
        args.push(path.into_os_string());
    }

    fn set_env(&self, key: &str, value: &str) {
        let previous = std::env::var_os(key);
        // Edition 2024 marks environment mutation as `unsafe`. The harness
        // holds `ENV_MUTEX` and restores overrides in `Drop`.
        unsafe { std::env::set_var(key, value) };
        self.env_overrides
            .borrow_mut()
            .push((key.to_owned(), previous));
    }

    fn remove_env(&self, key: &str) {
        let previous = std::env::var_os(key);
        unsafe { std::env::remove_var(key) };
        self.env_overrides
            .borrow_mut()
            .push((key.to_owned(), previous));
    }

    fn push_cli_arg(&self, arg: impl Into<OsString>) {
        self.cli_args.borrow_mut().push(arg.into());
    }

    fn load(&self) {
        if self.loaded.borrow().is_some() || self.error.borrow().is_some() {
            return;
        }

        let args = self.cli_args.borrow().clone();
        match Config::load_from_iter(args) {
            Ok(config) => {
                *self.loaded.borrow_mut() = Some(config);
            }
            Err(error) => {
                *self.error.borrow_mut() = Some(error.to_string());
            }
        }
    }

    fn loaded_config(&self) -> Config {
        self.load();
        if let Some(error) = self.error.borrow().as_ref() {
            panic!("configuration failed to load: {error}");
        }
        match self.loaded.borrow().as_ref() {
            Some(config) => config.clone(),
            None => panic!("configuration was not loaded"),
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let mut overrides = self.env_overrides.borrow_mut();
        while let Some((key, value)) = overrides.pop() {
            if let Some(os_value) = value {
                unsafe { std::env::set_var(&key, os_value) };
            } else {
                unsafe { std::env::remove_var(&key) };
            }
        }
    }
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[given("a configuration file setting the binary root to \"{root}\"")]
fn given_configuration_file(harness: &Harness, root: String) {
    harness.write_config(&root);
}

#[given("the environment overrides the binary root to \"{root}\"")]
fn given_environment_override(harness: &Harness, root: String) {
    harness.set_env(BIN_ROOT_ENV, &root);
}

#[when("the command line sets the binary root to \"{root}\"")]
fn when_cli_override(harness: &Harness, root: String) {
    harness.push_cli_arg("--bin-root");
    harness.push_cli_arg(OsString::from(&root));
}

#[when("the configuration loads without overrides")]
fn when_load_without_overrides(harness: &Harness) {
    harness.load();
}

#[then("loading the configuration resolves the binary root to \"{root}\"")]
fn then_resolved_root(harness: &Harness, root: String) {
    let config = harness.loaded_config();
    assert_eq!(config.bin_root(), Utf8PathBuf::from(root).as_path());
}

#[then("loading the configuration applies the built-in defaults")]
fn then_defaults_applied(harness: &Harness) {
    let config = harness.loaded_config();
    assert_eq!(config.bin_root(), default_bin_root().as_path());
    assert_eq!(config.bin_dir(), None);
    assert_eq!(config.log_filter(), default_log_filter());
    assert_eq!(config.log_format(), default_log_format());
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Built-in defaults apply without overrides"
)]
fn defaults_apply(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Configuration file overrides defaults"
)]
fn file_overrides_defaults(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Environment overrides the configuration file"
)]
fn environment_overrides_file(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Command line overrides every other source"
)]
fn cli_overrides_everything(#[from(harness)] harness: Harness) {
    let _ = harness;
}
