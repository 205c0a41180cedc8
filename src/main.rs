//! Binary entry point for the `rackhost` CLI.
//!
//! Each invocation loads the host's persisted document, rebuilds its driver
//! through the registry, runs one operation, and writes the updated record
//! back, whether or not the operation succeeded. Only `create` reads driver
//! configuration from files and the environment; every later operation
//! reuses the configuration saved with the host.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use shell_escape::unix::escape;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use rackhost::{
    ConfigError, Driver, DriverConfig, DriverContext, DriverError, DriverRegistry, HostDocument,
    HostStore, InstanceRecord, InvalidState, ShellError, SshConfig, StoreConfig, StoreError,
};

mod cli;

use cli::{Cli, Command};

/// Log filter applied when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "rackhost=info";

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Shell(#[from] ShellError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid command argument: {0}")]
    InvalidCommand(String),
    #[error("remote command terminated without an exit status")]
    MissingExitCode,
}

/// Resolves a driver name to its configuration.
type ConfigLoader = fn(&str) -> Result<Option<DriverConfig>, ConfigError>;

/// Host operations that print at most one line and touch no other input.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Operation {
    State,
    Ip,
    Url,
    Start,
    Stop,
    Restart,
    Remove,
    Kill,
}

/// Everything one invocation works with.
struct App {
    registry: DriverRegistry,
    store: HostStore,
    ssh: SshConfig,
    cancel: CancellationToken,
    load_config: ConfigLoader,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let outcome = match App::from_environment(DriverRegistry::with_builtin(), cancel) {
        Ok(app) => app.dispatch(cli, &mut io::stdout(), &mut io::stderr()).await,
        Err(err) => Err(err),
    };
    let exit_code = outcome.unwrap_or_else(|err| {
        write_error(io::stderr(), &err);
        1
    });

    process::exit(exit_code);
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling pending waits");
            cancel.cancel();
        }
    });
}

impl App {
    fn from_environment(
        registry: DriverRegistry,
        cancel: CancellationToken,
    ) -> Result<Self, CliError> {
        let store_config = StoreConfig::load_without_cli_args()?;
        let ssh = SshConfig::load_without_cli_args()?;
        Ok(Self {
            registry,
            store: HostStore::new(store_config.root()),
            ssh,
            cancel,
            load_config: DriverConfig::load_for,
        })
    }

    async fn dispatch(
        &self,
        cli: Cli,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<i32, CliError> {
        let Cli { name, command } = cli;
        let operation = match command {
            Command::Create(args) => return self.create(&name, &args.driver).await,
            Command::Ssh(args) => return self.ssh(&name, &args.command, out, err),
            Command::State => Operation::State,
            Command::Ip => Operation::Ip,
            Command::Url => Operation::Url,
            Command::Start => Operation::Start,
            Command::Stop => Operation::Stop,
            Command::Restart => Operation::Restart,
            Command::Remove => Operation::Remove,
            Command::Kill => Operation::Kill,
        };
        self.operate(&name, operation, out).await
    }

    async fn create(&self, name: &str, driver_name: &str) -> Result<i32, CliError> {
        if let Some(existing) = self.store.load(name)? {
            let record = &existing.record;
            if !record.removed && record.keypair_name.is_some() {
                return Err(DriverError::InvalidState(InvalidState::AlreadyCreated).into());
            }
            debug!(host = name, "replacing record with nothing provisioned");
        }

        let config = (self.load_config)(driver_name)?
            .ok_or_else(|| DriverError::UnknownDriver(driver_name.to_owned()))?;
        let mut driver = self.open(name, config.clone(), InstanceRecord::default())?;
        let outcome = driver.create().await;
        self.persist(name, config, driver.as_ref())?;
        outcome?;
        info!(host = name, driver = driver_name, "host is ready");
        Ok(0)
    }

    async fn operate(
        &self,
        name: &str,
        operation: Operation,
        out: &mut dyn Write,
    ) -> Result<i32, CliError> {
        let HostDocument { config, record } = self.store.require(name)?;
        let mut driver = self.open(name, config.clone(), record)?;
        let outcome = run_operation(driver.as_mut(), operation).await;
        self.persist(name, config, driver.as_ref())?;
        if let Some(line) = outcome? {
            writeln!(out, "{line}").ok();
        }
        Ok(0)
    }

    fn ssh(
        &self,
        name: &str,
        args: &[String],
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<i32, CliError> {
        validate_command_args(args)?;
        let document = self.store.require(name)?;
        let driver = self.open(name, document.config, document.record)?;
        let output = driver.ssh(&render_remote_command(args))?;
        write!(out, "{}", output.stdout).ok();
        write!(err, "{}", output.stderr).ok();
        output.code.ok_or(CliError::MissingExitCode)
    }

    fn open(
        &self,
        name: &str,
        config: DriverConfig,
        record: InstanceRecord,
    ) -> Result<Box<dyn Driver>, CliError> {
        let context = DriverContext {
            config,
            ssh: self.ssh.clone(),
            store_path: self.store.host_dir(name)?,
            record,
            cancel: self.cancel.clone(),
        };
        Ok(self.registry.build(context)?)
    }

    fn persist(
        &self,
        name: &str,
        config: DriverConfig,
        driver: &dyn Driver,
    ) -> Result<(), CliError> {
        let document = HostDocument {
            config,
            record: driver.record().clone(),
        };
        self.store.save(name, &document)?;
        Ok(())
    }
}

async fn run_operation(
    driver: &mut dyn Driver,
    operation: Operation,
) -> Result<Option<String>, DriverError> {
    match operation {
        Operation::State => driver.state().await.map(|state| Some(state.to_string())),
        Operation::Ip => driver.ip().map(|address| Some(address.to_string())),
        Operation::Url => driver.url().map(Some),
        Operation::Start => driver.start().map(|()| None),
        Operation::Stop => driver.stop().map(|()| None),
        Operation::Restart => driver.restart().await.map(|()| None),
        Operation::Remove => driver.remove().await.map(|()| None),
        Operation::Kill => driver.kill().await.map(|()| None),
    }
}

fn render_remote_command(args: &[String]) -> String {
    args.iter()
        .map(|arg| escape(arg.as_str().into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn validate_command_args(args: &[String]) -> Result<(), CliError> {
    let has_control = args
        .iter()
        .any(|arg| arg.chars().any(|ch| ch.is_ascii_control()));
    if has_control {
        return Err(CliError::InvalidCommand(String::from(concat!(
            "command arguments must not contain control characters (ASCII ",
            "0x00-0x1F or 0x7F, e.g. newline, carriage return, tab, NUL)"
        ))));
    }
    Ok(())
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
