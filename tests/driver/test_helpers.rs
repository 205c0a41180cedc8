//! Shared fixtures for driver BDD scenarios.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use camino::Utf8PathBuf;
use rackhost::test_support::{
    FakeProvider, ScriptedRunner, rackspace_config, seed_key_pair, ssh_config,
};
use rackhost::{Driver, DriverError, HostDriver, InstanceRecord, SshShell};
use rstest::fixture;
use tempfile::TempDir;
use tokio::runtime::{Builder, Runtime};

/// Operation a `When` step performs.
#[derive(Clone, Copy, Debug)]
pub enum Action {
    Create,
    Restart,
    Remove,
}

/// Scenario state. Clones share the provider, runner, and record.
#[derive(Clone, Debug)]
pub struct DriverWorld {
    pub provider: FakeProvider,
    pub runner: ScriptedRunner,
    store_path: Utf8PathBuf,
    record: Arc<Mutex<InstanceRecord>>,
    outcome: Arc<Mutex<Option<Result<(), DriverError>>>>,
    _tmp: Arc<TempDir>,
}

impl DriverWorld {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let store_path = Utf8PathBuf::from_path_buf(tmp.path().join("dev"))
            .unwrap_or_else(|path| panic!("temp path should be utf8: {}", path.display()));
        seed_key_pair(&store_path).unwrap_or_else(|err| panic!("seed keys: {err}"));
        Self {
            provider: FakeProvider::new(),
            runner: ScriptedRunner::new(),
            store_path,
            record: Arc::new(Mutex::new(InstanceRecord::default())),
            outcome: Arc::new(Mutex::new(None)),
            _tmp: Arc::new(tmp),
        }
    }

    fn driver(&self) -> HostDriver<FakeProvider, ScriptedRunner> {
        let shell = SshShell::new(ssh_config(), self.runner.clone())
            .unwrap_or_else(|err| panic!("shell: {err}"));
        HostDriver::new(
            rackspace_config(),
            self.provider.clone(),
            shell,
            self.store_path.clone(),
        )
        .unwrap_or_else(|err| panic!("driver: {err}"))
        .with_record(self.record())
    }

    /// Runs `action` on a driver resumed from the stored record, on a
    /// runtime whose clock advances only when every task is idle.
    pub fn perform(&self, action: Action) {
        let runtime = paused_runtime();
        let mut driver = self.driver();
        let result = runtime.block_on(async {
            match action {
                Action::Create => driver.create().await,
                Action::Restart => driver.restart().await,
                Action::Remove => driver.remove().await,
            }
        });
        *lock(&self.record) = driver.record().clone();
        *lock(&self.outcome) = Some(result);
    }

    /// Snapshot of the persisted record.
    pub fn record(&self) -> InstanceRecord {
        lock(&self.record).clone()
    }

    /// Result of the most recent action.
    pub fn outcome(&self) -> Option<Result<(), DriverError>> {
        lock(&self.outcome).clone()
    }

    /// Address reported by a driver resumed from the stored record.
    pub fn url(&self) -> Result<String, DriverError> {
        self.driver().url()
    }
}

fn paused_runtime() -> Runtime {
    Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap_or_else(|err| panic!("runtime: {err}"))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[fixture]
pub fn driver_world() -> DriverWorld {
    DriverWorld::new()
}
