//! BDD step definitions for the host driver.

use rackhost::test_support::FakeCall;
use rackhost::{DriverError, InvalidState, RebootMode};
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{Action, DriverWorld};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn failure(driver_world: &DriverWorld) -> Result<DriverError, StepError> {
    match driver_world.outcome() {
        Some(Err(err)) => Ok(err),
        Some(Ok(())) => Err(StepError::Assertion(String::from(
            "expected failure, got success",
        ))),
        None => Err(StepError::Assertion(String::from("no action was performed"))),
    }
}

#[given("a configured Rackspace driver")]
fn configured_driver(driver_world: &DriverWorld) {
    assert_eq!(driver_world.provider.total_calls(), 0);
}

#[given("the server reports BUILD for \"{polls}\" polls")]
fn server_builds_for(driver_world: &DriverWorld, polls: usize) {
    for _ in 0..polls {
        driver_world.provider.push_status("BUILD");
    }
}

#[given("the server stays in \"{status}\"")]
fn server_stays_in(driver_world: &DriverWorld, status: String) {
    driver_world.provider.set_steady_status(status);
}

#[given("remote setup succeeds")]
fn remote_setup_succeeds(driver_world: &DriverWorld) {
    driver_world.runner.push_success();
    driver_world.runner.push_success();
}

#[given("remote setup fails with exit code \"{code}\"")]
fn remote_setup_fails(driver_world: &DriverWorld, code: i32) {
    driver_world.runner.push_failure(code);
}

#[when("I create the host")]
fn create_host(driver_world: &DriverWorld) {
    driver_world.perform(Action::Create);
}

#[when("I restart the host")]
fn restart_host(driver_world: &DriverWorld) {
    driver_world.perform(Action::Restart);
}

#[when("I remove the host")]
fn remove_host(driver_world: &DriverWorld) {
    driver_world.perform(Action::Remove);
}

#[then("the operation succeeds")]
fn operation_succeeds(driver_world: &DriverWorld) -> Result<(), StepError> {
    match driver_world.outcome() {
        Some(Ok(())) => Ok(()),
        Some(Err(err)) => Err(StepError::Assertion(format!(
            "expected success, got failure: {err}"
        ))),
        None => Err(StepError::Assertion(String::from("no action was performed"))),
    }
}

#[then("the operation fails with a provisioning timeout")]
fn fails_with_timeout(driver_world: &DriverWorld) -> Result<(), StepError> {
    match failure(driver_world)? {
        DriverError::ProvisionTimeout { action, .. } if action == "create" => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected create timeout, got {other}"
        ))),
    }
}

#[then("the operation fails at remote step \"{step}\"")]
fn fails_at_step(driver_world: &DriverWorld, step: String) -> Result<(), StepError> {
    match failure(driver_world)? {
        DriverError::RemoteExecution { step: failed, .. } if failed == step => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected failure at {step}, got {other}"
        ))),
    }
}

#[then("the host URL is \"{url}\"")]
fn host_url_is(driver_world: &DriverWorld, url: String) -> Result<(), StepError> {
    let actual = driver_world
        .url()
        .map_err(|err| StepError::Assertion(format!("url: {err}")))?;
    if actual == url {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("expected {url}, got {actual}")))
    }
}

#[then("the provider saw \"{polls}\" status polls")]
fn provider_saw_polls(driver_world: &DriverWorld, polls: usize) {
    assert_eq!(driver_world.provider.calls(FakeCall::GetServer), polls);
}

#[then("the record keeps the server id")]
fn record_keeps_server(driver_world: &DriverWorld) {
    let record = driver_world.record();
    assert!(record.server_id.is_some(), "record: {record:?}");
    assert!(record.ipv4.is_none(), "record: {record:?}");
}

#[then("the provider received a \"{mode}\" reboot")]
fn provider_received_reboot(driver_world: &DriverWorld, mode: String) {
    let modes: Vec<&str> = driver_world
        .provider
        .reboots()
        .into_iter()
        .map(RebootMode::as_str)
        .collect();
    assert_eq!(modes, vec![mode.as_str()]);
}

#[then("the server was deleted before the key pair")]
fn server_deleted_first(driver_world: &DriverWorld) {
    let deletions: Vec<FakeCall> = driver_world
        .provider
        .call_log()
        .into_iter()
        .filter(|call| matches!(call, FakeCall::DeleteServer | FakeCall::DeleteKeypair))
        .collect();
    assert_eq!(
        deletions,
        vec![FakeCall::DeleteServer, FakeCall::DeleteKeypair]
    );
}

#[then("the host reports it was removed")]
fn host_reports_removed(driver_world: &DriverWorld) {
    assert!(driver_world.record().removed);
    assert_eq!(
        driver_world.url(),
        Err(DriverError::InvalidState(InvalidState::Removed))
    );
}
