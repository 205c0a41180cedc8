//! BDD scenarios for the host driver lifecycle.

use rstest_bdd_macros::scenario;

use super::test_helpers::{DriverWorld, driver_world};

#[scenario(
    path = "tests/features/driver.feature",
    name = "Create a host and expose the container daemon"
)]
fn scenario_create_host(driver_world: DriverWorld) {
    drop(driver_world);
}

#[scenario(
    path = "tests/features/driver.feature",
    name = "Give up when the server never becomes active"
)]
fn scenario_create_timeout(driver_world: DriverWorld) {
    drop(driver_world);
}

#[scenario(
    path = "tests/features/driver.feature",
    name = "Surface remote setup failures"
)]
fn scenario_setup_failure(driver_world: DriverWorld) {
    drop(driver_world);
}

#[scenario(
    path = "tests/features/driver.feature",
    name = "Restart soft-reboots the server"
)]
fn scenario_restart(driver_world: DriverWorld) {
    drop(driver_world);
}

#[scenario(
    path = "tests/features/driver.feature",
    name = "Remove deletes the server before the key pair"
)]
fn scenario_remove(driver_world: DriverWorld) {
    drop(driver_world);
}
