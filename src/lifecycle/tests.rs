//! Unit tests for the lifecycle controller.

use std::time::Duration;

use rstest::{fixture, rstest};

use super::*;
use crate::test_support::{FAKE_IPV4, FAKE_SERVER_ID, FakeCall, FakeProvider, FakeSession};

#[fixture]
fn session() -> FakeSession {
    FakeSession {
        username: String::from("rackuser"),
    }
}

#[fixture]
fn request() -> BuildRequest {
    BuildRequest {
        base_name: String::from("base"),
        image_id: String::from("image-coreos"),
        flavor_id: String::from("general1-1"),
        keypair_name: String::from("rackhost-key-base"),
    }
}

fn server_id() -> ServerId {
    ServerId::new(FAKE_SERVER_ID)
}

#[rstest]
#[tokio::test]
async fn create_submits_manual_disk_build(session: FakeSession, request: BuildRequest) {
    let provider = FakeProvider::new();
    let controller = InstanceController::new(provider.clone());

    let id = controller
        .create(&session, &request)
        .await
        .unwrap_or_else(|err| panic!("create: {err}"));

    assert_eq!(id, server_id());
    let specs = provider.server_specs();
    let Some(spec) = specs.first() else {
        panic!("expected a build request");
    };
    assert_eq!(spec.name, "rackhost-base");
    assert_eq!(spec.keypair_name, "rackhost-key-base");
    assert_eq!(spec.disk_config, DiskConfig::Manual);
    assert_eq!(provider.calls(FakeCall::GetServer), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn wait_for_ready_returns_address_after_build(session: FakeSession) {
    let provider = FakeProvider::new();
    provider.push_status("BUILD");
    provider.push_status("BUILD");
    let controller = InstanceController::new(provider.clone());

    let address = controller
        .wait_for_ready(&session, &server_id(), &CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("wait: {err}"));

    assert_eq!(address, FAKE_IPV4);
    assert_eq!(provider.calls(FakeCall::GetServer), 3);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn wait_for_ready_times_out_within_create_budget(session: FakeSession) {
    let provider = FakeProvider::new();
    provider.set_steady_status("BUILD");
    let controller = InstanceController::new(provider.clone());
    let started = tokio::time::Instant::now();

    let err = controller
        .wait_for_ready(&session, &server_id(), &CancellationToken::new())
        .await
        .expect_err("build never finishes");

    let DriverError::ProvisionTimeout {
        action,
        ref server_id,
        waited,
    } = err
    else {
        panic!("expected ProvisionTimeout, got {err:?}");
    };
    assert_eq!(action, "create");
    assert_eq!(server_id.as_str(), FAKE_SERVER_ID);
    assert_eq!(waited, Duration::from_secs(300));
    assert_eq!(provider.calls(FakeCall::GetServer), 61);
    assert!(started.elapsed() <= Duration::from_secs(300));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn wait_for_ready_reports_missing_address(session: FakeSession) {
    let provider = FakeProvider::new();
    provider.set_ipv4(None);
    let controller = InstanceController::new(provider)
        .with_create_wait(WaitPolicy::new(Duration::from_secs(10), Duration::from_secs(5)));

    let err = controller
        .wait_for_ready(&session, &server_id(), &CancellationToken::new())
        .await
        .expect_err("no address is ever reported");

    assert_eq!(
        err,
        DriverError::MissingAddress {
            server_id: server_id()
        }
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn wait_for_ready_propagates_status_failure(session: FakeSession) {
    let provider = FakeProvider::new();
    provider.fail_with(
        FakeCall::GetServer,
        ProviderError::Transport {
            message: String::from("connection reset"),
        },
    );
    let controller = InstanceController::new(provider);

    let err = controller
        .wait_for_ready(&session, &server_id(), &CancellationToken::new())
        .await
        .expect_err("status query fails");

    assert!(matches!(err, DriverError::Provider(ProviderError::Transport { .. })));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn wait_for_ready_honours_cancellation(session: FakeSession) {
    let provider = FakeProvider::new();
    provider.set_steady_status("BUILD");
    let controller = InstanceController::new(provider);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = controller
        .wait_for_ready(&session, &server_id(), &cancel)
        .await
        .expect_err("cancelled wait fails");

    assert_eq!(
        err,
        DriverError::Cancelled {
            action: "create",
            server_id: server_id()
        }
    );
}

#[rstest]
#[case::build("BUILD", LifecycleState::Starting)]
#[case::active("ACTIVE", LifecycleState::Running)]
#[case::suspended("SUSPENDED", LifecycleState::Paused)]
#[case::deleted("DELETED", LifecycleState::Stopped)]
#[case::unknown("MIGRATING", LifecycleState::Unknown(String::from("MIGRATING")))]
#[tokio::test]
async fn status_maps_provider_vocabulary(
    session: FakeSession,
    #[case] raw: &str,
    #[case] expected: LifecycleState,
) {
    let provider = FakeProvider::new();
    provider.set_steady_status(raw);
    let controller = InstanceController::new(provider.clone());

    let state = controller
        .status(&session, &server_id())
        .await
        .unwrap_or_else(|err| panic!("status: {err}"));

    assert_eq!(state, expected);
    assert_eq!(provider.total_calls(), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn reboot_is_soft_and_waits_for_active(session: FakeSession) {
    let provider = FakeProvider::new();
    provider.push_status("REBOOT");
    let controller = InstanceController::new(provider.clone());

    controller
        .reboot(&session, &server_id(), &CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("reboot: {err}"));

    assert_eq!(provider.reboots(), vec![RebootMode::Soft]);
    assert_eq!(provider.calls(FakeCall::GetServer), 2);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn reboot_times_out_within_reboot_budget(session: FakeSession) {
    let provider = FakeProvider::new();
    provider.set_steady_status("REBOOT");
    let controller = InstanceController::new(provider.clone());

    let err = controller
        .reboot(&session, &server_id(), &CancellationToken::new())
        .await
        .expect_err("reboot never completes");

    assert!(
        matches!(
            err,
            DriverError::ProvisionTimeout { action: "reboot", waited, .. }
                if waited == Duration::from_secs(600)
        ),
        "unexpected error: {err:?}"
    );
    assert_eq!(provider.calls(FakeCall::GetServer), 121);
}

#[rstest]
#[tokio::test]
async fn reboot_request_failure_skips_polling(session: FakeSession) {
    let provider = FakeProvider::new();
    provider.fail(FakeCall::RebootServer);
    let controller = InstanceController::new(provider.clone());

    let err = controller
        .reboot(&session, &server_id(), &CancellationToken::new())
        .await
        .expect_err("reboot request fails");

    assert!(matches!(err, DriverError::Provider(ProviderError::Api { status: 500, .. })));
    assert_eq!(provider.calls(FakeCall::GetServer), 0);
}

#[rstest]
#[tokio::test]
async fn destroy_deletes_server_then_keypair(session: FakeSession) {
    let provider = FakeProvider::new();
    let controller = InstanceController::new(provider.clone());

    controller
        .destroy(&session, &server_id(), "rackhost-key-base")
        .await
        .unwrap_or_else(|err| panic!("destroy: {err}"));

    assert_eq!(
        provider.call_log(),
        vec![FakeCall::DeleteServer, FakeCall::DeleteKeypair]
    );
}

#[rstest]
#[tokio::test]
async fn destroy_stops_when_server_deletion_fails(session: FakeSession) {
    let provider = FakeProvider::new();
    provider.fail(FakeCall::DeleteServer);
    let controller = InstanceController::new(provider.clone());

    let err = controller
        .destroy(&session, &server_id(), "rackhost-key-base")
        .await
        .expect_err("server deletion fails");

    assert!(matches!(err, DriverError::Provider(_)));
    assert_eq!(provider.calls(FakeCall::DeleteKeypair), 0);
}

#[rstest]
#[tokio::test]
async fn destroy_treats_absent_resources_as_deleted(session: FakeSession) {
    let provider = FakeProvider::new();
    provider.fail_with(
        FakeCall::DeleteServer,
        ProviderError::NotFound {
            resource: "server",
            id: String::from(FAKE_SERVER_ID),
        },
    );
    provider.fail_with(
        FakeCall::DeleteKeypair,
        ProviderError::NotFound {
            resource: "keypair",
            id: String::from("rackhost-key-base"),
        },
    );
    let controller = InstanceController::new(provider.clone());

    controller
        .destroy(&session, &server_id(), "rackhost-key-base")
        .await
        .unwrap_or_else(|err| panic!("absent resources should be ignored: {err}"));

    assert_eq!(provider.calls(FakeCall::DeleteKeypair), 1);
}
