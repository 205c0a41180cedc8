//! Unit tests for the Rackspace adapter.

use std::net::Ipv4Addr;

use rstest::rstest;
use serde_json::json;

use super::types::{ServerEnvelope, TokenResponse};
use super::*;
use crate::provider::DiskConfig;

fn catalogue() -> serde_json::Value {
    json!({
        "access": {
            "token": {"id": "tok-1", "expires": "2030-01-01T00:00:00Z"},
            "serviceCatalog": [
                {
                    "name": "cloudFiles",
                    "type": "object-store",
                    "endpoints": [{"region": "DFW", "publicURL": "https://storage.example/v1"}]
                },
                {
                    "name": "cloudServersOpenStack",
                    "type": "compute",
                    "endpoints": [
                        {"region": "ORD", "publicURL": "https://ord.servers.example/v2/42"},
                        {"region": "DFW", "publicURL": "https://dfw.servers.example/v2/42/"}
                    ]
                }
            ]
        }
    })
}

#[rstest]
#[case::exact("DFW")]
#[case::lowercase("dfw")]
fn token_response_selects_compute_endpoint_by_region(#[case] region: &str) {
    let response: TokenResponse = serde_json::from_value(catalogue())
        .unwrap_or_else(|err| panic!("parse token response: {err}"));

    let (token, url) = response
        .into_session_parts(region)
        .unwrap_or_else(|err| panic!("select endpoint: {err}"));

    assert_eq!(token, "tok-1");
    assert_eq!(url, "https://dfw.servers.example/v2/42");
}

#[rstest]
fn token_response_without_region_reports_missing_endpoint() {
    let response: TokenResponse = serde_json::from_value(catalogue())
        .unwrap_or_else(|err| panic!("parse token response: {err}"));

    let err = response
        .into_session_parts("SYD")
        .expect_err("no SYD endpoint");

    assert_eq!(
        err,
        ProviderError::MissingEndpoint {
            region: String::from("SYD")
        }
    );
    assert!(err.to_string().contains("SYD"), "unexpected message: {err}");
}

#[rstest]
fn token_request_uses_api_key_credentials() {
    let credentials = Credentials {
        username: String::from("rackuser"),
        api_key: String::from("secret"),
        region: String::from("DFW"),
    };

    let value = serde_json::to_value(TokenRequest::new(&credentials))
        .unwrap_or_else(|err| panic!("serialise: {err}"));

    assert_eq!(
        value,
        json!({"auth": {"RAX-KSKEY:apiKeyCredentials": {"username": "rackuser", "apiKey": "secret"}}})
    );
}

#[rstest]
fn create_server_request_carries_manual_disk_config() {
    let spec = ServerSpec {
        name: String::from("rackhost-abc"),
        image_id: String::from("img"),
        flavor_id: String::from("general1-1"),
        keypair_name: String::from("rackhost-key-abc"),
        disk_config: DiskConfig::Manual,
    };

    let value = serde_json::to_value(CreateServerRequest::new(&spec))
        .unwrap_or_else(|err| panic!("serialise: {err}"));

    assert_eq!(
        value,
        json!({"server": {
            "name": "rackhost-abc",
            "imageRef": "img",
            "flavorRef": "general1-1",
            "key_name": "rackhost-key-abc",
            "OS-DCF:diskConfig": "MANUAL"
        }})
    );
}

#[rstest]
fn reboot_request_names_the_mode() {
    let value = serde_json::to_value(RebootRequest::new(RebootMode::Soft.as_str()))
        .unwrap_or_else(|err| panic!("serialise: {err}"));
    assert_eq!(value, json!({"reboot": {"type": "SOFT"}}));
}

#[rstest]
#[case::access_ip(
    json!({"server": {"id": "s1", "status": "ACTIVE", "accessIPv4": "203.0.113.5"}}),
    Some(Ipv4Addr::new(203, 0, 113, 5))
)]
#[case::address_list(
    json!({"server": {"id": "s1", "status": "ACTIVE", "accessIPv4": "", "addresses": {
        "public": [
            {"addr": "2001:db8::1", "version": 6},
            {"addr": "198.51.100.7", "version": 4}
        ]
    }}}),
    Some(Ipv4Addr::new(198, 51, 100, 7))
)]
#[case::building(json!({"server": {"id": "s1", "status": "BUILD"}}), None)]
fn server_address_prefers_access_ip(
    #[case] body: serde_json::Value,
    #[case] expected: Option<Ipv4Addr>,
) {
    let envelope: ServerEnvelope =
        serde_json::from_value(body).unwrap_or_else(|err| panic!("parse server: {err}"));
    assert_eq!(envelope.server.ipv4(), expected);
}

#[rstest]
fn fault_message_reads_nested_message() {
    let body = br#"{"itemNotFound": {"message": "Instance could not be found", "code": 404}}"#;
    assert_eq!(types::fault_message(body), "Instance could not be found");
}

#[rstest]
fn fault_message_falls_back_to_raw_body() {
    assert_eq!(types::fault_message(b" Service Unavailable \n"), "Service Unavailable");
}

#[rstest]
#[case::unauthorized(StatusCode::UNAUTHORIZED)]
#[case::not_found(StatusCode::NOT_FOUND)]
#[case::conflict(StatusCode::CONFLICT)]
fn check_status_classifies_failures(#[case] status: StatusCode) {
    let body = br#"{"fault": {"message": "nope"}}"#;
    let err = check_status(status, body, "server", "srv-1").expect_err("failure status");

    match status {
        StatusCode::UNAUTHORIZED => assert_eq!(
            err,
            ProviderError::Authentication {
                message: String::from("nope")
            }
        ),
        StatusCode::NOT_FOUND => assert_eq!(
            err,
            ProviderError::NotFound {
                resource: "server",
                id: String::from("srv-1")
            }
        ),
        _ => assert_eq!(
            err,
            ProviderError::Api {
                status: 409,
                message: String::from("nope")
            }
        ),
    }
}

#[rstest]
fn check_status_accepts_success() {
    assert!(check_status(StatusCode::ACCEPTED, b"", "server", "srv-1").is_ok());
}

#[rstest]
fn session_debug_redacts_token() {
    let session = RackspaceSession {
        token: String::from("tok-secret"),
        compute_url: String::from("https://dfw.servers.example/v2/42"),
    };
    let rendered = format!("{session:?}");
    assert!(!rendered.contains("tok-secret"));
    assert!(rendered.contains("dfw.servers.example"));
}
