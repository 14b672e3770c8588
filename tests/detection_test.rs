//! Instance detection against a mock health endpoint

use anythingllm_auth::{detect_instance_type, detect_instance_type_async, AuthError, InstanceType};
use mockito::Server;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn test_environment_field_identifies_docker() {
    let mut server = Server::new();
    let health = server
        .mock("GET", "/api/health")
        .with_status(200)
        .with_body(r#"{"online":true,"environment":"docker"}"#)
        .create();

    let detected = detect_instance_type(&server.url(), TIMEOUT).unwrap();

    assert_eq!(detected, InstanceType::Docker);
    health.assert();
}

#[test]
fn test_server_header_identifies_docker() {
    let mut server = Server::new();
    server
        .mock("GET", "/api/health")
        .with_status(200)
        .with_header("server", "Docker/24.0")
        .with_body("{}")
        .create();

    assert_eq!(
        detect_instance_type(&server.url(), TIMEOUT).unwrap(),
        InstanceType::Docker
    );
}

#[test]
fn test_no_indicators_is_unknown() {
    let mut server = Server::new();
    server
        .mock("GET", "/api/health")
        .with_status(503)
        .create();

    // mockito listens on 127.0.0.1 with a random port, so no port hint applies
    assert_eq!(
        detect_instance_type(&server.url(), TIMEOUT).unwrap(),
        InstanceType::Unknown
    );
}

#[test]
fn test_unreachable_instance_fails_detection() {
    let err = detect_instance_type("http://127.0.0.1:1", Duration::from_secs(2)).unwrap_err();
    assert!(matches!(err, AuthError::InstanceDetection(_)));
}

#[tokio::test]
async fn test_async_detection_identifies_desktop() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/health")
        .with_status(200)
        .with_body(r#"{"environment":"desktop"}"#)
        .create_async()
        .await;

    let detected = detect_instance_type_async(&format!("{}/api", server.url()), TIMEOUT)
        .await
        .unwrap();

    assert_eq!(detected, InstanceType::Desktop);
}
