//! Query a running instance to tell Docker and Desktop installs apart

use reqwest::header::SERVER;
use reqwest::{Method, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument};

use super::errors::AuthError;
use super::transport::{
    ApiResponse, AsyncTransport, BlockingTransport, PreparedRequest, ReqwestAsyncTransport,
    ReqwestBlockingTransport, TransportSettings,
};
use crate::domain::models::InstanceType;

/// Default health check timeout
pub const DEFAULT_DETECTION_TIMEOUT: Duration = Duration::from_secs(5);

fn health_request(base_url: &str) -> PreparedRequest {
    let base = base_url.trim_end_matches('/');
    let base = base.strip_suffix("/api").unwrap_or(base);
    PreparedRequest::new(Method::GET, format!("{base}/api/health"))
}

fn port_hint(base_url: &str) -> Option<InstanceType> {
    let port = url::Url::parse(base_url).ok()?.port()?;
    match port {
        3001 => Some(InstanceType::Docker),
        3000 => Some(InstanceType::Desktop),
        _ => None,
    }
}

fn is_local(base_url: &str) -> bool {
    url::Url::parse(base_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .is_some_and(|host| host == "localhost" || host == "127.0.0.1")
}

/// Classify the health response, falling back to URL heuristics
fn interpret(base_url: &str, response: &ApiResponse) -> InstanceType {
    if response.status() == StatusCode::OK {
        let environment = response
            .json::<serde_json::Value>()
            .ok()
            .and_then(|body| body.get("environment")?.as_str().map(str::to_string));
        match environment.as_deref() {
            Some("docker") => return InstanceType::Docker,
            Some("desktop") => return InstanceType::Desktop,
            _ => {}
        }

        let server = response
            .headers()
            .get(SERVER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if server.contains("docker") {
            return InstanceType::Docker;
        }

        if let Some(hint) = port_hint(base_url) {
            return hint;
        }
    }

    if is_local(base_url) {
        if let Some(hint) = port_hint(base_url) {
            return hint;
        }
    }

    InstanceType::Unknown
}

fn detection_failed(err: AuthError) -> AuthError {
    match err {
        AuthError::Connection(source) => {
            AuthError::InstanceDetection(format!("health check failed: {source}"))
        }
        other => other,
    }
}

fn settings(timeout: Duration) -> TransportSettings {
    TransportSettings {
        timeout,
        verify_ssl: true,
    }
}

/// Detect the instance type behind `base_url`, blocking
///
/// Looks at the `environment` field of `GET /api/health`, then at the
/// `Server` header, then at the port (3001 is Docker, 3000 is Desktop).
#[instrument]
pub fn detect_instance_type(base_url: &str, timeout: Duration) -> Result<InstanceType, AuthError> {
    let transport = ReqwestBlockingTransport::new(settings(timeout))?;
    detect_with(&transport, base_url)
}

/// Blocking detection over a caller-supplied transport
pub fn detect_with(
    transport: &dyn BlockingTransport,
    base_url: &str,
) -> Result<InstanceType, AuthError> {
    let response = transport
        .execute(&health_request(base_url))
        .map_err(detection_failed)?;
    let detected = interpret(base_url, &response);
    debug!(status = %response.status(), detected = %detected, "instance detected");
    Ok(detected)
}

/// Detect the instance type behind `base_url`
#[instrument]
pub async fn detect_instance_type_async(
    base_url: &str,
    timeout: Duration,
) -> Result<InstanceType, AuthError> {
    let transport = ReqwestAsyncTransport::new(settings(timeout))?;
    detect_with_async(&transport, base_url).await
}

/// Async detection over a caller-supplied transport
pub async fn detect_with_async(
    transport: &dyn AsyncTransport,
    base_url: &str,
) -> Result<InstanceType, AuthError> {
    let response = transport
        .execute(&health_request(base_url))
        .await
        .map_err(detection_failed)?;
    let detected = interpret(base_url, &response);
    debug!(status = %response.status(), detected = %detected, "instance detected");
    Ok(detected)
}
