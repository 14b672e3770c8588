//! Integration tests for environment-driven configuration
//!
//! Every test runs inside `temp_env::with_vars`, which serialises access to
//! the process environment and restores it afterwards.

use anythingllm_auth::{
    ConfigError, ConfigLoader, ConfigTemplate, Credentials, DeploymentMode, Session,
};
use tempfile::TempDir;

/// Variables the loader reads, cleared so the host environment cannot leak in
const RECOGNISED: &[&str] = &[
    "ANYTHING_LLM_DEPLOYMENT_MODE",
    "ANYTHING_LLM_DOCKER",
    "ANYTHING_LLM_DESKTOP",
    "ANYTHING_LLM_BASE_URL",
    "ANYTHING_LLM_API_PREFIX",
    "ANYTHING_LLM_LOGIN_ENDPOINT",
    "ANYTHING_LLM_REFRESH_ENDPOINT",
    "ANYTHING_LLM_VALIDATE_ENDPOINT",
    "ANYTHING_LLM_TOKEN_HEADER",
    "ANYTHING_LLM_TOKEN_PREFIX",
    "ANYTHING_LLM_TOKEN_EXPIRY_BUFFER_SECS",
    "ANYTHING_LLM_TIMEOUT_SECS",
    "ANYTHING_LLM_MAX_RETRIES",
    "ANYTHING_LLM_RETRY_DELAY_MS",
    "ANYTHING_LLM_VERIFY_SSL",
    "ANYTHING_LLM_REFRESH_SUPPORTED",
    "ANYTHING_LLM_USERNAME",
    "ANYTHING_LLM_PASSWORD",
    "ANYTHING_LLM_TOKEN",
];

/// Run `f` with only `vars` set among the recognised variables
fn with_env<R>(vars: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
    let mut all: Vec<(&str, Option<&str>)> = RECOGNISED
        .iter()
        .filter(|key| !vars.iter().any(|(k, _)| k == *key))
        .map(|key| (*key, None))
        .collect();
    all.extend(vars.iter().map(|(k, v)| (*k, Some(*v))));
    temp_env::with_vars(all, f)
}

#[test]
fn test_docker_flag_selects_docker_defaults() {
    let config = with_env(&[("ANYTHING_LLM_DOCKER", "true")], ConfigLoader::load).unwrap();

    assert_eq!(config.deployment_mode, DeploymentMode::Docker);
    assert_eq!(config.base_url, "http://localhost:3001");
    assert_eq!(config.timeout_secs, 30);
    assert!(!config.verify_ssl);
    assert!(config.refresh_supported);
}

#[test]
fn test_no_flags_selects_desktop_defaults() {
    let config = with_env(&[], ConfigLoader::load).unwrap();

    assert_eq!(config.deployment_mode, DeploymentMode::Desktop);
    assert_eq!(config.base_url, "http://localhost:3001");
    assert_eq!(config.timeout_secs, 60);
    assert!(config.verify_ssl);
    assert!(!config.refresh_supported);
}

#[test]
fn test_docker_flag_switched_off() {
    let config = with_env(&[("ANYTHING_LLM_DOCKER", "false")], ConfigLoader::load).unwrap();
    assert_eq!(config.deployment_mode, DeploymentMode::Desktop);
}

#[test]
fn test_explicit_mode_overrides_detection() {
    let config = with_env(
        &[
            ("ANYTHING_LLM_DOCKER", "1"),
            ("ANYTHING_LLM_DEPLOYMENT_MODE", "cloud"),
            ("ANYTHING_LLM_BASE_URL", "https://llm.example.com/"),
        ],
        ConfigLoader::load,
    )
    .unwrap();

    assert_eq!(config.deployment_mode, DeploymentMode::Cloud);
    assert_eq!(config.base_url, "https://llm.example.com");
    assert_eq!(config.retry_delay_ms, 2000);

    let forced = with_env(&[("ANYTHING_LLM_DOCKER", "1")], || {
        ConfigLoader::new().with_mode(DeploymentMode::Desktop).resolve()
    })
    .unwrap();
    assert_eq!(forced.deployment_mode, DeploymentMode::Desktop);
}

#[test]
fn test_cloud_without_base_url_fails() {
    let err = with_env(&[("ANYTHING_LLM_DEPLOYMENT_MODE", "cloud")], ConfigLoader::load)
        .unwrap_err();
    assert!(matches!(err, ConfigError::MissingBaseUrl(DeploymentMode::Cloud)));
}

#[test]
fn test_unknown_mode_fails() {
    let err = with_env(&[("ANYTHING_LLM_DEPLOYMENT_MODE", "kubernetes")], ConfigLoader::load)
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidDeploymentMode(_)));
}

#[test]
fn test_incomplete_credentials_fail() {
    let err = with_env(&[("ANYTHING_LLM_USERNAME", "admin")], ConfigLoader::load).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::IncompleteCredentials {
            missing: "ANYTHING_LLM_PASSWORD",
            ..
        }
    ));
}

#[test]
fn test_numeric_values_parse() {
    let config = with_env(
        &[
            ("ANYTHING_LLM_DOCKER", "yes"),
            ("ANYTHING_LLM_USERNAME", "admin"),
            ("ANYTHING_LLM_PASSWORD", "12345"),
            ("ANYTHING_LLM_TIMEOUT_SECS", "5"),
            ("ANYTHING_LLM_VERIFY_SSL", "true"),
        ],
        ConfigLoader::load,
    )
    .unwrap();

    assert_eq!(config.credentials, Some(Credentials::new("admin", "12345")));
    assert_eq!(config.timeout_secs, 5);
    assert!(config.verify_ssl);
}

#[test]
fn test_invalid_base_url_fails() {
    let err = with_env(&[("ANYTHING_LLM_BASE_URL", "localhost:3001")], ConfigLoader::load)
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidBaseUrl(_)));
}

#[test]
fn test_static_token_seeds_session() {
    let session = with_env(&[("ANYTHING_LLM_TOKEN", "desktop-api-key")], Session::from_env)
        .unwrap();

    assert_eq!(session.config().deployment_mode, DeploymentMode::Desktop);
    assert_eq!(
        session.tokens().current().unwrap().as_str(),
        "desktop-api-key"
    );
}

#[test]
fn test_template_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("docker.env");
    ConfigTemplate::for_mode(DeploymentMode::Docker)
        .write_to(&path)
        .unwrap();

    let config = with_env(&[], || ConfigLoader::load_from_file(&path)).unwrap();
    assert_eq!(config.deployment_mode, DeploymentMode::Docker);
    assert_eq!(config.base_url, "http://localhost:3001");
    assert!(!config.verify_ssl);
}

#[test]
fn test_environment_overrides_env_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(".env");
    std::fs::write(
        &path,
        "ANYTHING_LLM_DEPLOYMENT_MODE=cloud\n\
         ANYTHING_LLM_BASE_URL=https://from-file.example.com\n\
         ANYTHING_LLM_TIMEOUT_SECS=10\n\
         UNRELATED=ignored\n",
    )
    .unwrap();

    let config = with_env(
        &[("ANYTHING_LLM_BASE_URL", "https://from-env.example.com")],
        || ConfigLoader::load_from_file(&path),
    )
    .unwrap();

    assert_eq!(config.deployment_mode, DeploymentMode::Cloud);
    assert_eq!(config.base_url, "https://from-env.example.com");
    assert_eq!(config.timeout_secs, 10);
}

#[test]
fn test_env_file_errors() {
    let dir = TempDir::new().unwrap();

    let missing = ConfigLoader::load_from_file(dir.path().join("absent.env")).unwrap_err();
    assert!(matches!(missing, ConfigError::FileNotFound(_)));

    let yaml = dir.path().join("config.yaml");
    std::fs::write(&yaml, "base_url: x\n").unwrap();
    let unsupported = ConfigLoader::load_from_file(&yaml).unwrap_err();
    assert!(matches!(unsupported, ConfigError::UnsupportedFormat(_)));
}

#[test]
fn test_secrets_are_kept_verbatim() {
    for password in ["007", "[x]", "1.50", "true", "{a}"] {
        let config = with_env(
            &[
                ("ANYTHING_LLM_DOCKER", "1"),
                ("ANYTHING_LLM_USERNAME", "0042"),
                ("ANYTHING_LLM_PASSWORD", password),
                ("ANYTHING_LLM_TOKEN", "[api-key]"),
            ],
            ConfigLoader::load,
        )
        .unwrap();

        assert_eq!(config.credentials, Some(Credentials::new("0042", password)));
        assert_eq!(config.token.as_deref(), Some("[api-key]"));
    }
}

#[test]
fn test_desktop_flag_selects_desktop() {
    let config = with_env(&[("ANYTHING_LLM_DESKTOP", "true")], ConfigLoader::load).unwrap();
    assert_eq!(config.deployment_mode, DeploymentMode::Desktop);
}

#[test]
fn test_docker_and_desktop_flags_conflict() {
    let err = with_env(
        &[
            ("ANYTHING_LLM_DOCKER", "true"),
            ("ANYTHING_LLM_DESKTOP", "true"),
        ],
        ConfigLoader::load,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::AmbiguousDeploymentMode));
}
