use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

use super::loader::{ConfigError, DESKTOP_ENV, DOCKER_ENV, ENV_PREFIX, MODE_ENV};
use crate::domain::models::{Config, DeploymentMode};

/// Placeholder address written into cloud templates
const CLOUD_PLACEHOLDER_URL: &str = "https://anythingllm.example.com";

/// `.env` template for one deployment
///
/// Templates carry connection settings only. Credentials and static tokens
/// are never written.
#[derive(Debug, Clone)]
pub struct ConfigTemplate {
    config: Config,
}

impl ConfigTemplate {
    /// Template holding the defaults of a deployment mode
    pub fn for_mode(mode: DeploymentMode) -> Self {
        let mut config = Config::for_mode(mode);
        if config.base_url.is_empty() {
            config.base_url = CLOUD_PLACEHOLDER_URL.to_string();
        }
        Self { config }
    }

    /// Template reproducing an existing configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Deployment this template targets
    pub const fn mode(&self) -> DeploymentMode {
        self.config.deployment_mode
    }

    /// Render the template as `.env` text
    pub fn render(&self) -> String {
        let c = &self.config;
        let mode = c.deployment_mode;

        let title = match mode {
            DeploymentMode::Docker => "Docker",
            DeploymentMode::Desktop => "Desktop",
            DeploymentMode::Cloud => "Cloud",
        };

        let mut out = format!("# AnythingLLM {title} Configuration\n");
        let mut line = |key: &str, value: &dyn std::fmt::Display| {
            // Writing to a String cannot fail
            let _ = writeln!(out, "{ENV_PREFIX}{key}={value}");
        };

        line("BASE_URL", &c.base_url);
        line("API_PREFIX", &c.api_prefix);
        line("TIMEOUT_SECS", &c.timeout_secs);
        line("VERIFY_SSL", &c.verify_ssl);
        line("MAX_RETRIES", &c.max_retries);
        line("RETRY_DELAY_MS", &c.retry_delay_ms);
        line("REFRESH_SUPPORTED", &c.refresh_supported);

        let marker = match mode {
            DeploymentMode::Docker => format!("{DOCKER_ENV}=true"),
            DeploymentMode::Desktop => format!("{DESKTOP_ENV}=true"),
            DeploymentMode::Cloud => format!("{MODE_ENV}=cloud"),
        };
        out.push_str(&marker);
        out.push('\n');
        out
    }

    /// Write the rendered template to `path`
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::TemplateWrite {
                path: path.to_path_buf(),
                source,
            })?;
        }

        std::fs::write(path, self.render()).map_err(|source| ConfigError::TemplateWrite {
            path: path.to_path_buf(),
            source,
        })?;

        info!(path = %path.display(), mode = %self.mode(), "wrote config template");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Credentials;

    #[test]
    fn test_docker_template() {
        let rendered = ConfigTemplate::for_mode(DeploymentMode::Docker).render();

        assert!(rendered.starts_with("# AnythingLLM Docker Configuration\n"));
        assert!(rendered.contains("ANYTHING_LLM_BASE_URL=http://localhost:3001\n"));
        assert!(rendered.contains("ANYTHING_LLM_TIMEOUT_SECS=30\n"));
        assert!(rendered.contains("ANYTHING_LLM_VERIFY_SSL=false\n"));
        assert!(rendered.ends_with("ANYTHING_LLM_DOCKER=true\n"));
    }

    #[test]
    fn test_cloud_template_uses_placeholder() {
        let rendered = ConfigTemplate::for_mode(DeploymentMode::Cloud).render();

        assert!(rendered.contains("ANYTHING_LLM_BASE_URL=https://anythingllm.example.com\n"));
        assert!(rendered.contains("ANYTHING_LLM_RETRY_DELAY_MS=2000\n"));
        assert!(rendered.contains("ANYTHING_LLM_DEPLOYMENT_MODE=cloud\n"));
    }

    #[test]
    fn test_desktop_template_marker() {
        let rendered = ConfigTemplate::for_mode(DeploymentMode::Desktop).render();
        assert!(rendered.contains("ANYTHING_LLM_TIMEOUT_SECS=60\n"));
        assert!(rendered.contains("ANYTHING_LLM_DESKTOP=true\n"));
    }

    #[test]
    fn test_template_never_writes_secrets() {
        let config = Config {
            credentials: Some(Credentials::new("alice", "hunter2")),
            token: Some("static-api-key".to_string()),
            ..Config::for_mode(DeploymentMode::Desktop)
        };

        let rendered = ConfigTemplate::from_config(&config).render();
        assert!(!rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("static-api-key"));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("docker.env");

        ConfigTemplate::for_mode(DeploymentMode::Docker)
            .write_to(&path)
            .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("ANYTHING_LLM_DOCKER=true"));
    }
}
