use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where and how an application wants this crate's `tracing` events
///
/// A library should stay quiet unless asked, so the default writes nowhere:
/// stdout is off and there is no log directory. Turn on an output with
/// [`LogConfig::stdout`] or [`LogConfig::in_dir`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    /// Default level when `RUST_LOG` is unset (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Stdout format; files are always JSON
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for rolling JSON log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default)]
    pub enable_stdout: bool,

    #[serde(default)]
    pub rotation: RotationPolicy,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

impl LogConfig {
    /// Log to stdout in `format`
    pub fn stdout(format: LogFormat) -> Self {
        Self {
            level: default_log_level(),
            format,
            enable_stdout: true,
            ..Self::default()
        }
    }

    /// Log JSON lines to rolling files under `dir`
    pub fn in_dir(dir: impl Into<PathBuf>, rotation: RotationPolicy) -> Self {
        Self {
            level: default_log_level(),
            log_dir: Some(dir.into()),
            rotation,
            ..Self::default()
        }
    }

    /// Whether any output is enabled
    pub const fn has_output(&self) -> bool {
        self.enable_stdout || self.log_dir.is_some()
    }

    /// Level to use, falling back to `info` when unset
    pub(crate) fn effective_level(&self) -> &str {
        if self.level.trim().is_empty() {
            "info"
        } else {
            self.level.trim()
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
