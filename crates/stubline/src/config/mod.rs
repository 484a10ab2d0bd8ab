//! Configuration types for the interception engine.

mod rules;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use rules::{ResponseSpec, RuleFile, RuleSpec};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Deadline applied by `wait` when the caller gives none.
    #[serde(default = "default_wait_timeout_ms")]
    pub default_wait_timeout_ms: u64,

    /// Timeout for real network calls (pass-through, live responses, direct requests).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Directory holding `<name>.json` fixture documents.
    #[serde(default = "default_fixtures_dir")]
    pub fixtures_dir: PathBuf,

    /// Relative direct-request URLs are joined onto this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Default for `DirectRequest::fail_on_status_code`.
    #[serde(default = "default_true")]
    pub fail_on_status_code: bool,

    /// Fallback filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_wait_timeout_ms() -> u64 {
    5_000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_fixtures_dir() -> PathBuf {
    PathBuf::from("fixtures")
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_wait_timeout_ms: default_wait_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            fixtures_dir: default_fixtures_dir(),
            base_url: None,
            fail_on_status_code: true,
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Load a YAML (or JSON) config file and validate it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: EngineConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.default_wait_timeout_ms == 0 {
            anyhow::bail!("defaultWaitTimeoutMs must be greater than zero");
        }
        if self.request_timeout_ms == 0 {
            anyhow::bail!("requestTimeoutMs must be greater than zero");
        }

        if let Some(ref base_url) = self.base_url {
            let parsed = reqwest::Url::parse(base_url)
                .with_context(|| format!("Invalid baseUrl '{base_url}'"))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                anyhow::bail!(
                    "Unsupported baseUrl scheme: '{}'. Currently supported: http, https",
                    parsed.scheme()
                );
            }
        }

        Ok(())
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.default_wait_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.default_wait_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Resolve a direct-request URL against `base_url`.
    ///
    /// Absolute URLs are returned unchanged. Joining is textual so a base
    /// with a path prefix (`.../api`) keeps it.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        match self.base_url {
            Some(ref base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                url.trim_start_matches('/')
            ),
            None => url.to_string(),
        }
    }
}
