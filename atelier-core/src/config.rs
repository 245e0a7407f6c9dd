use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{AtelierError, Result};

static VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("variable regex"));

/// Configuration for the admin console, read from ~/.atelier/config.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtelierConfig {
    pub api: ApiConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// REST API root, e.g. https://example.org/api
    pub base_url: String,
    /// Bearer token; use ${ATELIER_API_TOKEN} rather than a literal secret
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            token: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub poll_interval_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AtelierConfig {
    /// Load config from the default path.
    ///
    /// Fails with an actionable error if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            return Err(AtelierError::ConfigNotFound { path });
        }
        Self::load_from(&path)
    }

    /// Load config from the default path, falling back to defaults when the
    /// file is missing. Environment overrides apply either way.
    pub fn load_or_default() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            return Self::load_from(&path);
        }
        let mut config = Self::default();
        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load config from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)
            .map_err(|err| AtelierError::invalid_config(path, err.to_string()))?;

        config.expand_variables(|key| env::var(key).ok());
        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Config file path: $ATELIER_CONFIG or ~/.atelier/config.toml
    pub fn config_path() -> PathBuf {
        if let Ok(path) = env::var("ATELIER_CONFIG") {
            return PathBuf::from(path);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".atelier/config.toml")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.chat.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Expand ${VAR} references in string values
    fn expand_variables(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.api.base_url = expand_string(&self.api.base_url, &lookup);
        if let Some(token) = &self.api.token {
            self.api.token = Some(expand_string(token, &lookup));
        }
        self.logging.level = expand_string(&self.logging.level, &lookup);
    }

    /// ATELIER_API_URL, ATELIER_API_TOKEN and ATELIER_POLL_INTERVAL_SECS win
    /// over the file
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("ATELIER_API_URL").filter(|v| !v.is_empty()) {
            self.api.base_url = url;
        }
        if let Some(token) = lookup("ATELIER_API_TOKEN").filter(|v| !v.is_empty()) {
            self.api.token = Some(token);
        }
        if let Some(secs) = lookup("ATELIER_POLL_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.chat.poll_interval_secs = secs;
        }
        // An unresolved ${VAR} token is as good as none
        if self
            .api
            .token
            .as_deref()
            .is_some_and(|t| t.is_empty() || VAR_RE.is_match(t))
        {
            self.api.token = None;
        }
    }

    fn validate(&self) -> Result<()> {
        let url = self.api.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AtelierError::config(format!(
                "api.base_url must start with http:// or https:// (got {url:?})"
            )));
        }
        if self.chat.poll_interval_secs == 0 {
            return Err(AtelierError::config("chat.poll_interval_secs must be at least 1"));
        }
        if self.api.timeout_secs == 0 {
            return Err(AtelierError::config("api.timeout_secs must be at least 1"));
        }
        Ok(())
    }
}

/// Replace ${VAR} with its value; unknown variables are left in place
fn expand_string(s: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    VAR_RE
        .replace_all(s, |caps: &Captures<'_>| {
            lookup(&caps[1]).unwrap_or_else(|| caps[0].to_owned())
        })
        .into_owned()
}
