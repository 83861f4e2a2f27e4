//! Configuration management for the MindVideo proxy server.
//!
//! All settings come from the process environment (optionally seeded from a
//! `.env` file by `main`). Loading is done once at startup and fails fast when
//! the upstream credential pool is empty.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Prefix of the numbered credential variables (`MINDVIDEO_AUTH_TOKEN_1`, `_2`, ...).
const AUTH_TOKEN_PREFIX: &str = "MINDVIDEO_AUTH_TOKEN_";

/// Master key value that leaves the API unauthenticated.
pub const OPEN_ACCESS_KEY: &str = "1";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port)
    #[serde(default)]
    pub server: ServerConfig,

    /// Bearer key callers must present; `None` or `"1"` disables the check
    #[serde(default)]
    pub master_api_key: Option<String>,

    /// Upstream (mindvideo.ai) connection settings
    pub upstream: UpstreamConfig,

    /// Task polling settings
    #[serde(default)]
    pub polling: PollingConfig,

    /// Caller-facing model name -> upstream bot id
    #[serde(default = "default_model_mapping")]
    pub model_mapping: BTreeMap<String, u64>,

    /// Model used when a request does not name one
    #[serde(default = "default_model")]
    pub default_model: String,
}

/// Server-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Upstream API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the upstream v2 API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer tokens used round-robin for outgoing calls
    pub auth_tokens: Vec<String>,

    /// Secret mixed into the `i-sign` digest
    #[serde(default = "default_sign_app_key")]
    pub sign_app_key: String,

    /// Timeout for a single upstream HTTP call in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Whether to verify SSL certificates for upstream requests
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
}

/// Pacing and budget of the task polling loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Seconds to sleep before each poll
    #[serde(default = "default_polling_interval")]
    pub interval_secs: u64,

    /// Wall-clock budget for the whole loop in seconds
    #[serde(default = "default_polling_timeout")]
    pub timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_polling_interval(),
            timeout_secs: default_polling_timeout(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8088
}

fn default_base_url() -> String {
    "https://api.mindvideo.ai/api/v2".to_string()
}

fn default_sign_app_key() -> String {
    "s#c_120*AB".to_string()
}

fn default_request_timeout() -> u64 {
    300
}

fn default_verify_ssl() -> bool {
    true
}

fn default_polling_interval() -> u64 {
    5
}

fn default_polling_timeout() -> u64 {
    480
}

fn default_model() -> String {
    "sora-2-free".to_string()
}

fn default_model_mapping() -> BTreeMap<String, u64> {
    BTreeMap::from([(default_model(), 153)])
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mindvideo_proxy::core::config::AppConfig;
    ///
    /// let config = AppConfig::from_env().expect("Failed to load config");
    /// ```
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// Unset or unparsable optional values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let auth_tokens: Vec<String> = (1..)
            .map(|i| var(&format!("{}{}", AUTH_TOKEN_PREFIX, i)))
            .take_while(Option::is_some)
            .flatten()
            .collect();

        let model_mapping = match var("MODEL_MAPPING") {
            Some(raw) => serde_json::from_str::<BTreeMap<String, u64>>(&raw)
                .context("MODEL_MAPPING must be a JSON object of model name to bot id")?,
            None => default_model_mapping(),
        };

        let config = AppConfig {
            server: ServerConfig {
                host: var("HOST").unwrap_or_else(default_host),
                port: parse_or(var("PORT").or_else(|| var("NGINX_PORT")), default_port()),
            },
            master_api_key: var("API_MASTER_KEY"),
            upstream: UpstreamConfig {
                base_url: var("MINDVIDEO_BASE_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or_else(default_base_url),
                auth_tokens,
                sign_app_key: var("SIGN_APP_KEY").unwrap_or_else(default_sign_app_key),
                request_timeout_secs: parse_or(var("API_REQUEST_TIMEOUT"), default_request_timeout()),
                verify_ssl: var("VERIFY_SSL")
                    .map(|v| str_to_bool(&v))
                    .unwrap_or_else(default_verify_ssl),
            },
            polling: PollingConfig {
                interval_secs: parse_or(var("POLLING_INTERVAL"), default_polling_interval()),
                timeout_secs: parse_or(var("POLLING_TIMEOUT"), default_polling_timeout()),
            },
            model_mapping,
            default_model: var("DEFAULT_MODEL").unwrap_or_else(default_model),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the rest of the server relies on.
    pub fn validate(&self) -> Result<()> {
        if self.upstream.auth_tokens.is_empty() {
            bail!(
                "At least one upstream credential must be configured ({}1)",
                AUTH_TOKEN_PREFIX
            );
        }
        if self.model_mapping.is_empty() {
            bail!("MODEL_MAPPING must contain at least one model");
        }
        if !self.model_mapping.contains_key(&self.default_model) {
            bail!(
                "DEFAULT_MODEL '{}' is not present in MODEL_MAPPING",
                self.default_model
            );
        }
        if self.polling.interval_secs == 0 || self.polling.timeout_secs == 0 {
            bail!("POLLING_INTERVAL and POLLING_TIMEOUT must be greater than zero");
        }
        Ok(())
    }

    /// The master key, if caller authentication is actually enabled.
    pub fn effective_master_key(&self) -> Option<&str> {
        self.master_api_key
            .as_deref()
            .filter(|key| !key.is_empty() && *key != OPEN_ACCESS_KEY)
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Convert string to boolean.
///
/// Accepts: "true", "1", "yes", "on" (case-insensitive)
fn str_to_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
