//! # Client Configuration
//!
//! Settings for building a client from a JSON file instead of code:
//!
//! ```json
//! {
//!   "base_address": "http://localhost:8080/api",
//!   "timeout_ms": 5000,
//!   "connect_timeout_ms": 1000,
//!   "user_agent": "dynrest/0.3",
//!   "default_headers": { "x-api-key": "secret" },
//!   "runner": "task"
//! }
//! ```
//!
//! Every field is optional. [`ClientConfig::with_env_overrides`] lets `DYNREST_BASE_ADDRESS`,
//! `DYNREST_TIMEOUT_MS` and `DYNREST_USER_AGENT` take precedence over the file.
use http::{
    HeaderMap, HeaderName, HeaderValue,
    header::{InvalidHeaderName, InvalidHeaderValue},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, num::ParseIntError, path::Path, time::Duration};

pub const ENV_BASE_ADDRESS: &str = "DYNREST_BASE_ADDRESS";
pub const ENV_TIMEOUT_MS: &str = "DYNREST_TIMEOUT_MS";
pub const ENV_USER_AGENT: &str = "DYNREST_USER_AGENT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': '{source}'")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid config: '{0}'")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value '{value}' for '{name}': '{source}'")]
    InvalidEnv {
        name: &'static str,
        value: String,
        source: ParseIntError,
    },
    #[error("Invalid default header name '{name}': '{source}'")]
    InvalidHeaderName {
        name: String,
        source: InvalidHeaderName,
    },
    #[error("Invalid value for default header '{name}': '{source}'")]
    InvalidHeaderValue {
        name: String,
        source: InvalidHeaderValue,
    },
    #[error("Failed to build HTTP client: '{0}'")]
    Client(#[source] reqwest::Error),
}

/// Which runner executes deferred calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerKind {
    /// Tokio tasks that deferred handles can abort.
    #[default]
    Task,
    /// Fire-and-forget execution. Deferred handles cannot be cancelled.
    Detached,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub base_address: Option<String>,
    /// Total time allowed for one request, in milliseconds.
    pub timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
    /// Headers sent with every request, before the headers bound from arguments.
    pub default_headers: BTreeMap<String, String>,
    pub runner: RunnerKind,
}

impl ClientConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Applies the `DYNREST_*` environment variables that are set.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Applies overrides looked up by variable name.
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(address) = lookup(ENV_BASE_ADDRESS) {
            self.base_address = Some(address);
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            let timeout = raw
                .trim()
                .parse()
                .map_err(|source| ConfigError::InvalidEnv {
                    name: ENV_TIMEOUT_MS,
                    value: raw.clone(),
                    source,
                })?;
            self.timeout_ms = Some(timeout);
        }
        if let Some(agent) = lookup(ENV_USER_AGENT) {
            self.user_agent = Some(agent);
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    /// The configured default headers as a header map.
    pub fn header_map(&self) -> Result<HeaderMap, ConfigError> {
        let mut headers = HeaderMap::with_capacity(self.default_headers.len());
        for (name, value) in &self.default_headers {
            let key =
                HeaderName::try_from(name.as_str()).map_err(|source| ConfigError::InvalidHeaderName {
                    name: name.clone(),
                    source,
                })?;
            let val = HeaderValue::try_from(value.as_str()).map_err(|source| {
                ConfigError::InvalidHeaderValue {
                    name: name.clone(),
                    source,
                }
            })?;
            headers.append(key, val);
        }
        Ok(headers)
    }
}
