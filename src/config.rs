use std::{collections::HashMap, time::Duration};

use config::{Config as ConfigLib, ConfigError, Environment, File};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::crypto::HashAlg;
use crate::protocol::CertificateLevel;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_STATUS_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 180;
/// Longest configurable wait for a session result, one day
pub const MAX_SESSION_TIMEOUT_SECS: u64 = 86_400;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub relying_party: Option<RelyingPartyConfig>,
}

/// Where the provider lives and how the client talks to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the relying-party API, e.g. `https://sid.demo.sk.ee/smart-id-rp/v1`
    #[serde(default)]
    pub host: String,
    /// Hash used for authentication challenges
    #[serde(default)]
    pub hash_algorithm: HashAlg,
    /// Pause between status queries while the session is `RUNNING`
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Long-poll horizon asked of the provider on each status query
    #[serde(default = "default_status_timeout_ms")]
    pub status_timeout_ms: u64,
    /// Timeout of a submission request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Default deadline for awaiting a session result
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,
}

/// Relying-party identity sent with every request.
///
/// `uuid`, `name` and `certificate_level` always win over request fields;
/// `extra` holds additional parameters that request fields may override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelyingPartyConfig {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub certificate_level: CertificateLevel,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_status_timeout_ms() -> u64 {
    DEFAULT_STATUS_TIMEOUT_MS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_session_timeout_secs() -> u64 {
    DEFAULT_SESSION_TIMEOUT_SECS
}

impl ProviderConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    /// Validates the configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("Provider host cannot be empty".to_string());
        }
        Url::parse(&self.host).map_err(|e| format!("Provider host is not a valid URL: {e}"))?;
        if self.poll_interval_ms == 0 {
            return Err("Poll interval must be greater than 0".to_string());
        }
        if self.status_timeout_ms == 0 {
            return Err("Status timeout must be greater than 0".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("Request timeout must be greater than 0".to_string());
        }
        if self.session_timeout_secs == 0 || self.session_timeout_secs > MAX_SESSION_TIMEOUT_SECS {
            return Err(format!(
                "Session timeout must be between 1 and {MAX_SESSION_TIMEOUT_SECS} seconds"
            ));
        }
        Ok(())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            hash_algorithm: HashAlg::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            status_timeout_ms: DEFAULT_STATUS_TIMEOUT_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            session_timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
        }
    }
}

impl RelyingPartyConfig {
    pub fn new(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
            certificate_level: CertificateLevel::default(),
            extra: Map::new(),
        }
    }

    pub fn with_certificate_level(mut self, level: CertificateLevel) -> Self {
        self.certificate_level = level;
        self
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("provider.host", "")?
            .set_default("provider.hash_algorithm", "SHA512")?
            .add_source(File::with_name("config/settings").required(false));

        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Should be in the format SMARTID_PROVIDER__HOST or SMARTID_RELYING_PARTY__UUID
            builder = builder.add_source(
                Environment::with_prefix("SMARTID")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }
}
