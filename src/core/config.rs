use crate::core::profiles::DEFAULT_API;
use crate::core::types::EventMatching;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 4035;
pub const DEFAULT_APP_NAME: &str = "dConnectSDK Rust";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// Use `https`/`wss` instead of `http`/`ws`
    pub ssl_enabled: bool,
    /// API namespace, the first path segment of every request
    pub api: String,
    /// URI scheme used to launch the manager application
    pub uri_scheme_name: String,
    pub host: String,
    pub port: u16,
    /// Value of the `X-GotAPI-Origin` header, if any
    pub extended_origin: Option<String>,
    /// Verify response HMACs once a key has been issued
    pub anti_spoofing: bool,
    /// Application name used for authorization and credential storage
    pub app_name: String,
    /// Scopes to request; `None` means the full default catalogue
    pub scopes: Option<Vec<String>>,
    /// Advisory request timeout
    pub timeout_seconds: u64,
    /// Re-authorizations allowed per request
    pub max_auth_retries: u32,
    /// Liveness check period of the event socket
    pub monitor_interval_ms: u64,
    pub event_matching: EventMatching,
    /// File backing the credential store; in-memory when unset
    pub storage_path: Option<PathBuf>,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            ssl_enabled: false,
            api: DEFAULT_API.to_string(),
            uri_scheme_name: DEFAULT_API.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            extended_origin: None,
            anti_spoofing: false,
            app_name: DEFAULT_APP_NAME.to_string(),
            scopes: None,
            timeout_seconds: 60,
            max_auth_retries: 1,
            monitor_interval_ms: 1_000,
            event_matching: EventMatching::Exact,
            storage_path: None,
        }
    }
}

impl SdkConfig {
    /// Create a configuration pointing at `host:port`
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Create configuration from environment variables
    ///
    /// Recognised variables (all optional):
    /// - `{PREFIX}_HOST`, `{PREFIX}_PORT`, `{PREFIX}_SSL`, `{PREFIX}_API`
    /// - `{PREFIX}_ORIGIN`, `{PREFIX}_ANTI_SPOOFING`
    /// - `{PREFIX}_APP_NAME`, `{PREFIX}_SCOPES` (comma separated)
    /// - `{PREFIX}_STORAGE_PATH`
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let prefix = prefix.to_uppercase();
        let var = |name: &str| env::var(format!("{}_{}", prefix, name)).ok();
        let mut config = Self::default();

        if let Some(host) = var("HOST") {
            config.host = host;
        }
        if let Some(port) = var("PORT") {
            // Out-of-range ports keep the default.
            config.port = match port.parse::<i64>() {
                Ok(p) => u16::try_from(p).unwrap_or(DEFAULT_PORT),
                Err(_) => {
                    return Err(ConfigError::InvalidConfiguration(format!(
                        "{}_PORT is not a number: {}",
                        prefix, port
                    )))
                }
            };
        }
        if let Some(ssl) = var("SSL") {
            config.ssl_enabled = parse_flag(&prefix, "SSL", &ssl)?;
        }
        if let Some(api) = var("API") {
            config.api = api;
        }
        config.extended_origin = var("ORIGIN");
        if let Some(flag) = var("ANTI_SPOOFING") {
            config.anti_spoofing = parse_flag(&prefix, "ANTI_SPOOFING", &flag)?;
        }
        if let Some(name) = var("APP_NAME") {
            config.app_name = name;
        }
        if let Some(scopes) = var("SCOPES") {
            config.scopes = Some(
                scopes
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            );
        }
        config.storage_path = var("STORAGE_PATH").map(PathBuf::from);

        Ok(config)
    }

    /// Create configuration from `.env` file and environment variables
    #[cfg(feature = "env-file")]
    pub fn from_env_file(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_env_file_with_path(prefix, ".env")
    }

    /// Create configuration from a specific `.env` file path
    ///
    /// A missing file is not an error; the process environment is used as is.
    #[cfg(feature = "env-file")]
    pub fn from_env_file_with_path(prefix: &str, env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(_) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env(prefix)
    }

    #[must_use]
    pub fn ssl_enabled(mut self, enabled: bool) -> Self {
        self.ssl_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_api(mut self, api: impl Into<String>) -> Self {
        self.api = api.into();
        self
    }

    #[must_use]
    pub fn with_extended_origin(mut self, origin: impl Into<String>) -> Self {
        self.extended_origin = Some(origin.into());
        self
    }

    #[must_use]
    pub fn anti_spoofing(mut self, enabled: bool) -> Self {
        self.anti_spoofing = enabled;
        self
    }

    #[must_use]
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = Some(scopes);
        self
    }

    #[must_use]
    pub fn with_max_auth_retries(mut self, retries: u32) -> Self {
        self.max_auth_retries = retries;
        self
    }

    #[must_use]
    pub fn with_monitor_interval_ms(mut self, interval_ms: u64) -> Self {
        self.monitor_interval_ms = interval_ms;
        self
    }

    #[must_use]
    pub fn with_event_matching(mut self, matching: EventMatching) -> Self {
        self.event_matching = matching;
        self
    }

    #[must_use]
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// `http` or `https`
    pub fn http_scheme(&self) -> &'static str {
        if self.ssl_enabled {
            "https"
        } else {
            "http"
        }
    }

    /// `ws` or `wss`
    pub fn ws_scheme(&self) -> &'static str {
        if self.ssl_enabled {
            "wss"
        } else {
            "ws"
        }
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.http_scheme(), self.host, self.port)
    }
}

fn parse_flag(prefix: &str, name: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| {
        ConfigError::InvalidConfiguration(format!(
            "{}_{} must be true or false, got {}",
            prefix, name, value
        ))
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
