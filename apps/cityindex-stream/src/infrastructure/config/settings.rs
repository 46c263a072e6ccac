//! Client Configuration Settings
//!
//! Configuration for the REST client and streaming layer, loaded from
//! environment variables.

use std::time::Duration;

use crate::application::services::{ReconnectConfig, StreamingOptions, TableOptions};

/// Trading API base URL, live environment.
pub const LIVE_API_URL: &str = "https://ciapi.cityindex.com/tradingapi/";
/// Trading API base URL, pre-production test environment.
pub const TEST_API_URL: &str = "https://ciapipreprod.cityindextest9.co.uk/tradingapi/";
/// Push server URL, live environment.
pub const LIVE_STREAM_URL: &str = "https://push.cityindex.com/lightstreamer/";
/// Push server URL, pre-production test environment.
pub const TEST_STREAM_URL: &str = "https://pushpreprod.cityindextest9.co.uk/lightstreamer/";

/// CityIndex environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Production.
    #[default]
    Live,
    /// Pre-production test servers.
    Test,
}

impl Environment {
    /// Parse environment from string.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "TEST" => Self::Test,
            _ => Self::Live,
        }
    }

    /// Check if this is the live environment.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    /// Get the environment name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Test => "test",
        }
    }

    /// Trading API base URL.
    #[must_use]
    pub const fn api_url(&self) -> &'static str {
        match self {
            Self::Live => LIVE_API_URL,
            Self::Test => TEST_API_URL,
        }
    }

    /// Push server URL.
    #[must_use]
    pub const fn stream_url(&self) -> &'static str {
        match self {
            Self::Live => LIVE_STREAM_URL,
            Self::Test => TEST_STREAM_URL,
        }
    }
}

/// Trading account credentials.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(username: String, password: String) -> Self {
        Self { username, password }
    }

    /// Get the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Get the password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// REST request throttling.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitSettings {
    /// Burst size.
    pub capacity: u32,
    /// Tokens refilled per second.
    pub per_second: f64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            capacity: 10,
            per_second: 10.0,
        }
    }
}

impl RateLimitSettings {
    /// Check that the bucket can hold a token and refills at a finite,
    /// positive rate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the offending variable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CITYINDEX_RATE_LIMIT_CAPACITY".to_string(),
                value: self.capacity.to_string(),
            });
        }
        if !self.per_second.is_finite() || self.per_second <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "CITYINDEX_RATE_LIMIT_PER_SEC".to_string(),
                value: self.per_second.to_string(),
            });
        }
        Ok(())
    }
}

/// Streaming connection settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Reconnection attempts with growing delays; afterwards retries
    /// continue at `reconnect_delay_max` (0 = grow until the cap).
    pub max_reconnect_attempts: u32,
    /// Request an initial snapshot when a table is created.
    pub request_snapshot: bool,
}

impl Default for StreamSettings {
    fn default() -> Self {
        let reconnect = ReconnectConfig::default();
        Self {
            reconnect_delay_initial: reconnect.initial_delay,
            reconnect_delay_max: reconnect.max_delay,
            reconnect_delay_multiplier: reconnect.multiplier,
            max_reconnect_attempts: reconnect.max_attempts,
            request_snapshot: true,
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Target environment.
    pub environment: Environment,
    /// Login credentials.
    pub credentials: Credentials,
    /// REST request timeout.
    pub http_timeout: Duration,
    /// REST throttling.
    pub rate_limit: RateLimitSettings,
    /// Streaming settings.
    pub stream: StreamSettings,
}

impl ClientConfig {
    /// Configuration with defaults for everything but the credentials.
    #[must_use]
    pub fn new(environment: Environment, credentials: Credentials) -> Self {
        Self {
            environment,
            credentials,
            http_timeout: Duration::from_secs(30),
            rate_limit: RateLimitSettings::default(),
            stream: StreamSettings::default(),
        }
    }

    /// Create configuration from environment variables, reading a `.env`
    /// file first when one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or
    /// the rate limit settings are out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is the normal case in deployments.
        let _ = dotenvy::dotenv();

        let username = std::env::var("CITYINDEX_USERNAME")
            .map_err(|_| ConfigError::MissingEnvVar("CITYINDEX_USERNAME".to_string()))?;

        let password = std::env::var("CITYINDEX_PASSWORD")
            .map_err(|_| ConfigError::MissingEnvVar("CITYINDEX_PASSWORD".to_string()))?;

        if username.is_empty() {
            return Err(ConfigError::EmptyValue("CITYINDEX_USERNAME".to_string()));
        }

        if password.is_empty() {
            return Err(ConfigError::EmptyValue("CITYINDEX_PASSWORD".to_string()));
        }

        let environment = std::env::var("CITYINDEX_ENV")
            .map(|s| Environment::from_str_case_insensitive(&s))
            .unwrap_or_default();

        let mut config = Self::new(environment, Credentials::new(username, password));

        config.http_timeout =
            parse_env_duration_secs("CITYINDEX_HTTP_TIMEOUT_SECS", config.http_timeout);

        config.rate_limit = RateLimitSettings {
            capacity: parse_env_u32(
                "CITYINDEX_RATE_LIMIT_CAPACITY",
                RateLimitSettings::default().capacity,
            ),
            per_second: parse_env_f64(
                "CITYINDEX_RATE_LIMIT_PER_SEC",
                RateLimitSettings::default().per_second,
            ),
        };
        config.rate_limit.validate()?;

        config.stream = StreamSettings {
            reconnect_delay_initial: parse_env_duration_millis(
                "CITYINDEX_RECONNECT_DELAY_INITIAL_MS",
                StreamSettings::default().reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_secs(
                "CITYINDEX_RECONNECT_DELAY_MAX_SECS",
                StreamSettings::default().reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_env_f64(
                "CITYINDEX_RECONNECT_DELAY_MULTIPLIER",
                StreamSettings::default().reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: parse_env_u32(
                "CITYINDEX_MAX_RECONNECT_ATTEMPTS",
                StreamSettings::default().max_reconnect_attempts,
            ),
            request_snapshot: parse_env_bool(
                "CITYINDEX_REQUEST_SNAPSHOT",
                StreamSettings::default().request_snapshot,
            ),
        };

        Ok(config)
    }

    /// Trading API base URL.
    #[must_use]
    pub const fn api_url(&self) -> &'static str {
        self.environment.api_url()
    }

    /// Push server URL.
    #[must_use]
    pub const fn stream_url(&self) -> &'static str {
        self.environment.stream_url()
    }

    /// Options for [`crate::application::services::StreamingClient::start`].
    #[must_use]
    pub fn streaming_options(&self) -> StreamingOptions {
        StreamingOptions {
            reconnect: ReconnectConfig {
                initial_delay: self.stream.reconnect_delay_initial,
                max_delay: self.stream.reconnect_delay_max,
                multiplier: self.stream.reconnect_delay_multiplier,
                max_attempts: self.stream.max_reconnect_attempts,
                ..ReconnectConfig::default()
            },
            table: TableOptions {
                snapshot: self.stream.request_snapshot,
                ..TableOptions::default()
            },
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable parsed but is out of range.
    #[error("environment variable {key} has invalid value {value}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| match v.to_lowercase().as_str() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
