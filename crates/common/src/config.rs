//! Configuration management for queue clients and admin listeners.
//!
//! Settings are loaded from configuration files and environment variables.
//!
//! ## Example Configuration
//!
//! ```toml
//! namespace = "resque"
//! admin_channel = "admin"
//! check_connection = false
//!
//! [redis]
//! url = "redis://localhost:6379"
//! database = 0
//! connect_timeout_secs = 5
//!
//! [telemetry]
//! log_level = "info"
//! json_logging = false
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResqueConfig {
    #[serde(default)]
    pub redis: RedisConfig,

    /// Prefix of every Redis key
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Admin pub/sub channel, relative to the namespace
    #[serde(default = "default_admin_channel")]
    pub admin_channel: String,

    /// Issue a PING before every client operation
    #[serde(default)]
    pub check_connection: bool,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Logical database index
    #[serde(default)]
    pub database: u32,

    /// Password, if the server requires AUTH
    #[serde(default)]
    pub password: Option<String>,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging format
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,
}

// Default value functions
fn default_namespace() -> String {
    "resque".to_string()
}

fn default_admin_channel() -> String {
    "admin".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json_logging() -> bool {
    false
}

impl Default for ResqueConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            namespace: default_namespace(),
            admin_channel: default_admin_channel(),
            check_connection: false,
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            database: 0,
            password: None,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
        }
    }
}

impl ResqueConfig {
    /// Load configuration from configuration files and environment variables.
    ///
    /// Later sources override earlier ones:
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/{environment}.toml (if exists, where environment is from RESQUE_ENV)
    /// 4. Environment variables (prefixed with RESQUE_)
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use resque_common::config::ResqueConfig;
    ///
    /// let config = ResqueConfig::load().expect("Failed to load configuration");
    /// println!("Using namespace {}", config.namespace);
    /// ```
    pub fn load() -> Result<Self> {
        let env = std::env::var("RESQUE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            // Example: RESQUE_REDIS__URL=redis://cache:6379
            .add_source(
                config::Environment::with_prefix("RESQUE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let resque_config: ResqueConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        resque_config.validate()?;

        Ok(resque_config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            anyhow::bail!("Namespace must not be empty");
        }

        if self.admin_channel.is_empty() {
            anyhow::bail!("Admin channel must not be empty");
        }

        if self.redis.url.is_empty() {
            anyhow::bail!("Redis URL is required");
        }

        if !self.redis.url.starts_with("redis://") && !self.redis.url.starts_with("rediss://") {
            anyhow::bail!(
                "Redis URL '{}' must start with redis:// or rediss://",
                self.redis.url
            );
        }

        if self.redis.connect_timeout_secs == 0 {
            anyhow::bail!("Redis connect timeout must be greater than 0");
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "Invalid log level '{}'. Must be one of: {}",
                self.telemetry.log_level,
                valid_log_levels.join(", ")
            );
        }

        Ok(())
    }

    /// Get the connect timeout as a Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.connect_timeout_secs)
    }

    /// Create a development configuration with sensible defaults
    pub fn development() -> Self {
        Self {
            check_connection: true,
            telemetry: TelemetryConfig {
                log_level: "debug".to_string(),
                json_logging: false,
            },
            ..Self::default()
        }
    }
}

impl RedisConfig {
    /// Connection URL with the password and database folded in.
    ///
    /// Values already present in `url` win.
    pub fn connection_url(&self) -> String {
        let (scheme, rest) = self
            .url
            .split_once("://")
            .unwrap_or(("redis", self.url.as_str()));

        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, path),
            None => (rest, ""),
        };

        let authority = match &self.password {
            Some(password) if !authority.contains('@') => format!(":{}@{}", password, authority),
            _ => authority.to_string(),
        };

        let path = if path.is_empty() && self.database != 0 {
            self.database.to_string()
        } else {
            path.to_string()
        };

        if path.is_empty() {
            format!("{}://{}", scheme, authority)
        } else {
            format!("{}://{}/{}", scheme, authority, path)
        }
    }
}
