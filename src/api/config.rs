use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::data_classifier::MaskOptions;
use crate::document::FallbackEncoding;

/// Prefix of environment overrides, e.g. `PII_MASKER__SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "PII_MASKER";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub masking: MaskingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Time allowed for one analyze or mask request
    pub request_timeout_secs: u64,

    /// Largest accepted JSON body; uploads travel base64-encoded inside it
    pub max_payload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            max_payload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for log files
    pub dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: "logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskingConfig {
    /// Encoding tried for text uploads that are not UTF-8
    pub fallback_encoding: FallbackEncoding,

    /// Category switches used when a request carries none
    pub defaults: MaskOptions,
}

impl AppConfig {
    /// Loads configuration from an optional file plus environment overrides.
    ///
    /// # Arguments
    /// * `path` - Optional TOML, YAML or JSON file; its extension picks the format
    ///
    /// # Returns
    /// * `Result<AppConfig>` - Defaults overlaid with the file, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

        let config: AppConfig = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        Ok(config)
    }

    /// One-line description for the startup log. Loading runs before the
    /// logger exists, so callers log this once it is installed.
    pub fn summary(&self) -> String {
        format!(
            "{}:{}, timeout {}s, payload limit {} bytes, logs in {}",
            self.server.host,
            self.server.port,
            self.server.request_timeout_secs,
            self.server.max_payload_bytes,
            self.logging.dir
        )
    }
}
