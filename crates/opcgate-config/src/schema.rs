// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for opcgate.
//!
//! # Schema Structure
//!
//! ```text
//! OpcGateConfig
//! ├── provider: ProviderConfig     (class / server lists, host, client name)
//! ├── defaults: DefaultsConfig
//! │   ├── read:  ReadDefaults
//! │   └── write: WriteDefaults
//! ├── gateway: GatewayConfig       (remote session service)
//! └── logging: LoggingConfig
//! ```
//!
//! Every section is optional; an empty file yields the built-in defaults.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use opcgate_core::read::{ReadOptions, DEFAULT_READ_TIMEOUT, DEFAULT_UPDATE_RATE};
use opcgate_core::settings::{
    split_list, DEFAULT_CLASSES, DEFAULT_CLIENT_NAME, DEFAULT_GATEWAY_PORT, DEFAULT_HOST,
    DEFAULT_SERVERS,
};
use opcgate_core::types::ReadSource;
use opcgate_core::write::WriteOptions;
use opcgate_core::SessionSettings;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration structure for opcgate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpcGateConfig {
    /// Provider selection and connection defaults.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Default read and write options.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Remote session service.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl OpcGateConfig {
    /// Validates the entire configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.provider.validate()?;
        self.defaults.validate()?;
        self.gateway.validate()?;
        Ok(())
    }

    /// Settings new sessions are opened with.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings::default()
            .with_class(self.provider.class.clone())
            .with_server(self.provider.server.clone())
            .with_host(self.provider.host.clone())
            .with_client_name(self.provider.client_name.clone())
            .with_read_defaults(self.defaults.read.to_options())
            .with_write_defaults(self.defaults.write.to_options())
    }
}

// =============================================================================
// Provider Configuration
// =============================================================================

/// Provider classes and servers tried when a session opens and connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Semicolon-separated provider class names, tried in order.
    #[serde(default = "default_class")]
    pub class: String,

    /// Semicolon-separated server names, tried in order.
    #[serde(default = "default_server")]
    pub server: String,

    /// Host the servers run on.
    #[serde(default = "default_host")]
    pub host: String,

    /// Client name announced after connecting.
    #[serde(default = "default_client_name")]
    pub client_name: String,
}

fn default_class() -> String {
    DEFAULT_CLASSES.to_string()
}

fn default_server() -> String {
    DEFAULT_SERVERS.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_client_name() -> String {
    DEFAULT_CLIENT_NAME.to_string()
}

impl ProviderConfig {
    /// Validates the provider configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if split_list(&self.class).is_empty() {
            return Err(ConfigError::invalid(
                "provider.class",
                "at least one provider class is required",
            ));
        }
        if split_list(&self.server).is_empty() {
            return Err(ConfigError::invalid(
                "provider.server",
                "at least one server name is required",
            ));
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::invalid("provider.host", "must not be empty"));
        }
        Ok(())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            class: default_class(),
            server: default_server(),
            host: default_host(),
            client_name: default_client_name(),
        }
    }
}

// =============================================================================
// Defaults Configuration
// =============================================================================

/// Default options for calls that do not pass their own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    /// Read defaults.
    #[serde(default)]
    pub read: ReadDefaults,

    /// Write defaults.
    #[serde(default)]
    pub write: WriteDefaults,
}

impl DefaultsConfig {
    /// Validates the defaults.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.read.size == Some(0) {
            return Err(ConfigError::invalid(
                "defaults.read.size",
                "must be greater than 0",
            ));
        }
        if self.read.timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "defaults.read.timeout_ms",
                "must be greater than 0",
            ));
        }
        if self.write.size == Some(0) {
            return Err(ConfigError::invalid(
                "defaults.write.size",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Default read options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadDefaults {
    /// Maximum tags per sub-group.
    #[serde(default)]
    pub size: Option<usize>,

    /// Pause between sub-groups in milliseconds.
    #[serde(default)]
    pub pause_ms: u64,

    /// Source policy.
    #[serde(default)]
    pub source: ReadSource,

    /// Update rate for new subscriptions.
    #[serde(default = "default_update_rate")]
    pub update_rate: i32,

    /// Asynchronous wait in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Read synchronously.
    #[serde(default)]
    pub sync: bool,

    /// Attach provider messages to results.
    #[serde(default)]
    pub include_error: bool,
}

fn default_update_rate() -> i32 {
    DEFAULT_UPDATE_RATE
}

fn default_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT.as_millis() as u64
}

impl ReadDefaults {
    /// Converts to read options.
    pub fn to_options(&self) -> ReadOptions {
        let mut options = ReadOptions::new()
            .pause(Duration::from_millis(self.pause_ms))
            .source(self.source)
            .update_rate(self.update_rate)
            .timeout(Duration::from_millis(self.timeout_ms))
            .sync(self.sync)
            .include_error(self.include_error);
        options.size = self.size;
        options
    }
}

impl Default for ReadDefaults {
    fn default() -> Self {
        Self {
            size: None,
            pause_ms: 0,
            source: ReadSource::default(),
            update_rate: default_update_rate(),
            timeout_ms: default_timeout_ms(),
            sync: false,
            include_error: false,
        }
    }
}

/// Default write options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteDefaults {
    /// Maximum pairs per chunk.
    #[serde(default)]
    pub size: Option<usize>,

    /// Pause between chunks in milliseconds.
    #[serde(default)]
    pub pause_ms: u64,

    /// Attach provider messages to results.
    #[serde(default)]
    pub include_error: bool,
}

impl WriteDefaults {
    /// Converts to write options.
    pub fn to_options(&self) -> WriteOptions {
        let mut options = WriteOptions::new()
            .pause(Duration::from_millis(self.pause_ms))
            .include_error(self.include_error);
        options.size = self.size;
        options
    }
}

// =============================================================================
// Gateway Configuration
// =============================================================================

/// Remote session service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Address the service binds to.
    #[serde(default = "default_host")]
    pub bind_host: String,

    /// Port the service listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum number of concurrent sessions.
    #[serde(default)]
    pub max_sessions: Option<usize>,
}

fn default_port() -> u16 {
    DEFAULT_GATEWAY_PORT
}

impl GatewayConfig {
    /// Validates the gateway configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.port == 0 {
            return Err(ConfigError::invalid("gateway.port", "must not be 0"));
        }
        if self.max_sessions == Some(0) {
            return Err(ConfigError::invalid(
                "gateway.max_sessions",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_host: default_host(),
            port: default_port(),
            max_sessions: None,
        }
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(ConfigError::invalid(
                "logging.level",
                format!("unknown level '{other}'"),
            )),
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Compact single-line text.
    Compact,
    /// JSON lines.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_core_constants() {
        let config = OpcGateConfig::default();
        assert_eq!(config.provider.client_name, "OpenOPC");
        assert_eq!(config.provider.host, "localhost");
        assert_eq!(config.gateway.port, 7766);
        assert_eq!(config.defaults.read.timeout_ms, 5000);
        assert_eq!(config.defaults.read.update_rate, -1);
        assert_eq!(config.defaults.read.source, ReadSource::Hybrid);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_lists() {
        let mut config = OpcGateConfig::default();
        config.provider.server = " ; ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("provider.server"));

        let mut config = OpcGateConfig::default();
        config.provider.class = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = OpcGateConfig::default();
        config.gateway.port = 0;
        assert!(config.validate().is_err());

        let mut config = OpcGateConfig::default();
        config.defaults.read.size = Some(0);
        assert!(config.validate().is_err());

        let mut config = OpcGateConfig::default();
        config.defaults.read.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_settings() {
        let mut config = OpcGateConfig::default();
        config.provider.server = "Matrikon.OPC.Simulation".to_string();
        config.defaults.read.sync = true;
        config.defaults.read.size = Some(50);
        config.defaults.write.include_error = true;

        let settings = config.session_settings();
        assert_eq!(settings.server, "Matrikon.OPC.Simulation");
        assert!(settings.read_defaults.sync);
        assert_eq!(settings.read_defaults.size, Some(50));
        assert_eq!(settings.read_defaults.timeout, Duration::from_secs(5));
        assert!(settings.write_defaults.include_error);
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
