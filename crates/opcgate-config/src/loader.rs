// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading for opcgate.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and pick the parser from its extension
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders
//! 3. Parse YAML, TOML or JSON into [`OpcGateConfig`]
//! 4. Apply environment overrides
//! 5. Validate
//!
//! # Environment Overrides
//!
//! ```text
//! OPC_CLASS=Matrikon.OPC.Automation
//! OPC_SERVER=Matrikon.OPC.Simulation
//! OPC_HOST=plant-historian
//! OPC_CLIENT=Line3
//! OPC_GATE_HOST=0.0.0.0
//! OPC_GATE_PORT=7766
//! OPCGATE_LOG_LEVEL=debug
//! ```

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{LogLevel, OpcGateConfig};

/// Overrides the provider class list.
pub const ENV_CLASS: &str = "OPC_CLASS";
/// Overrides the server list.
pub const ENV_SERVER: &str = "OPC_SERVER";
/// Overrides the provider host.
pub const ENV_HOST: &str = "OPC_HOST";
/// Overrides the client name.
pub const ENV_CLIENT: &str = "OPC_CLIENT";
/// Overrides the gateway bind address.
pub const ENV_GATE_HOST: &str = "OPC_GATE_HOST";
/// Overrides the gateway port.
pub const ENV_GATE_PORT: &str = "OPC_GATE_PORT";
/// Overrides the log level.
pub const ENV_LOG_LEVEL: &str = "OPCGATE_LOG_LEVEL";

/// Environment lookup used for placeholders and overrides.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

fn process_env() -> EnvLookup {
    Arc::new(|name: &str| std::env::var(name).ok())
}

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader for opcgate.
///
/// # Examples
///
/// ```
/// use opcgate_config::loader::{ConfigFormat, ConfigLoader};
///
/// let loader = ConfigLoader::new().with_env(|name| match name {
///     "OPC_SERVER" => Some("Matrikon.OPC.Simulation".to_string()),
///     _ => None,
/// });
/// let config = loader.load_from_str("gateway:\n  port: 9000\n", ConfigFormat::Yaml).unwrap();
/// assert_eq!(config.provider.server, "Matrikon.OPC.Simulation");
/// assert_eq!(config.gateway.port, 9000);
/// ```
#[derive(Clone)]
pub struct ConfigLoader {
    /// Whether placeholders and overrides are applied.
    resolve_env_vars: bool,

    /// Environment lookup.
    env: EnvLookup,
}

impl ConfigLoader {
    /// Creates a loader reading the process environment.
    pub fn new() -> Self {
        Self {
            resolve_env_vars: true,
            env: process_env(),
        }
    }

    /// Enables or disables placeholders and environment overrides.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Replaces the environment lookup.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(lookup);
        self
    }

    /// Loads configuration from a file.
    ///
    /// The format is determined by the extension: `.yaml`/`.yml`, `.toml`
    /// or `.json`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<OpcGateConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::not_found(path));
        }
        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;

        let config = self.process(&content, format, &path.display().to_string())?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<OpcGateConfig> {
        self.process(content, format, "<string>")
    }

    /// Built-in defaults with environment overrides applied.
    pub fn defaults(&self) -> ConfigResult<OpcGateConfig> {
        let mut config = OpcGateConfig::default();
        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn process(
        &self,
        content: &str,
        format: ConfigFormat,
        origin: &str,
    ) -> ConfigResult<OpcGateConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        let mut config = format.parse(&content, origin)?;
        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        config.validate()?;
        debug!(
            server = %config.provider.server,
            class = %config.provider.class,
            port = config.gateway.port,
            "Configuration resolved"
        );
        Ok(config)
    }

    /// Resolves `${VAR_NAME}` and `${VAR_NAME:default}` placeholders.
    ///
    /// Unknown variables without a default are left in place.
    fn resolve_env_placeholders(&self, content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut rest = content;

        while let Some(start) = rest.find("${") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                result.push_str(&rest[start..]);
                return result;
            };

            let body = &after[..end];
            let (name, default) = match body.split_once(':') {
                Some((name, default)) => (name, Some(default)),
                None => (body, None),
            };

            match ((self.env)(name), default) {
                (Some(value), _) => result.push_str(&value),
                (None, Some(default)) => result.push_str(default),
                (None, None) => {
                    warn!("Environment variable '{}' not found", name);
                    result.push_str(&rest[start..start + 2 + end + 1]);
                }
            }
            rest = &after[end + 1..];
        }

        result.push_str(rest);
        result
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&self, config: &mut OpcGateConfig) -> ConfigResult<()> {
        let env = &self.env;

        if let Some(value) = env(ENV_CLASS) {
            config.provider.class = value;
        }
        if let Some(value) = env(ENV_SERVER) {
            config.provider.server = value;
        }
        if let Some(value) = env(ENV_HOST) {
            config.provider.host = value;
        }
        if let Some(value) = env(ENV_CLIENT) {
            config.provider.client_name = value;
        }
        if let Some(value) = env(ENV_GATE_HOST) {
            config.gateway.bind_host = value;
        }
        if let Some(value) = env(ENV_GATE_PORT) {
            config.gateway.port = value.trim().parse().map_err(|_| {
                ConfigError::env_override(ENV_GATE_PORT, value.clone(), "expected a port number")
            })?;
        }
        if let Some(value) = env(ENV_LOG_LEVEL) {
            config.logging.level = value.parse::<LogLevel>().map_err(|_| {
                ConfigError::env_override(
                    ENV_LOG_LEVEL,
                    value.clone(),
                    "expected trace, debug, info, warn or error",
                )
            })?;
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("resolve_env_vars", &self.resolve_env_vars)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            _ => Err(ConfigError::unknown_format(path)),
        }
    }

    /// Display name of the format.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "YAML",
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Json => "JSON",
        }
    }

    /// Deserializes `content`; `origin` names it in error messages.
    fn parse(self, content: &str, origin: &str) -> ConfigResult<OpcGateConfig> {
        let syntax = |message: String| ConfigError::syntax(self.name(), origin, message);
        match self {
            // An empty YAML document is `null`, not an empty mapping.
            ConfigFormat::Yaml if content.trim().is_empty() => Ok(OpcGateConfig::default()),
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| syntax(e.to_string())),
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| syntax(e.to_string())),
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| syntax(e.to_string())),
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<OpcGateConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<OpcGateConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::LogFormat;
    use opcgate_core::types::ReadSource;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn loader(pairs: &[(&str, &str)]) -> ConfigLoader {
        ConfigLoader::new().with_env(env_of(pairs))
    }

    const YAML: &str = r#"
provider:
  server: "Matrikon.OPC.Simulation;Prosys.OPC.Simulation"
  client_name: Line3

defaults:
  read:
    size: 100
    source: device
    timeout_ms: 2500
  write:
    include_error: true

gateway:
  port: 7800
  max_sessions: 16

logging:
  level: debug
  format: json
"#;

    #[test]
    fn test_load_yaml() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = loader(&[]).load(file.path()).unwrap();
        assert_eq!(
            config.provider.server,
            "Matrikon.OPC.Simulation;Prosys.OPC.Simulation"
        );
        assert_eq!(config.provider.client_name, "Line3");
        assert_eq!(config.provider.host, "localhost");
        assert_eq!(config.defaults.read.size, Some(100));
        assert_eq!(config.defaults.read.source, ReadSource::Device);
        assert_eq!(config.defaults.read.timeout_ms, 2500);
        assert!(config.defaults.write.include_error);
        assert_eq!(config.gateway.port, 7800);
        assert_eq!(config.gateway.max_sessions, Some(16));
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
[provider]
class = "Matrikon.OPC.Automation"

[defaults.read]
sync = true
pause_ms = 50
"#;
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        let config = loader(&[]).load(file.path()).unwrap();
        assert_eq!(config.provider.class, "Matrikon.OPC.Automation");
        assert!(config.defaults.read.sync);
        assert_eq!(config.defaults.read.pause_ms, 50);
    }

    #[test]
    fn test_load_json() {
        let json = r#"{"gateway": {"bind_host": "0.0.0.0"}}"#;
        let config = loader(&[]).load_from_str(json, ConfigFormat::Json).unwrap();
        assert_eq!(config.gateway.bind_host, "0.0.0.0");
        assert_eq!(config.gateway.port, 7766);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = loader(&[]).load_from_str("", ConfigFormat::Yaml).unwrap();
        assert_eq!(config, OpcGateConfig::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(b"provider:\n  servers: X\n").unwrap();

        let err = loader(&[]).load(file.path()).unwrap_err();
        match err {
            ConfigError::Syntax { format, origin, .. } => {
                assert_eq!(format, "YAML");
                assert_eq!(origin, file.path().display().to_string());
            }
            other => panic!("Expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("opcgate.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("opcgate.TOML")).unwrap(),
            ConfigFormat::Toml
        );
        assert!(ConfigFormat::from_path(Path::new("opcgate.ini")).is_err());
        assert!(ConfigFormat::from_path(Path::new("opcgate")).is_err());
    }

    #[test]
    fn test_env_placeholder_resolution() {
        let loader = loader(&[("PLANT_SERVER", "KEPware.KEPServerEx.V4")]);
        assert_eq!(
            loader.resolve_env_placeholders("server: ${PLANT_SERVER}"),
            "server: KEPware.KEPServerEx.V4"
        );
        assert_eq!(
            loader.resolve_env_placeholders("host: ${PLANT_HOST:historian}"),
            "host: historian"
        );
        assert_eq!(
            loader.resolve_env_placeholders("a: ${MISSING} b: ${UNCLOSED"),
            "a: ${MISSING} b: ${UNCLOSED"
        );
    }

    #[test]
    fn test_env_overrides() {
        let loader = loader(&[
            ("OPC_SERVER", "Matrikon.OPC.Simulation"),
            ("OPC_CLASS", "Graybox.OPC.DAWrapper"),
            ("OPC_HOST", "opc-box"),
            ("OPC_CLIENT", "Historian"),
            ("OPC_GATE_HOST", "0.0.0.0"),
            ("OPC_GATE_PORT", "7900"),
            ("OPCGATE_LOG_LEVEL", "trace"),
        ]);
        let config = loader.load_from_str(YAML, ConfigFormat::Yaml).unwrap();

        assert_eq!(config.provider.server, "Matrikon.OPC.Simulation");
        assert_eq!(config.provider.class, "Graybox.OPC.DAWrapper");
        assert_eq!(config.provider.host, "opc-box");
        assert_eq!(config.provider.client_name, "Historian");
        assert_eq!(config.gateway.bind_host, "0.0.0.0");
        assert_eq!(config.gateway.port, 7900);
        assert_eq!(config.logging.level, LogLevel::Trace);
    }

    #[test]
    fn test_env_override_invalid_port() {
        let err = loader(&[("OPC_GATE_PORT", "many")])
            .load_from_str("", ConfigFormat::Yaml)
            .unwrap_err();
        assert!(matches!(err, ConfigError::EnvOverride { name: "OPC_GATE_PORT", ref value, .. } if value == "many"));
    }

    #[test]
    fn test_env_vars_disabled() {
        let config = loader(&[("OPC_SERVER", "Matrikon.OPC.Simulation")])
            .with_env_vars(false)
            .load_from_str("", ConfigFormat::Yaml)
            .unwrap();
        assert_eq!(config.provider.server, OpcGateConfig::default().provider.server);
    }

    #[test]
    fn test_defaults_with_overrides() {
        let config = loader(&[("OPC_SERVER", "Matrikon.OPC.Simulation")])
            .defaults()
            .unwrap();
        assert_eq!(config.provider.server, "Matrikon.OPC.Simulation");

        let err = loader(&[("OPC_SERVER", ";")]).defaults().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_file_not_found() {
        let result = loader(&[]).load("/nonexistent/path/opcgate.yaml");
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_json_syntax_error_names_origin() {
        let err = loader(&[])
            .load_from_str("{\"gateway\": ", ConfigFormat::Json)
            .unwrap_err();
        assert_eq!(err.category(), "syntax");
        assert!(err.to_string().starts_with("invalid JSON in <string>: "));
    }
}
