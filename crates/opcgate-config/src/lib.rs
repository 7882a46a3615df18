// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # opcgate-config
//!
//! Configuration management for the opcgate session gateway.
//!
//! ## Features
//!
//! - **Schema Definition**: provider, defaults, gateway and logging sections
//! - **Multi-Format Support**: YAML, TOML and JSON configuration files
//! - **Environment Overrides**: the `OPC_*` variables recognised by OPC clients
//! - **Placeholders**: `${VAR}` and `${VAR:default}` inside config files
//!
//! ## Quick Start
//!
//! ```no_run
//! use opcgate_config::loader::load_config;
//!
//! let config = load_config("opcgate.yaml").unwrap();
//! let settings = config.session_settings();
//! println!("Servers: {}", settings.server);
//! ```
//!
//! ## Example File
//!
//! ```yaml
//! provider:
//!   server: "${PLANT_SERVER:Matrikon.OPC.Simulation}"
//!   client_name: Line3
//! defaults:
//!   read:
//!     size: 200
//!     source: hybrid
//! gateway:
//!   port: 7766
//! logging:
//!   level: info
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod loader;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigFormat, ConfigLoader, EnvLookup};
pub use schema::{
    DefaultsConfig, GatewayConfig, LogFormat, LogLevel, LoggingConfig, OpcGateConfig,
    ProviderConfig, ReadDefaults, WriteDefaults,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
