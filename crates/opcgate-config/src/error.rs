// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration error types for opcgate-config.

use std::path::PathBuf;
use thiserror::Error;

/// Why a configuration could not be produced.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The named file does not exist.
    #[error("config file {} does not exist", .path.display())]
    NotFound {
        /// Requested path.
        path: PathBuf,
    },

    /// The file exists but reading it failed.
    #[error("cannot read config file {}: {source}", .path.display())]
    Read {
        /// Requested path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The extension names no supported format.
    #[error("cannot tell the format of {}: expected .yaml, .yml, .toml or .json", .path.display())]
    UnknownFormat {
        /// Requested path.
        path: PathBuf,
    },

    /// The document is malformed or does not fit the schema.
    #[error("invalid {format} in {origin}: {message}")]
    Syntax {
        /// Format name (`YAML`, `TOML`, `JSON`).
        format: &'static str,
        /// File path, or `<string>` for in-memory documents.
        origin: String,
        /// Parser message.
        message: String,
    },

    /// A setting has an unusable value.
    #[error("{field}: {message}")]
    Invalid {
        /// Dotted path of the setting, e.g. `gateway.port`.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// An environment override could not be applied.
    #[error("{name}={value:?}: {message}")]
    EnvOverride {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
        /// What is wrong with it.
        message: String,
    },
}

impl ConfigError {
    /// The file does not exist.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Reading the file failed.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// The extension is not recognised.
    pub fn unknown_format(path: impl Into<PathBuf>) -> Self {
        Self::UnknownFormat { path: path.into() }
    }

    /// The parser rejected the document.
    pub fn syntax(
        format: &'static str,
        origin: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Syntax {
            format,
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// A setting failed validation.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }

    /// An environment variable held an unusable value.
    pub fn env_override(
        name: &'static str,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::EnvOverride {
            name,
            value: value.into(),
            message: message.into(),
        }
    }

    /// Returns `true` when the file itself could not be opened.
    pub fn is_file_error(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Read { .. })
    }

    /// Short category name for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Read { .. } => "read",
            Self::UnknownFormat { .. } => "unknown_format",
            Self::Syntax { .. } => "syntax",
            Self::Invalid { .. } => "invalid",
            Self::EnvOverride { .. } => "env_override",
        }
    }
}

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
