// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the opcgate binary.

use opcgate_core::ErrorKind;
use thiserror::Error;

/// Result type alias for opcgate-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that end an opcgate invocation.
///
/// Each maps to a process exit code through [`BinError::exit_code`].
#[derive(Debug, Error)]
pub enum BinError {
    /// Malformed command-line input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Output could not be rendered.
    #[error("Output error: {0}")]
    Output(String),

    /// Config parsing error.
    #[error("Config error: {0}")]
    Config(#[from] opcgate_config::ConfigError),

    /// Gateway error.
    #[error("Gateway error: {0}")]
    Gateway(#[from] opcgate_core::GatewayError),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        /// The context description.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates an invalid input error.
    pub fn input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Creates an output error.
    pub fn output(msg: impl Into<String>) -> Self {
        Self::Output(msg.into())
    }

    /// Adds context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Recovery hints of the innermost gateway error, if any.
    pub fn hints(&self) -> Vec<&'static str> {
        match self {
            Self::Gateway(err) => err.recovery_hints(),
            Self::WithContext { source, .. } => source.hints(),
            _ => Vec::new(),
        }
    }

    /// Process exit code.
    ///
    /// | code | meaning |
    /// |------|---------|
    /// | 1 | configuration |
    /// | 2 | bad arguments |
    /// | 3 | output rendering |
    /// | 5 | provider or connection failure |
    /// | 6 | timeout |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 1,
            Self::InvalidInput(_) => 2,
            Self::Output(_) => 3,
            Self::Gateway(err) => match err.kind() {
                ErrorKind::Configuration => 1,
                ErrorKind::InvalidArgument => 2,
                ErrorKind::NotConnected | ErrorKind::Provider => 5,
                ErrorKind::Timeout => 6,
            },
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }
}

impl From<serde_json::Error> for BinError {
    fn from(err: serde_json::Error) -> Self {
        Self::Output(err.to_string())
    }
}

impl From<serde_yaml::Error> for BinError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Output(err.to_string())
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Reports an error with its cause chain and, for gateway errors, hints.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }

    for hint in error.hints() {
        eprintln!("  Hint: {hint}");
    }
}

/// Reports an error and exits with the appropriate code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

// =============================================================================
// Tests
// =============================================================================
