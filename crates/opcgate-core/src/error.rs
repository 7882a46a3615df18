// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Gateway error types with diagnostics.
//!
//! Errors raised by a session fall into a small set of kinds. Provider
//! failures always carry the name of the provider operation that failed, so
//! the rendered message reads `"<Operation>: <message>"` (for example
//! `"Connect: Cannot connect to any of the servers in the OPC_SERVER list"`).
//!
//! # Error Kinds
//!
//! ```text
//! GatewayError
//! ├── InvalidArgument - Malformed call arguments (tags, write pairs, groups)
//! ├── Provider        - A provider operation failed ("<Operation>: <message>")
//! ├── Timeout         - No matching data-change arrived before the deadline
//! ├── NotConnected    - The session has no live provider connection
//! └── Configuration   - Invalid settings handed to a session or gateway
//! ```
//!
//! Errors that must cross a process boundary are flattened into a
//! [`WireError`], which is plain serde data.
//!
//! # Examples
//!
//! ```
//! use opcgate_core::error::{GatewayError, ProviderFault};
//!
//! let fault = ProviderFault::new(-2147221005).with_platform_message("Invalid class string");
//! let error = GatewayError::provider_fault("Dispatch", &fault);
//! assert_eq!(error.to_string(), "Dispatch: Invalid class string");
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;

/// Result alias used across the gateway.
pub type GatewayResult<T> = Result<T, GatewayError>;

// =============================================================================
// GatewayError - Main Error Type
// =============================================================================

/// The main error type for gateway operations.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// A call argument has the wrong shape.
    #[error("{message}")]
    InvalidArgument {
        /// Message naming the offending parameter.
        message: String,
    },

    /// A provider operation failed.
    #[error("{operation}: {message}")]
    Provider {
        /// Name of the provider operation (`Connect`, `AddGroup`, ...).
        operation: String,
        /// Combined, newline-stripped failure message.
        message: String,
        /// Numeric provider code, when one was reported.
        code: Option<i32>,
    },

    /// The asynchronous data-change for a refresh did not arrive in time.
    #[error("{operation}: Timeout waiting for data")]
    Timeout {
        /// The operation that was waiting.
        operation: String,
        /// How long it waited.
        duration: Duration,
    },

    /// The session is not connected to a provider.
    #[error("Not connected to a data provider")]
    NotConnected,

    /// Invalid configuration.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message.
        message: String,
    },
}

impl GatewayError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a provider error from a plain message.
    pub fn provider(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            operation: operation.into(),
            message: strip_newlines(&message.into()),
            code: None,
        }
    }

    /// Creates a provider error from a provider fault.
    pub fn provider_fault(operation: impl Into<String>, fault: &ProviderFault) -> Self {
        Self::Provider {
            operation: operation.into(),
            message: fault.describe(),
            code: Some(fault.code),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::Provider { .. } => ErrorKind::Provider,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::NotConnected => ErrorKind::NotConnected,
            Self::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    /// Returns the provider operation name for provider and timeout errors.
    pub fn operation(&self) -> Option<&str> {
        match self {
            Self::Provider { operation, .. } | Self::Timeout { operation, .. } => {
                Some(operation.as_str())
            }
            _ => None,
        }
    }

    /// Returns `true` if repeating the call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::NotConnected)
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidArgument { .. } => ErrorSeverity::Warning,
            Self::Provider { .. } => ErrorSeverity::Error,
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::NotConnected => ErrorSeverity::Warning,
            Self::Configuration { .. } => ErrorSeverity::Critical,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Returns a structured error code.
    pub fn error_code(&self) -> ErrorCode {
        let category = self.kind().code();
        let code = match self {
            Self::Provider { operation, .. } | Self::Timeout { operation, .. } => {
                Operation::from_name(operation).map_or(0, |op| op.code())
            }
            _ => 1,
        };
        ErrorCode::new(category, code)
    }

    /// Returns recovery hints for this error.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::InvalidArgument { .. } => vec![
                "Pass tags as a string or a list of strings",
                "Pass writes as a [tag, value] pair or a list of pairs",
            ],
            Self::Provider { .. } => vec![
                "Check that the data server is running",
                "Verify the server name and host",
            ],
            Self::Timeout { .. } => vec![
                "Increase the read timeout",
                "Use a synchronous read",
            ],
            Self::NotConnected => vec!["Call connect() before reading or writing"],
            Self::Configuration { .. } => vec!["Review the configuration file"],
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let code = self.error_code();

        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }

    /// Flattens this error into its serializable form.
    pub fn to_wire(&self) -> WireError {
        WireError {
            kind: self.kind(),
            code: self.error_code().to_string(),
            message: self.to_string(),
        }
    }
}

// =============================================================================
// ProviderFault
// =============================================================================

/// A failure reported by a data provider.
///
/// Providers report failures with a numeric code and up to two descriptive
/// strings: one from the provider itself and one from the hosting platform.
/// [`ProviderFault::describe`] combines them into a single message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{}", self.describe())]
pub struct ProviderFault {
    /// Numeric status code.
    pub code: i32,
    /// Message from the provider, if any.
    pub provider_message: Option<String>,
    /// Message from the hosting platform, if any.
    pub platform_message: Option<String>,
}

impl ProviderFault {
    /// Creates a fault with no descriptive strings.
    pub fn new(code: i32) -> Self {
        Self {
            code,
            provider_message: None,
            platform_message: None,
        }
    }

    /// Sets the provider message.
    pub fn with_provider_message(mut self, message: impl Into<String>) -> Self {
        self.provider_message = Some(message.into());
        self
    }

    /// Sets the platform message.
    pub fn with_platform_message(mut self, message: impl Into<String>) -> Self {
        self.platform_message = Some(message.into());
        self
    }

    /// Combines the fault into one newline-free message.
    ///
    /// | provider | platform | result                       |
    /// |----------|----------|------------------------------|
    /// | none     | none     | the numeric code             |
    /// | `a`      | `a`      | `a`                          |
    /// | `a`      | none     | `a`                          |
    /// | none     | `b`      | `b`                          |
    /// | `a`      | `b`      | `a (b)`                      |
    pub fn describe(&self) -> String {
        let provider = non_empty(self.provider_message.as_deref());
        let platform = non_empty(self.platform_message.as_deref());

        let combined = match (provider, platform) {
            (None, None) => self.code.to_string(),
            (Some(a), Some(b)) if a == b => a.to_string(),
            (Some(a), None) => a.to_string(),
            (None, Some(b)) => b.to_string(),
            (Some(a), Some(b)) => format!("{a} ({b})"),
        };

        strip_newlines(&combined)
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

/// Removes carriage returns and line feeds from a provider message.
pub fn strip_newlines(message: &str) -> String {
    message.replace(['\r', '\n'], "")
}

// =============================================================================
// Operation
// =============================================================================

/// Provider operations, used for error prefixes, trace labels and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Instantiating a provider for a class.
    Dispatch,
    /// Connecting to a server.
    Connect,
    /// Disconnecting from a server.
    Disconnect,
    /// Validating item identifiers.
    Validate,
    /// Creating a subscription group.
    AddGroup,
    /// Adding items to a subscription.
    AddItems,
    /// Removing items from a subscription.
    RemoveItems,
    /// Synchronous read.
    SyncRead,
    /// Asynchronous refresh.
    AsyncRefresh,
    /// Synchronous write.
    SyncWrite,
    /// Attaching an event hook.
    WithEvents,
    /// Detaching an event hook.
    CloseEvents,
    /// Removing a subscription group.
    RemoveGroup,
    /// Waiting for a data-change callback.
    Callback,
    /// Asking the server for its clock.
    Ping,
}

impl Operation {
    /// Every operation, in code order.
    pub const ALL: [Operation; 15] = [
        Self::Dispatch,
        Self::Connect,
        Self::Disconnect,
        Self::Validate,
        Self::AddGroup,
        Self::AddItems,
        Self::RemoveItems,
        Self::SyncRead,
        Self::AsyncRefresh,
        Self::SyncWrite,
        Self::WithEvents,
        Self::CloseEvents,
        Self::RemoveGroup,
        Self::Callback,
        Self::Ping,
    ];

    /// Returns the operation name used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dispatch => "Dispatch",
            Self::Connect => "Connect",
            Self::Disconnect => "Disconnect",
            Self::Validate => "Validate",
            Self::AddGroup => "AddGroup",
            Self::AddItems => "AddItems",
            Self::RemoveItems => "RemoveItems",
            Self::SyncRead => "SyncRead",
            Self::AsyncRefresh => "AsyncRefresh",
            Self::SyncWrite => "SyncWrite",
            Self::WithEvents => "WithEvents",
            Self::CloseEvents => "CloseEvents",
            Self::RemoveGroup => "RemoveGroup",
            Self::Callback => "Callback",
            Self::Ping => "Ping",
        }
    }

    /// Looks up an operation by its display name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }

    /// Returns the per-operation error code byte.
    pub fn code(&self) -> u8 {
        // Codes start at 1; 0 is reserved for unknown operations.
        Self::ALL
            .iter()
            .position(|op| op == self)
            .map_or(0, |i| i as u8 + 1)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ErrorKind / WireError
// =============================================================================

/// Serializable classification of a [`GatewayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed call arguments.
    InvalidArgument,
    /// A provider operation failed.
    Provider,
    /// A callback deadline passed.
    Timeout,
    /// No live connection.
    NotConnected,
    /// Invalid settings.
    Configuration,
}

impl ErrorKind {
    /// Returns the kind name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::Provider => "provider",
            Self::Timeout => "timeout",
            Self::NotConnected => "not_connected",
            Self::Configuration => "configuration",
        }
    }

    /// Returns the category byte used in [`ErrorCode`].
    pub fn code(&self) -> u8 {
        match self {
            Self::InvalidArgument => 1,
            Self::Provider => 2,
            Self::Timeout => 3,
            Self::NotConnected => 4,
            Self::Configuration => 5,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gateway error flattened for transport across a process boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct WireError {
    /// Error kind.
    pub kind: ErrorKind,
    /// Rendered [`ErrorCode`].
    pub code: String,
    /// Rendered message.
    pub message: String,
}

impl From<&GatewayError> for WireError {
    fn from(error: &GatewayError) -> Self {
        error.to_wire()
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error => Level::ERROR,
            Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Structured error code.
///
/// Format: `GW-XXYY` where XX is the [`ErrorKind`] byte and YY identifies
/// the provider [`Operation`] (or 01 for kinds without one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category byte.
    pub category: u8,
    /// Specific error within category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GW-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Tests
// =============================================================================
