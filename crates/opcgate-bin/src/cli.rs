// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! Subcommands:
//!
//! - `read`: Read tags, optionally through a named group
//! - `write`: Write `TAG=VALUE` pairs
//! - `sessions`: Host a few sessions and print the session table
//! - `validate`: Validate the configuration (default)
//! - `version`: Show version information

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use opcgate_core::ReadSource;

// =============================================================================
// Main CLI Structure
// =============================================================================

/// opcgate - tag-group session gateway for OPC data providers
///
/// Reads and writes tags through cached subscription groups, with server
/// fallback, chunked batches and per-tag error reporting.
#[derive(Parser, Debug)]
#[command(
    name = "opcgate",
    author = "Sylvex <contact@sylvex.io>",
    version = opcgate_core::VERSION,
    about = "Tag-group session gateway for OPC data providers",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path (built-in defaults when omitted)
    #[arg(short, long, env = "OPCGATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error), overrides the config file
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Log format (text, json, compact), overrides the config file
    #[arg(long, env = "OPCGATE_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Enable quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands for the opcgate CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Read tag values
    ///
    /// Connects to the first reachable server and reads the given tags.
    /// With `--group`, the tags are cached under that name and repeated
    /// reads reuse the subscription.
    Read(ReadArgs),

    /// Write tag values
    ///
    /// Each argument is a `TAG=VALUE` pair. Values are parsed as bool,
    /// integer or float before falling back to text.
    Write(WriteArgs),

    /// Show a demonstration gateway's session table
    ///
    /// Opens several sessions in one gateway, reads through each of them
    /// and prints their summaries.
    Sessions(SessionsArgs),

    /// Validate the configuration file
    ///
    /// This is the default command when no subcommand is specified.
    Validate(ValidateArgs),

    /// Show detailed version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `read` command.
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Tags to read
    #[arg(required = true)]
    pub tags: Vec<String>,

    /// Cache the subscription under this group name
    #[arg(short, long)]
    pub group: Option<String>,

    /// Maximum tags per sub-group
    #[arg(short, long)]
    pub size: Option<usize>,

    /// Read synchronously instead of waiting for a refresh
    #[arg(long)]
    pub sync: bool,

    /// Data source policy
    #[arg(long)]
    pub source: Option<SourceArg>,

    /// Attach provider error text to failed tags (implies --sync)
    #[arg(long)]
    pub include_error: bool,

    /// Rebuild the named group from the given tags
    #[arg(long, requires = "group")]
    pub rebuild: bool,

    /// Refresh timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Number of times to read
    #[arg(long, default_value = "1")]
    pub repeat: u32,

    /// Server list to connect to instead of the configured one
    #[arg(long)]
    pub server: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `write` command.
#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    /// `TAG=VALUE` pairs to write
    #[arg(required = true)]
    pub pairs: Vec<String>,

    /// Maximum pairs per chunk
    #[arg(short, long)]
    pub size: Option<usize>,

    /// Attach provider error text to failed writes
    #[arg(long)]
    pub include_error: bool,

    /// Read the tags back after writing
    #[arg(long)]
    pub read_back: bool,

    /// Server list to connect to instead of the configured one
    #[arg(long)]
    pub server: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `sessions` command.
#[derive(Args, Debug, Clone)]
pub struct SessionsArgs {
    /// Number of sessions to open
    #[arg(short = 'n', long, default_value = "3")]
    pub count: usize,

    /// Tags each session reads
    #[arg(long, value_delimiter = ',', default_value = "Random.Int4,Random.Real8")]
    pub tags: Vec<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<opcgate_config::LogFormat> for LogFormat {
    fn from(format: opcgate_config::LogFormat) -> Self {
        match format {
            opcgate_config::LogFormat::Text => LogFormat::Text,
            opcgate_config::LogFormat::Json => LogFormat::Json,
            opcgate_config::LogFormat::Compact => LogFormat::Compact,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
    /// YAML format
    Yaml,
}

/// Data source policy accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceArg {
    /// Always read from the server cache
    Cache,
    /// Always read from the device
    Device,
    /// Device for new groups, cache afterwards
    Hybrid,
}

impl From<SourceArg> for ReadSource {
    fn from(source: SourceArg) -> Self {
        match source {
            SourceArg::Cache => ReadSource::Cache,
            SourceArg::Device => ReadSource::Device,
            SourceArg::Hybrid => ReadSource::Hybrid,
        }
    }
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Validate` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Validate(ValidateArgs::default()))
    }

    /// Get the effective log level, falling back to `configured`.
    pub fn effective_log_level<'a>(&'a self, configured: &'a str) -> &'a str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            self.log_level.as_deref().unwrap_or(configured)
        }
    }

    /// Get the effective log format, falling back to `configured`.
    pub fn effective_log_format(&self, configured: opcgate_config::LogFormat) -> LogFormat {
        self.log_format.unwrap_or_else(|| configured.into())
    }
}

impl Default for ValidateArgs {
    fn default() -> Self {
        Self {
            show_config: false,
            format: OutputFormat::Text,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
