// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # opcgate-bin
//!
//! CLI binary for the opcgate session gateway.
//!
//! This crate provides the `opcgate` binary, including:
//!
//! - CLI argument parsing with clap
//! - Configuration loading through `opcgate-config`
//! - Logging initialization
//! - Command implementations (read, write, sessions, validate, version)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         main.rs                              │
//! │                    (Entry Point)                             │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │    cli.rs   │
//!                    │ (Argument   │
//!                    │  Parsing)   │
//!                    └──────┬──────┘
//!                           │
//!               ┌───────────┴───────────┐
//!               ▼                       ▼
//!        ┌──────────┐             ┌──────────┐
//!        │ commands │             │ logging  │
//!        └────┬─────┘             └──────────┘
//!             │
//!      ┌──────┴───────┐
//!      │ opcgate-core │
//!      │ opcgate-config│
//!      └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Read two tags through a named group
//! opcgate read Random.Int4 Random.Real8 --group Demo
//!
//! # Write a value and read it back
//! opcgate write "Bucket Brigade.Int4=42" --read-back
//!
//! # Validate configuration
//! opcgate -c /etc/opcgate/opcgate.yaml validate --show-config
//!
//! # Show the session table of a demonstration gateway
//! opcgate sessions --count 4
//! ```
//!
//! The read, write and sessions commands run against the in-memory
//! simulation provider shipped with `opcgate-core`.

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
