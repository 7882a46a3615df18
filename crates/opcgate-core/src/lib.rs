// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # opcgate-core
//!
//! Tag-group session manager for OPC-style data providers.
//!
//! This crate turns a low-level [`PointProvider`] (connections, subscription
//! groups, item handles, asynchronous data-change callbacks) into a
//! tag-oriented client API:
//!
//! - **Session**: connect with server fallback, read, write, remove groups
//! - **Registry**: named groups split into sized sub-groups, reconciled on rebuild
//! - **Read engine**: sync reads or async refresh + transaction-matched wait
//! - **Write engine**: chunked writes through throw-away subscriptions
//! - **Gateway**: hosts many sessions for remote callers
//! - **MemoryProvider**: an in-memory provider for demos and tests
//!
//! ## Example
//!
//! ```rust
//! use opcgate_core::provider::{MemoryProvider, MemoryProviderFactory};
//! use opcgate_core::read::ReadOptions;
//! use opcgate_core::write::WriteOptions;
//! use opcgate_core::{Session, SessionSettings, Value};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> opcgate_core::GatewayResult<()> {
//! let factory = MemoryProviderFactory::new(MemoryProvider::simulation());
//! let mut session = Session::open(&factory, SessionSettings::default())?;
//! session.connect(Some("Matrikon.OPC.Simulation"), None).await?;
//!
//! session
//!     .write(("Bucket Brigade.Int4", Value::Int32(7)), WriteOptions::new())
//!     .await?;
//! let value = session.get("Bucket Brigade.Int4").await?;
//! assert_eq!(value, Some(Value::Int32(7)));
//!
//! let grouped = session
//!     .read(vec!["Random.Int4", "Random.Real8"], ReadOptions::new().group("Demo"))
//!     .await?;
//! assert_eq!(grouped.as_many().map(|r| r.len()), Some(2));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Core Modules
// =============================================================================

pub mod error;
pub mod settings;
pub mod tags;
pub mod trace;
pub mod types;

// =============================================================================
// Provider & Engine Modules
// =============================================================================

pub mod provider;
pub mod read;
mod reconcile;
pub mod registry;
pub mod write;

// =============================================================================
// Session Modules
// =============================================================================

pub mod gateway;
pub mod session;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use error::{
    ErrorCode, ErrorKind, ErrorSeverity, GatewayError, GatewayResult, Operation, ProviderFault,
    WireError,
};
pub use gateway::{Gateway, SessionId, SessionSummary};
pub use provider::{PointProvider, ProviderFactory};
pub use read::{ReadCursor, ReadOptions};
pub use session::Session;
pub use settings::SessionSettings;
pub use tags::{GroupArg, TagArg, WriteArg};
pub use types::{
    DataSource, Quality, ReadOutput, ReadSource, TagReading, TagResult, Value, WriteOutput,
    WriteReading, WriteResult, WriteStatus,
};
pub use write::{WriteCursor, WriteOptions};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
