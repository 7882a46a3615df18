// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Data provider abstraction.
//!
//! A [`PointProvider`] is the backend a session talks to: it owns server
//! connections, subscription groups and the items inside them. Everything
//! above this trait (group registry, read and write engines) is provider
//! agnostic, which keeps the engines testable against
//! [`MemoryProvider`](memory::MemoryProvider).
//!
//! # Call Flow
//!
//! ```text
//!  Session ──► connect / set_client_name
//!     │
//!     ├──► create_subscription ──► validate ──► add_items
//!     │                                            │
//!     │        ┌───────── sync_read ◄──────────────┤
//!     │        │                                   │
//!     │        └── async_refresh ──► EventSink ──► EventHook (per sub-group)
//!     │
//!     └──► remove_items / unadvise / remove_subscription ──► disconnect
//! ```
//!
//! Asynchronous data changes travel over a tokio channel: the provider holds
//! an [`EventSink`] and the session holds the matching [`EventHook`].

pub mod memory;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderFault;
use crate::types::{DataSource, Value};

pub use memory::{Delivery, MemoryProvider, MemoryProviderFactory};

/// Per-item status code. Zero means success.
pub type ItemCode = i32;

/// Result alias for provider calls.
pub type ProviderResult<T> = Result<T, ProviderFault>;

/// Success item code.
pub const S_OK: ItemCode = 0;

/// Unspecified failure.
pub const E_FAIL: ItemCode = 0x8000_4005_u32 as i32;

/// Invalid argument.
pub const E_INVALIDARG: ItemCode = 0x8007_0057_u32 as i32;

/// The class string does not name a known provider.
pub const CO_E_CLASSSTRING: ItemCode = 0x8004_01F3_u32 as i32;

/// The item identifier is syntactically invalid.
pub const OPC_E_INVALIDITEMID: ItemCode = 0xC004_0008_u32 as i32;

/// The item identifier is not in the server address space.
pub const OPC_E_UNKNOWNITEMID: ItemCode = 0xC004_0007_u32 as i32;

/// The item cannot be written.
pub const OPC_E_BADRIGHTS: ItemCode = 0xC004_0006_u32 as i32;

// =============================================================================
// Handles
// =============================================================================

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident, $inner:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

handle_type!(
    /// Provider-assigned handle of a subscription group.
    GroupHandle,
    u32
);
handle_type!(
    /// Provider-assigned handle of an item inside a group.
    ServerHandle,
    u32
);
handle_type!(
    /// Session-assigned handle that data changes are keyed by.
    ClientHandle,
    u32
);
handle_type!(
    /// Identifier tying an asynchronous refresh to its data change.
    TransactionId,
    u16
);

// =============================================================================
// Read data
// =============================================================================

/// One item of a synchronous read.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRead {
    /// Value read, `Null` on failure.
    pub value: Value,
    /// Quality word.
    pub quality: u16,
    /// Provider timestamp.
    pub timestamp: Option<DateTime<Utc>>,
    /// Item status code.
    pub code: ItemCode,
}

impl ItemRead {
    /// Creates a failed item read.
    pub fn failed(code: ItemCode) -> Self {
        Self {
            value: Value::Null,
            quality: 0,
            timestamp: None,
            code,
        }
    }

    /// Returns `true` if the item was read.
    pub fn is_ok(&self) -> bool {
        self.code == S_OK
    }
}

/// An asynchronous data-change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct DataChange {
    /// Transaction the change answers.
    pub transaction_id: TransactionId,
    /// Client handles, parallel to the remaining vectors.
    pub client_handles: Vec<ClientHandle>,
    /// Values.
    pub values: Vec<Value>,
    /// Quality words.
    pub qualities: Vec<u16>,
    /// Timestamps.
    pub timestamps: Vec<Option<DateTime<Utc>>>,
}

impl DataChange {
    /// Iterates `(client handle, value, quality, timestamp)` rows.
    pub fn rows(
        &self,
    ) -> impl Iterator<Item = (ClientHandle, &Value, u16, Option<DateTime<Utc>>)> + '_ {
        self.client_handles
            .iter()
            .zip(&self.values)
            .zip(&self.qualities)
            .zip(&self.timestamps)
            .map(|(((h, v), q), t)| (*h, v, *q, *t))
    }
}

// =============================================================================
// Event channel
// =============================================================================

/// Provider side of a sub-group's data-change channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    sub_group: String,
    tx: mpsc::UnboundedSender<DataChange>,
}

impl EventSink {
    /// Delivers a data change. Returns `false` if the hook was dropped.
    pub fn deliver(&self, change: DataChange) -> bool {
        self.tx.send(change).is_ok()
    }

    /// Name of the sub-group this sink belongs to.
    pub fn sub_group(&self) -> &str {
        &self.sub_group
    }

    /// Returns `true` once the hook side is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Session side of a sub-group's data-change channel.
#[derive(Debug)]
pub struct EventHook {
    sub_group: String,
    rx: mpsc::UnboundedReceiver<DataChange>,
}

impl EventHook {
    /// Receives the next data change, `None` once every sink is gone.
    pub async fn recv(&mut self) -> Option<DataChange> {
        self.rx.recv().await
    }

    /// Name of the sub-group this hook belongs to.
    pub fn sub_group(&self) -> &str {
        &self.sub_group
    }

    /// Stops accepting data changes.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

/// Creates a connected sink/hook pair for a sub-group.
pub fn event_channel(sub_group: impl Into<String>) -> (EventSink, EventHook) {
    let sub_group = sub_group.into();
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EventSink {
            sub_group: sub_group.clone(),
            tx,
        },
        EventHook { sub_group, rx },
    )
}

// =============================================================================
// PointProvider
// =============================================================================

/// Backend that serves tag values.
///
/// Batch calls return one [`ItemCode`] per input element. A call-level
/// [`ProviderFault`] means the whole batch failed.
#[async_trait]
pub trait PointProvider: Send + Sync {
    /// Connects to `server` on `host`.
    async fn connect(&mut self, server: &str, host: &str) -> ProviderResult<()>;

    /// Disconnects from the current server.
    async fn disconnect(&mut self) -> ProviderResult<()>;

    /// Announces the client name to the server.
    async fn set_client_name(&mut self, name: &str) -> ProviderResult<()>;

    /// Checks tag names against the server address space.
    async fn validate(&mut self, tags: &[String]) -> ProviderResult<Vec<ItemCode>>;

    /// Creates a subscription group. Anonymous groups pass `None`.
    async fn create_subscription(
        &mut self,
        name: Option<&str>,
        update_rate: i32,
    ) -> ProviderResult<GroupHandle>;

    /// Adds items to a group, returning a server handle per accepted item.
    async fn add_items(
        &mut self,
        group: GroupHandle,
        tags: &[String],
        client_handles: &[ClientHandle],
    ) -> ProviderResult<Vec<(ItemCode, Option<ServerHandle>)>>;

    /// Removes items from a group.
    async fn remove_items(
        &mut self,
        group: GroupHandle,
        handles: &[ServerHandle],
    ) -> ProviderResult<Vec<ItemCode>>;

    /// Reads items synchronously.
    async fn sync_read(
        &mut self,
        group: GroupHandle,
        source: DataSource,
        handles: &[ServerHandle],
    ) -> ProviderResult<Vec<ItemRead>>;

    /// Requests every item of a group to be delivered through its sink.
    async fn async_refresh(
        &mut self,
        group: GroupHandle,
        source: DataSource,
        transaction: TransactionId,
    ) -> ProviderResult<()>;

    /// Attaches the data-change sink of a group.
    async fn advise(&mut self, group: GroupHandle, sink: EventSink) -> ProviderResult<()>;

    /// Detaches the data-change sink of a group.
    async fn unadvise(&mut self, group: GroupHandle) -> ProviderResult<()>;

    /// Deletes a group.
    async fn remove_subscription(&mut self, group: GroupHandle) -> ProviderResult<()>;

    /// Writes values synchronously.
    async fn sync_write(
        &mut self,
        group: GroupHandle,
        handles: &[ServerHandle],
        values: &[Value],
    ) -> ProviderResult<Vec<ItemCode>>;

    /// Reads the server clock.
    async fn server_time(&mut self) -> ProviderResult<DateTime<Utc>>;

    /// Returns the provider's text for a status code.
    fn error_string(&self, code: ItemCode) -> Option<String>;
}

/// Creates providers by class name.
pub trait ProviderFactory: Send + Sync {
    /// Instantiates the provider registered under `class`.
    fn create(&self, class: &str) -> ProviderResult<Box<dyn PointProvider>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_channel_delivery() {
        let (sink, mut hook) = event_channel("G.0");
        assert_eq!(sink.sub_group(), "G.0");

        let change = DataChange {
            transaction_id: TransactionId(3),
            client_handles: vec![ClientHandle(0)],
            values: vec![Value::Int32(1)],
            qualities: vec![192],
            timestamps: vec![None],
        };
        assert!(sink.deliver(change.clone()));
        assert_eq!(hook.recv().await, Some(change));

        drop(hook);
        assert!(sink.is_closed());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(E_FAIL, -2147467259);
        assert_eq!(CO_E_CLASSSTRING, -2147221005);
        assert!(OPC_E_UNKNOWNITEMID < 0);
    }

    #[test]
    fn test_data_change_rows() {
        let change = DataChange {
            transaction_id: TransactionId(1),
            client_handles: vec![ClientHandle(4), ClientHandle(7)],
            values: vec![Value::Int32(1), Value::Int32(2)],
            qualities: vec![192, 0],
            timestamps: vec![None, None],
        };
        let rows: Vec<_> = change.rows().map(|(h, _, q, _)| (h.0, q)).collect();
        assert_eq!(rows, vec![(4, 192), (7, 0)]);
    }
}
