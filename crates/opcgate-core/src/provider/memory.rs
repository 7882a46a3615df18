// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory point provider.
//!
//! `MemoryProvider` keeps a table of points and simulates subscription
//! groups, item handles and data-change delivery. It backs the command-line
//! demo and every engine test. Clones share state, so a test can keep a
//! handle while the session owns the boxed provider.
//!
//! Failures are injected per operation ([`MemoryProvider::fail`]) or per
//! item ([`MemoryProvider::fail_item`]), and asynchronous delivery can be
//! delayed or suppressed with [`Delivery`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{
    ClientHandle, DataChange, EventSink, GroupHandle, ItemCode, ItemRead, PointProvider,
    ProviderFactory, ProviderResult, ServerHandle, TransactionId, CO_E_CLASSSTRING, E_FAIL,
    E_INVALIDARG, OPC_E_BADRIGHTS, OPC_E_INVALIDITEMID, OPC_E_UNKNOWNITEMID, S_OK,
};
use crate::error::{Operation, ProviderFault};
use crate::settings::DEFAULT_CLASSES;
use crate::types::{DataSource, Value};

/// Server name served by [`MemoryProvider::simulation`].
pub const SIMULATION_SERVER: &str = "Matrikon.OPC.Simulation";

const GOOD: u16 = 0xC0;

// =============================================================================
// Delivery
// =============================================================================

/// How asynchronous refreshes are answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Delivery {
    /// Deliver the data change before `async_refresh` returns.
    #[default]
    Immediate,
    /// Deliver from a background task after a delay.
    Delayed(Duration),
    /// Deliver a change for another transaction first, then the real one.
    StaleFirst,
    /// Never deliver.
    Suppressed,
}

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone)]
struct Point {
    value: Value,
    quality: u16,
    timestamp: DateTime<Utc>,
    writable: bool,
}

#[derive(Debug)]
struct SimGroup {
    name: Option<String>,
    items: BTreeMap<ServerHandle, (String, ClientHandle)>,
    sink: Option<EventSink>,
}

#[derive(Debug, Default)]
struct MemoryState {
    servers: BTreeSet<String>,
    connection: Option<(String, String)>,
    client_name: Option<String>,
    points: BTreeMap<String, Point>,
    item_failures: HashMap<(Operation, String), ItemCode>,
    faults: HashMap<Operation, ProviderFault>,
    delivery: Delivery,
    groups: BTreeMap<GroupHandle, SimGroup>,
    next_group: u32,
    next_item: u32,
    calls: HashMap<Operation, u64>,
    sources: Vec<DataSource>,
    writes: Vec<(String, Value)>,
    added: Vec<(String, ClientHandle)>,
    frozen_clock: Option<DateTime<Utc>>,
    last_clock: Option<DateTime<Utc>>,
}

impl MemoryState {
    fn record(&mut self, op: Operation) -> ProviderResult<()> {
        *self.calls.entry(op).or_default() += 1;
        match self.faults.get(&op) {
            Some(fault) => Err(fault.clone()),
            None => Ok(()),
        }
    }

    fn require_connection(&self) -> ProviderResult<()> {
        if self.connection.is_some() {
            Ok(())
        } else {
            Err(ProviderFault::new(E_FAIL).with_provider_message("Not connected"))
        }
    }

    fn group_mut(&mut self, handle: GroupHandle) -> ProviderResult<&mut SimGroup> {
        self.groups.get_mut(&handle).ok_or_else(|| {
            ProviderFault::new(E_INVALIDARG)
                .with_provider_message(format!("Unknown group handle {handle}"))
        })
    }

    fn item_failure(&self, op: Operation, tag: &str) -> Option<ItemCode> {
        self.item_failures.get(&(op, tag.to_string())).copied()
    }

    fn lookup_code(&self, tag: &str) -> ItemCode {
        if tag.trim().is_empty() {
            OPC_E_INVALIDITEMID
        } else if self.points.contains_key(tag) {
            S_OK
        } else {
            OPC_E_UNKNOWNITEMID
        }
    }

    fn fork(&self) -> Self {
        Self {
            servers: self.servers.clone(),
            points: self.points.clone(),
            item_failures: self.item_failures.clone(),
            faults: self.faults.clone(),
            delivery: self.delivery,
            ..Self::default()
        }
    }
}

// =============================================================================
// MemoryProvider
// =============================================================================

/// Point provider backed by an in-memory table.
///
/// # Examples
///
/// ```
/// use opcgate_core::provider::MemoryProvider;
/// use opcgate_core::types::Value;
///
/// let provider = MemoryProvider::new()
///     .with_server("Demo.Server")
///     .with_point("Tank.Level", Value::Float64(3.5));
/// assert_eq!(provider.value("Tank.Level"), Some(Value::Float64(3.5)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryProvider {
    /// Creates an empty provider with no servers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider mimicking a common simulation server.
    pub fn simulation() -> Self {
        Self::new()
            .with_server(SIMULATION_SERVER)
            .with_read_only_point("Random.Int1", Value::Int8(12))
            .with_read_only_point("Random.Int2", Value::Int16(-4_107))
            .with_read_only_point("Random.Int4", Value::Int32(1_893_402))
            .with_read_only_point("Random.Real4", Value::Float32(7.25))
            .with_read_only_point("Random.Real8", Value::Float64(1_054.375))
            .with_read_only_point("Random.String", Value::from("Hello"))
            .with_read_only_point("Random.Boolean", Value::Bool(true))
            .with_point("Bucket Brigade.Int4", Value::Int32(0))
            .with_point("Bucket Brigade.Real8", Value::Float64(0.0))
            .with_point("Bucket Brigade.String", Value::from(""))
            .with_point("Bucket Brigade.Boolean", Value::Bool(false))
            .with_read_only_point("Square Waves.Real8", Value::Float64(-100.0))
            .with_read_only_point("Triangle Waves.UInt2", Value::UInt16(40))
    }

    // =========================================================================
    // Builder
    // =========================================================================

    /// Adds a server name that `connect` accepts.
    pub fn with_server(self, server: impl Into<String>) -> Self {
        self.state.lock().servers.insert(server.into());
        self
    }

    /// Adds a writable point with good quality.
    pub fn with_point(self, tag: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert_point(tag.into(), value.into(), GOOD, true);
        self
    }

    /// Adds a read-only point with good quality.
    pub fn with_read_only_point(self, tag: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert_point(tag.into(), value.into(), GOOD, false);
        self
    }

    /// Adds a writable point with an explicit quality word.
    pub fn with_point_quality(
        self,
        tag: impl Into<String>,
        value: impl Into<Value>,
        quality: u16,
    ) -> Self {
        self.insert_point(tag.into(), value.into(), quality, true);
        self
    }

    fn insert_point(&self, tag: String, value: Value, quality: u16, writable: bool) {
        self.state.lock().points.insert(
            tag,
            Point {
                value,
                quality,
                timestamp: Utc::now(),
                writable,
            },
        );
    }

    /// Returns an independent provider with the same points, servers and
    /// injected failures but no groups, connection or counters.
    pub fn fork(&self) -> Self {
        Self {
            state: Arc::new(Mutex::new(self.state.lock().fork())),
        }
    }

    // =========================================================================
    // Runtime control
    // =========================================================================

    /// Replaces a point's value.
    pub fn set_value(&self, tag: &str, value: impl Into<Value>) {
        if let Some(point) = self.state.lock().points.get_mut(tag) {
            point.value = value.into();
            point.timestamp = Utc::now();
        }
    }

    /// Sets how asynchronous refreshes are answered.
    pub fn set_delivery(&self, delivery: Delivery) {
        self.state.lock().delivery = delivery;
    }

    /// Stops the server clock at `at`.
    pub fn freeze_clock(&self, at: DateTime<Utc>) {
        self.state.lock().frozen_clock = Some(at);
    }

    /// Makes every call of `op` fail with `fault`.
    pub fn fail(&self, op: Operation, fault: ProviderFault) {
        self.state.lock().faults.insert(op, fault);
    }

    /// Removes an injected operation failure.
    pub fn clear_fault(&self, op: Operation) {
        self.state.lock().faults.remove(&op);
    }

    /// Makes `tag` fail with `code` in `op` (`Validate`, `AddItems`,
    /// `SyncRead` or `SyncWrite`).
    pub fn fail_item(&self, op: Operation, tag: impl Into<String>, code: ItemCode) {
        self.state
            .lock()
            .item_failures
            .insert((op, tag.into()), code);
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Current value of a point.
    pub fn value(&self, tag: &str) -> Option<Value> {
        self.state.lock().points.get(tag).map(|p| p.value.clone())
    }

    /// Number of calls made to `op`.
    pub fn calls(&self, op: Operation) -> u64 {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Data sources used by reads and refreshes, oldest first.
    pub fn sources(&self) -> Vec<DataSource> {
        self.state.lock().sources.clone()
    }

    /// Successful writes, oldest first.
    pub fn writes(&self) -> Vec<(String, Value)> {
        self.state.lock().writes.clone()
    }

    /// Every item added so far with the client handle it was given.
    pub fn added_items(&self) -> Vec<(String, ClientHandle)> {
        self.state.lock().added.clone()
    }

    /// Number of live groups.
    pub fn group_count(&self) -> usize {
        self.state.lock().groups.len()
    }

    /// Names of live groups, `None` for anonymous ones.
    pub fn group_names(&self) -> Vec<Option<String>> {
        self.state
            .lock()
            .groups
            .values()
            .map(|g| g.name.clone())
            .collect()
    }

    /// Tags held by the named group, in server-handle order.
    pub fn group_items(&self, name: &str) -> Vec<String> {
        self.state
            .lock()
            .groups
            .values()
            .find(|g| g.name.as_deref() == Some(name))
            .map(|g| g.items.values().map(|(tag, _)| tag.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns `true` if the named group has a sink attached.
    pub fn is_advised(&self, name: &str) -> bool {
        self.state
            .lock()
            .groups
            .values()
            .any(|g| g.name.as_deref() == Some(name) && g.sink.is_some())
    }

    /// Server the provider is connected to.
    pub fn connected_server(&self) -> Option<String> {
        self.state.lock().connection.as_ref().map(|(s, _)| s.clone())
    }

    /// Client name announced by the session.
    pub fn client_name(&self) -> Option<String> {
        self.state.lock().client_name.clone()
    }
}

#[async_trait]
impl PointProvider for MemoryProvider {
    async fn connect(&mut self, server: &str, host: &str) -> ProviderResult<()> {
        let mut state = self.state.lock();
        state.record(Operation::Connect)?;

        if !state.servers.contains(server) {
            return Err(ProviderFault::new(E_FAIL));
        }
        state.connection = Some((server.to_string(), host.to_string()));
        Ok(())
    }

    async fn disconnect(&mut self) -> ProviderResult<()> {
        let mut state = self.state.lock();
        state.record(Operation::Disconnect)?;
        state.connection = None;
        state.groups.clear();
        Ok(())
    }

    async fn set_client_name(&mut self, name: &str) -> ProviderResult<()> {
        self.state.lock().client_name = Some(name.to_string());
        Ok(())
    }

    async fn validate(&mut self, tags: &[String]) -> ProviderResult<Vec<ItemCode>> {
        let mut state = self.state.lock();
        state.record(Operation::Validate)?;
        state.require_connection()?;

        Ok(tags
            .iter()
            .map(|tag| {
                state
                    .item_failure(Operation::Validate, tag)
                    .unwrap_or_else(|| state.lookup_code(tag))
            })
            .collect())
    }

    async fn create_subscription(
        &mut self,
        name: Option<&str>,
        _update_rate: i32,
    ) -> ProviderResult<GroupHandle> {
        let mut state = self.state.lock();
        state.record(Operation::AddGroup)?;
        state.require_connection()?;

        state.next_group += 1;
        let handle = GroupHandle(state.next_group);
        state.groups.insert(
            handle,
            SimGroup {
                name: name.map(str::to_string),
                items: BTreeMap::new(),
                sink: None,
            },
        );
        Ok(handle)
    }

    async fn add_items(
        &mut self,
        group: GroupHandle,
        tags: &[String],
        client_handles: &[ClientHandle],
    ) -> ProviderResult<Vec<(ItemCode, Option<ServerHandle>)>> {
        let mut state = self.state.lock();
        state.record(Operation::AddItems)?;
        state.group_mut(group)?;

        let mut results = Vec::with_capacity(tags.len());
        for (tag, client) in tags.iter().zip(client_handles) {
            let code = state
                .item_failure(Operation::AddItems, tag)
                .unwrap_or_else(|| state.lookup_code(tag));
            if code != S_OK {
                results.push((code, None));
                continue;
            }

            state.next_item += 1;
            let handle = ServerHandle(state.next_item);
            state
                .group_mut(group)?
                .items
                .insert(handle, (tag.clone(), *client));
            state.added.push((tag.clone(), *client));
            results.push((S_OK, Some(handle)));
        }
        Ok(results)
    }

    async fn remove_items(
        &mut self,
        group: GroupHandle,
        handles: &[ServerHandle],
    ) -> ProviderResult<Vec<ItemCode>> {
        let mut state = self.state.lock();
        state.record(Operation::RemoveItems)?;
        let group = state.group_mut(group)?;

        Ok(handles
            .iter()
            .map(|h| match group.items.remove(h) {
                Some(_) => S_OK,
                None => E_INVALIDARG,
            })
            .collect())
    }

    async fn sync_read(
        &mut self,
        group: GroupHandle,
        source: DataSource,
        handles: &[ServerHandle],
    ) -> ProviderResult<Vec<ItemRead>> {
        let mut state = self.state.lock();
        state.record(Operation::SyncRead)?;
        let items = state.group_mut(group)?.items.clone();
        state.sources.push(source);

        let now = Utc::now();
        let mut reads = Vec::with_capacity(handles.len());
        for handle in handles {
            let Some((tag, _)) = items.get(handle) else {
                reads.push(ItemRead::failed(E_INVALIDARG));
                continue;
            };
            if let Some(code) = state.item_failure(Operation::SyncRead, tag) {
                reads.push(ItemRead::failed(code));
                continue;
            }
            match state.points.get_mut(tag) {
                Some(point) => {
                    if source == DataSource::Device {
                        point.timestamp = now;
                    }
                    reads.push(ItemRead {
                        value: point.value.clone(),
                        quality: point.quality,
                        timestamp: Some(point.timestamp),
                        code: S_OK,
                    });
                }
                None => reads.push(ItemRead::failed(OPC_E_UNKNOWNITEMID)),
            }
        }
        Ok(reads)
    }

    async fn async_refresh(
        &mut self,
        group: GroupHandle,
        source: DataSource,
        transaction: TransactionId,
    ) -> ProviderResult<()> {
        let mut state = self.state.lock();
        state.record(Operation::AsyncRefresh)?;
        let (items, sink) = {
            let group = state.group_mut(group)?;
            (group.items.clone(), group.sink.clone())
        };
        let sink = sink.ok_or_else(|| {
            ProviderFault::new(E_FAIL).with_provider_message("No event sink advised")
        })?;
        state.sources.push(source);

        let now = Utc::now();
        let mut change = DataChange {
            transaction_id: transaction,
            client_handles: Vec::new(),
            values: Vec::new(),
            qualities: Vec::new(),
            timestamps: Vec::new(),
        };
        for (tag, client) in items.values() {
            if let Some(point) = state.points.get_mut(tag) {
                if source == DataSource::Device {
                    point.timestamp = now;
                }
                change.client_handles.push(*client);
                change.values.push(point.value.clone());
                change.qualities.push(point.quality);
                change.timestamps.push(Some(point.timestamp));
            }
        }

        match state.delivery {
            Delivery::Immediate => {
                sink.deliver(change);
            }
            Delivery::Delayed(delay) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    sink.deliver(change);
                });
            }
            Delivery::StaleFirst => {
                let mut stale = change.clone();
                stale.transaction_id = TransactionId(transaction.0.wrapping_sub(1));
                sink.deliver(stale);
                sink.deliver(change);
            }
            Delivery::Suppressed => {}
        }
        Ok(())
    }

    async fn advise(&mut self, group: GroupHandle, sink: EventSink) -> ProviderResult<()> {
        let mut state = self.state.lock();
        state.record(Operation::WithEvents)?;
        state.group_mut(group)?.sink = Some(sink);
        Ok(())
    }

    async fn unadvise(&mut self, group: GroupHandle) -> ProviderResult<()> {
        let mut state = self.state.lock();
        state.record(Operation::CloseEvents)?;
        state.group_mut(group)?.sink = None;
        Ok(())
    }

    async fn remove_subscription(&mut self, group: GroupHandle) -> ProviderResult<()> {
        let mut state = self.state.lock();
        state.record(Operation::RemoveGroup)?;
        match state.groups.remove(&group) {
            Some(_) => Ok(()),
            None => Err(ProviderFault::new(E_INVALIDARG)
                .with_provider_message(format!("Unknown group handle {group}"))),
        }
    }

    async fn sync_write(
        &mut self,
        group: GroupHandle,
        handles: &[ServerHandle],
        values: &[Value],
    ) -> ProviderResult<Vec<ItemCode>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.record(Operation::SyncWrite)?;
        let items = state.group_mut(group)?.items.clone();

        let mut codes = Vec::with_capacity(handles.len());
        for (handle, value) in handles.iter().zip(values) {
            let Some((tag, _)) = items.get(handle) else {
                codes.push(E_INVALIDARG);
                continue;
            };
            if let Some(code) = state.item_failure(Operation::SyncWrite, tag) {
                codes.push(code);
                continue;
            }
            match state.points.get_mut(tag) {
                Some(point) if point.writable => {
                    point.value = value.clone();
                    point.timestamp = Utc::now();
                    state.writes.push((tag.clone(), value.clone()));
                    codes.push(S_OK);
                }
                Some(_) => codes.push(OPC_E_BADRIGHTS),
                None => codes.push(OPC_E_UNKNOWNITEMID),
            }
        }
        Ok(codes)
    }

    async fn server_time(&mut self) -> ProviderResult<DateTime<Utc>> {
        let mut state = self.state.lock();
        state.record(Operation::Ping)?;
        state.require_connection()?;
        if let Some(frozen) = state.frozen_clock {
            return Ok(frozen);
        }

        // Strictly increasing, even when the wall clock is coarse.
        let now = match state.last_clock {
            Some(last) if Utc::now() <= last => last + chrono::Duration::milliseconds(1),
            _ => Utc::now(),
        };
        state.last_clock = Some(now);
        Ok(now)
    }

    fn error_string(&self, code: ItemCode) -> Option<String> {
        let text = match code {
            S_OK => "The operation completed successfully.\r\n",
            E_FAIL => "Unspecified error\r\n",
            E_INVALIDARG => "The parameter is incorrect.\r\n",
            OPC_E_INVALIDITEMID => "The item ID doesn't conform to the server's syntax.\r\n",
            OPC_E_UNKNOWNITEMID => {
                "The item ID is not defined in the server address space or no longer exists.\r\n"
            }
            OPC_E_BADRIGHTS => "The item's access rights do not allow the operation.\r\n",
            _ => return None,
        };
        Some(text.to_string())
    }
}

// =============================================================================
// MemoryProviderFactory
// =============================================================================

/// Factory handing out [`MemoryProvider`]s.
#[derive(Debug, Clone)]
pub struct MemoryProviderFactory {
    template: MemoryProvider,
    classes: Vec<String>,
    shared: bool,
}

impl MemoryProviderFactory {
    /// Creates a factory that forks `template` for every provider and
    /// accepts the default class names.
    pub fn new(template: MemoryProvider) -> Self {
        Self {
            template,
            classes: DEFAULT_CLASSES.split(';').map(str::to_string).collect(),
            shared: false,
        }
    }

    /// Creates a factory whose providers all share `provider`'s state.
    pub fn shared(provider: MemoryProvider) -> Self {
        Self {
            shared: true,
            ..Self::new(provider)
        }
    }

    /// Replaces the accepted class names.
    pub fn with_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classes = classes.into_iter().map(Into::into).collect();
        self
    }
}

impl ProviderFactory for MemoryProviderFactory {
    fn create(&self, class: &str) -> ProviderResult<Box<dyn PointProvider>> {
        if !self.classes.iter().any(|c| c == class) {
            return Err(ProviderFault::new(CO_E_CLASSSTRING)
                .with_platform_message("Invalid class string"));
        }

        let provider = if self.shared {
            self.template.clone()
        } else {
            self.template.fork()
        };
        Ok(Box::new(provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::event_channel;

    async fn connected() -> MemoryProvider {
        let mut provider = MemoryProvider::simulation();
        provider.connect(SIMULATION_SERVER, "localhost").await.unwrap();
        provider
    }

    #[tokio::test]
    async fn test_connect_unknown_server() {
        let mut provider = MemoryProvider::simulation();
        let fault = provider.connect("Nope.Server", "localhost").await.unwrap_err();
        assert_eq!(fault.code, E_FAIL);
        assert_eq!(fault.describe(), "-2147467259");
    }

    #[tokio::test]
    async fn test_validate_codes() {
        let mut provider = connected().await;
        provider.fail_item(Operation::Validate, "Random.Int2", OPC_E_INVALIDITEMID);

        let codes = provider
            .validate(&["Random.Int4".into(), "Nope".into(), "Random.Int2".into()])
            .await
            .unwrap();
        assert_eq!(codes, vec![S_OK, OPC_E_UNKNOWNITEMID, OPC_E_INVALIDITEMID]);
    }

    #[tokio::test]
    async fn test_read_write_round() {
        let mut provider = connected().await;
        let group = provider.create_subscription(Some("G"), -1).await.unwrap();
        let added = provider
            .add_items(
                group,
                &["Bucket Brigade.Int4".into(), "Random.Int4".into()],
                &[ClientHandle(0), ClientHandle(1)],
            )
            .await
            .unwrap();
        let handles: Vec<_> = added.iter().filter_map(|(_, h)| *h).collect();
        assert_eq!(handles.len(), 2);

        let codes = provider
            .sync_write(group, &handles, &[Value::Int32(9), Value::Int32(1)])
            .await
            .unwrap();
        assert_eq!(codes, vec![S_OK, OPC_E_BADRIGHTS]);

        let reads = provider
            .sync_read(group, DataSource::Device, &handles[..1])
            .await
            .unwrap();
        assert_eq!(reads[0].value, Value::Int32(9));
        assert_eq!(provider.sources(), vec![DataSource::Device]);
    }

    #[tokio::test]
    async fn test_async_refresh_requires_sink() {
        let mut provider = connected().await;
        let group = provider.create_subscription(None, -1).await.unwrap();
        assert!(provider
            .async_refresh(group, DataSource::Cache, TransactionId(1))
            .await
            .is_err());

        let (sink, mut hook) = event_channel("anon");
        provider.advise(group, sink).await.unwrap();
        provider
            .async_refresh(group, DataSource::Cache, TransactionId(1))
            .await
            .unwrap();
        assert_eq!(hook.recv().await.unwrap().transaction_id, TransactionId(1));
    }

    #[tokio::test]
    async fn test_injected_fault() {
        let mut provider = connected().await;
        provider.fail(
            Operation::AddGroup,
            ProviderFault::new(E_FAIL).with_provider_message("no more groups"),
        );
        let fault = provider.create_subscription(None, -1).await.unwrap_err();
        assert_eq!(fault.describe(), "no more groups");
        assert_eq!(provider.calls(Operation::AddGroup), 1);

        provider.clear_fault(Operation::AddGroup);
        assert!(provider.create_subscription(None, -1).await.is_ok());
        assert_eq!(provider.calls(Operation::AddGroup), 2);
    }

    #[tokio::test]
    async fn test_server_clock() {
        let mut provider = MemoryProvider::simulation();
        assert!(provider.server_time().await.is_err());

        provider.connect(SIMULATION_SERVER, "localhost").await.unwrap();
        let first = provider.server_time().await.unwrap();
        let second = provider.server_time().await.unwrap();
        assert!(second > first);

        provider.freeze_clock(first);
        assert_eq!(provider.server_time().await.unwrap(), first);
        assert_eq!(provider.calls(Operation::Ping), 4);
    }

    #[test]
    fn test_factory_class_check() {
        let factory = MemoryProviderFactory::new(MemoryProvider::simulation());
        assert!(factory.create("OPC.Automation").is_ok());

        let fault = factory.create("Bogus.Class").err().unwrap();
        assert_eq!(fault.code, CO_E_CLASSSTRING);
        assert_eq!(fault.describe(), "Invalid class string");

        let factory = factory.with_classes(["Vendor.Automation"]);
        assert!(factory.create("Vendor.Automation").is_ok());
        assert!(factory.create("OPC.Automation").is_err());
    }

    #[test]
    fn test_fork_is_independent() {
        let provider = MemoryProvider::simulation();
        let fork = provider.fork();
        fork.set_value("Bucket Brigade.Int4", 5);
        assert_eq!(provider.value("Bucket Brigade.Int4"), Some(Value::Int32(0)));
        assert_eq!(fork.value("Bucket Brigade.Int4"), Some(Value::Int32(5)));
    }
}
