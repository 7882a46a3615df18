// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client session.
//!
//! A [`Session`] owns one provider, the named groups built on it, and the
//! transaction counter for asynchronous refreshes. All calls take
//! `&mut self`, so a session serves one caller at a time; share it across
//! tasks through the [`Gateway`](crate::gateway::Gateway).
//!
//! # Lifecycle
//!
//! ```text
//! Session::open ──► connect ──► read / iread / write / iwrite / remove ──► close
//!                     ▲                                                    │
//!                     └──────────────────── connect (reconnect) ◄──────────┘
//! ```
//!
//! # Examples
//!
//! ```
//! use opcgate_core::provider::{MemoryProvider, MemoryProviderFactory};
//! use opcgate_core::read::ReadOptions;
//! use opcgate_core::{Session, SessionSettings};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> opcgate_core::GatewayResult<()> {
//! let factory = MemoryProviderFactory::new(MemoryProvider::simulation());
//! let mut session = Session::open(&factory, SessionSettings::default())?;
//! session.connect(None, None).await?;
//!
//! let output = session.read("Random.Int4", ReadOptions::new()).await?;
//! assert!(output.as_single().is_some());
//!
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{GatewayError, GatewayResult, Operation};
use crate::provider::{PointProvider, ProviderFactory};
use crate::read::{ReadCursor, ReadOptions, ReadPlan, TransactionCounter};
use crate::reconcile;
use crate::registry::{GroupRegistry, ResolvePlan};
use crate::settings::{split_list, SessionSettings};
use crate::tags::{classify, GroupArg, TagArg, TagFamily, WriteArg};
use crate::trace::{TraceHook, Tracer};
use crate::types::{ReadOutput, TagResult, Value, WriteOutput, WriteResult, WriteStatus};
use crate::write::{WriteCursor, WriteOptions};

/// Settle time after a successful connect.
const CONNECT_SETTLE: Duration = Duration::from_millis(10);

/// Message returned for system health tags.
pub const HEALTH_TAGS_UNSUPPORTED: &str = "system health tags are not served by this gateway";

/// A client session against one provider.
pub struct Session {
    pub(crate) provider: Box<dyn PointProvider>,
    pub(crate) registry: GroupRegistry,
    pub(crate) tracer: Tracer,
    pub(crate) transactions: TransactionCounter,
    settings: SessionSettings,
    class: String,
    server: Option<String>,
    host: Option<String>,
    connected: bool,
    last_server_time: Option<DateTime<Utc>>,
}

impl Session {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Wraps an already instantiated provider.
    pub fn new(
        provider: Box<dyn PointProvider>,
        class: impl Into<String>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            provider,
            registry: GroupRegistry::new(),
            tracer: Tracer::new(),
            transactions: TransactionCounter::new(),
            settings,
            class: class.into(),
            server: None,
            host: None,
            connected: false,
            last_server_time: None,
        }
    }

    /// Instantiates the first provider class from `settings.class` that the
    /// factory accepts.
    ///
    /// With a single class the factory's failure is reported as
    /// `"Dispatch: <message>"`; with several, the last failure is.
    pub fn open(factory: &dyn ProviderFactory, settings: SessionSettings) -> GatewayResult<Self> {
        let classes: Vec<String> = split_list(&settings.class)
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut last_fault = None;

        for class in &classes {
            match factory.create(class) {
                Ok(provider) => {
                    debug!(class = %class, "Provider instantiated");
                    return Ok(Self::new(provider, class.clone(), settings));
                }
                Err(fault) => {
                    debug!(class = %class, "Provider class unavailable: {fault}");
                    last_fault = Some(fault);
                }
            }
        }

        Err(match last_fault {
            Some(fault) => GatewayError::provider_fault(Operation::Dispatch.as_str(), &fault),
            None => GatewayError::configuration("no provider class configured"),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Provider class in use.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Server list of the last successful connect.
    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    /// Host of the last successful connect.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Returns `true` while connected.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Names of the registered groups.
    pub fn groups(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Read-only view of the group registry.
    pub fn registry(&self) -> &GroupRegistry {
        &self.registry
    }

    /// Session settings.
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Installs a hook receiving one label per provider call.
    pub fn set_trace<F>(&mut self, hook: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let hook: TraceHook = Arc::new(hook);
        self.tracer.set_hook(Some(hook));
    }

    /// Removes the trace hook.
    pub fn clear_trace(&mut self) {
        self.tracer.set_hook(None);
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Connects to the first reachable server of a `;`-separated list.
    ///
    /// Without a server the previous list is reused, falling back to the
    /// configured one. Without a host the previous host is reused for a
    /// reconnect, otherwise the configured host. Reconnecting first removes
    /// every registered group from the provider.
    pub async fn connect(&mut self, server: Option<&str>, host: Option<&str>) -> GatewayResult<bool> {
        if !self.registry.is_empty() {
            debug!(groups = self.registry.len(), "Dropping groups on reconnect");
            self.discard_groups().await;
        }

        let (servers, host) = match server {
            Some(server) => (
                server.to_string(),
                host.map_or_else(|| self.settings.host.clone(), str::to_string),
            ),
            None => match (&self.server, &self.host) {
                (Some(prev_server), Some(prev_host)) => (
                    prev_server.clone(),
                    host.map_or_else(|| prev_host.clone(), str::to_string),
                ),
                _ => (
                    self.settings.server.clone(),
                    host.map_or_else(|| self.settings.host.clone(), str::to_string),
                ),
            },
        };

        let candidates: Vec<&str> = servers.split(';').collect();
        let single = candidates.len() == 1;
        let mut connected_to = None;

        for candidate in candidates.iter().filter(|s| !s.trim().is_empty()) {
            self.tracer.emit(Operation::Connect, format!("{candidate}@{host}"));
            match self.provider.connect(candidate, &host).await {
                Ok(()) => {
                    connected_to = Some(candidate.to_string());
                    break;
                }
                Err(fault) if single => {
                    return Err(GatewayError::provider_fault(
                        Operation::Connect.as_str(),
                        &fault,
                    ));
                }
                Err(fault) => debug!(server = %candidate, "Connect attempt failed: {fault}"),
            }
        }

        let Some(connected_to) = connected_to else {
            return Err(GatewayError::provider(
                Operation::Connect.as_str(),
                "Cannot connect to any of the servers in the OPC_SERVER list",
            ));
        };

        if let Err(fault) = self.provider.set_client_name(&self.settings.client_name).await {
            debug!("Client name not accepted: {fault}");
        }
        tokio::time::sleep(CONNECT_SETTLE).await;

        self.server = Some(servers);
        self.last_server_time = None;
        self.host = Some(host);
        self.connected = true;
        info!(server = %connected_to, host = ?self.host, "Connected");
        Ok(true)
    }

    /// Removes every group, then disconnects.
    ///
    /// Failures while removing groups are logged and do not stop the
    /// disconnect.
    pub async fn close(&mut self) -> GatewayResult<()> {
        self.discard_groups().await;

        self.tracer.emit(Operation::Disconnect, self.server.as_deref().unwrap_or(""));
        let result = self.provider.disconnect().await;
        self.connected = false;
        result.map_err(|f| GatewayError::provider_fault(Operation::Disconnect.as_str(), &f))?;
        info!("Disconnected");
        Ok(())
    }

    /// Checks that the server is still answering.
    ///
    /// The server clock must have moved since the previous ping. A provider
    /// fault, a stalled clock or a closed session all report `false`.
    pub async fn ping(&mut self) -> bool {
        if !self.connected {
            return false;
        }

        self.tracer.emit(Operation::Ping, self.server.as_deref().unwrap_or(""));
        match self.provider.server_time().await {
            Ok(time) if self.last_server_time != Some(time) => {
                self.last_server_time = Some(time);
                true
            }
            Ok(time) => {
                debug!(server_time = %time, "Server clock has not moved since the last ping");
                false
            }
            Err(fault) => {
                debug!("Ping failed: {fault}");
                false
            }
        }
    }

    /// Removes every group from the provider, logging failures.
    async fn discard_groups(&mut self) {
        for group in self.registry.names() {
            reconcile::discard_group(
                &mut *self.provider,
                &self.tracer,
                &mut self.registry,
                &group,
            )
            .await;
        }
    }

    fn ensure_connected(&self) -> GatewayResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(GatewayError::NotConnected)
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Reads tags, shaping the output by how they were passed.
    pub async fn read(
        &mut self,
        tags: impl Into<TagArg>,
        options: ReadOptions,
    ) -> GatewayResult<ReadOutput> {
        let (tags, single) = tags.into().normalize();
        let results = self.cursor(tags, options)?.collect().await?;
        Ok(ReadOutput::from_results(results, single))
    }

    /// Reads tags incrementally.
    pub fn iread(
        &mut self,
        tags: impl Into<TagArg>,
        options: ReadOptions,
    ) -> GatewayResult<ReadCursor<'_>> {
        let (tags, _) = tags.into().normalize();
        self.cursor(tags, options)
    }

    fn cursor(&mut self, tags: Vec<String>, options: ReadOptions) -> GatewayResult<ReadCursor<'_>> {
        if classify(&tags)? == TagFamily::Health {
            let results = tags
                .into_iter()
                .map(|tag| TagResult::failed(tag, Some(HEALTH_TAGS_UNSUPPORTED.to_string())))
                .collect();
            return Ok(ReadCursor::ready(self, results));
        }

        self.ensure_connected()?;
        let options = options.normalized();

        if options.group.is_none() && tags.is_empty() {
            return Ok(ReadCursor::ready(self, Vec::new()));
        }

        let plan = match self.registry.resolve(
            options.group.as_deref(),
            &tags,
            options.size,
            options.rebuild,
        ) {
            ResolvePlan::Cached { sub_groups } => ReadPlan::Cached { sub_groups },
            ResolvePlan::Build { chunks, existing } => ReadPlan::Build { chunks, existing },
        };
        debug!(
            tags = tags.len(),
            group = ?options.group,
            sync = options.sync,
            source = %options.source,
            "Read planned"
        );
        Ok(ReadCursor::new(self, options, plan))
    }

    /// Reads one tag with the default options, returning only its value.
    pub async fn get(&mut self, tag: &str) -> GatewayResult<Option<Value>> {
        let options = self.settings.read_defaults.clone();
        let results = self.cursor(vec![tag.to_string()], options)?.collect().await?;
        Ok(results.into_iter().next().and_then(|r| r.value))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Writes tag/value pairs, shaping the output by how they were passed.
    pub async fn write(
        &mut self,
        pairs: impl Into<WriteArg>,
        options: WriteOptions,
    ) -> GatewayResult<WriteOutput> {
        let (pairs, single) = pairs.into().normalize();
        self.ensure_connected()?;
        let results = WriteCursor::new(self, pairs, options).collect().await?;
        Ok(WriteOutput::from_results(results, single))
    }

    /// Writes tag/value pairs incrementally.
    pub fn iwrite(
        &mut self,
        pairs: impl Into<WriteArg>,
        options: WriteOptions,
    ) -> GatewayResult<WriteCursor<'_>> {
        let (pairs, _) = pairs.into().normalize();
        self.ensure_connected()?;
        Ok(WriteCursor::new(self, pairs, options))
    }

    /// Writes one value with the default options.
    pub async fn set(&mut self, tag: &str, value: impl Into<Value>) -> GatewayResult<WriteStatus> {
        let options = self.settings.write_defaults.clone();
        self.ensure_connected()?;
        let results: Vec<WriteResult> =
            WriteCursor::new(self, vec![(tag.to_string(), value.into())], options)
                .collect()
                .await?;
        Ok(results
            .into_iter()
            .next()
            .map_or(WriteStatus::Error, |r| r.status))
    }

    // =========================================================================
    // Groups
    // =========================================================================

    /// Removes named groups. Returns `true` if any sub-group was deleted.
    ///
    /// Unknown names are ignored.
    pub async fn remove(&mut self, groups: impl Into<GroupArg>) -> GatewayResult<bool> {
        let mut deleted = false;
        for group in groups.into().into_names() {
            if !self.registry.contains(&group) {
                continue;
            }
            deleted |= reconcile::remove_group(
                &mut *self.provider,
                &self.tracer,
                &mut self.registry,
                &group,
            )
            .await?;
        }
        Ok(deleted)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("class", &self.class)
            .field("server", &self.server)
            .field("host", &self.host)
            .field("connected", &self.connected)
            .field("groups", &self.registry.names())
            .finish()
    }
}
