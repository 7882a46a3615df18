// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Batched read engine.
//!
//! A read walks its sub-groups one at a time and yields a [`TagResult`] per
//! requested tag, in request order within each sub-group. For every
//! sub-group it:
//!
//! 1. creates, reconciles or reuses the provider subscription,
//! 2. picks the data source ([`ReadSource::resolve`]),
//! 3. reads synchronously, or refreshes asynchronously and waits for the
//!    data change carrying its transaction id,
//! 4. maps results back to tags, reporting rejected tags as errors.
//!
//! Anonymous reads build throw-away subscriptions that are torn down after
//! each sub-group. Named reads keep theirs in the session's
//! [`GroupRegistry`](crate::registry::GroupRegistry).

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{strip_newlines, GatewayError, GatewayResult, Operation};
use crate::provider::{DataChange, EventHook, ItemCode, PointProvider, TransactionId, S_OK};
use crate::reconcile;
use crate::registry::{sub_group_name, ItemDelta, SubGroup};
use crate::session::Session;
use crate::trace::Tracer;
use crate::types::{DataSource, Quality, ReadSource, TagResult, Value};

/// Update rate meaning "let the provider decide".
pub const DEFAULT_UPDATE_RATE: i32 = -1;

/// Default wait for an asynchronous data change.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(5000);

// =============================================================================
// ReadOptions
// =============================================================================

/// Options of a read.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use opcgate_core::read::ReadOptions;
///
/// let options = ReadOptions::new()
///     .group("Tanks")
///     .size(50)
///     .timeout(Duration::from_secs(2));
/// assert_eq!(options.group.as_deref(), Some("Tanks"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOptions {
    /// Named group to cache sub-groups under; anonymous when `None`.
    pub group: Option<String>,
    /// Maximum tags per sub-group.
    pub size: Option<usize>,
    /// Pause between sub-groups.
    pub pause: Duration,
    /// Source policy.
    pub source: ReadSource,
    /// Update rate requested for new subscriptions.
    pub update_rate: i32,
    /// Wait for an asynchronous data change.
    pub timeout: Duration,
    /// Read synchronously instead of refreshing.
    pub sync: bool,
    /// Attach provider messages to results. Implies `sync`.
    pub include_error: bool,
    /// Rebuild a named group from the given tags.
    pub rebuild: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            group: None,
            size: None,
            pause: Duration::ZERO,
            source: ReadSource::Hybrid,
            update_rate: DEFAULT_UPDATE_RATE,
            timeout: DEFAULT_READ_TIMEOUT,
            sync: false,
            include_error: false,
            rebuild: false,
        }
    }
}

impl ReadOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the group name.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Sets the sub-group size.
    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the pause between sub-groups.
    pub fn pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Sets the source policy.
    pub fn source(mut self, source: ReadSource) -> Self {
        self.source = source;
        self
    }

    /// Sets the update rate.
    pub fn update_rate(mut self, rate: i32) -> Self {
        self.update_rate = rate;
        self
    }

    /// Sets the asynchronous wait.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Requests a synchronous read.
    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Requests provider messages in results.
    pub fn include_error(mut self, include: bool) -> Self {
        self.include_error = include;
        self
    }

    /// Requests a rebuild of the named group.
    pub fn rebuild(mut self, rebuild: bool) -> Self {
        self.rebuild = rebuild;
        self
    }

    /// Applies the implications between options.
    ///
    /// Error text is only available from synchronous reads, and synchronous
    /// reads always use the provider's update rate.
    pub fn normalized(mut self) -> Self {
        if self.include_error {
            self.sync = true;
        }
        if self.sync {
            self.update_rate = DEFAULT_UPDATE_RATE;
        }
        self
    }
}

// =============================================================================
// TransactionCounter
// =============================================================================

/// Issues transaction ids for asynchronous refreshes.
///
/// Ids start at 1 and wrap from `0xFFFF` to 0.
#[derive(Debug, Clone, Default)]
pub struct TransactionCounter {
    last: u16,
}

impl TransactionCounter {
    /// Creates a counter whose first id is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next id.
    pub fn next_id(&mut self) -> TransactionId {
        self.last = self.last.wrapping_add(1);
        TransactionId(self.last)
    }
}

// =============================================================================
// ReadCursor
// =============================================================================

#[derive(Debug)]
pub(crate) enum ReadPlan {
    /// Results are already known.
    Ready,
    /// Reuse cached sub-groups of a named group.
    Cached { sub_groups: usize },
    /// Build sub-groups from chunks.
    Build {
        chunks: Vec<Vec<String>>,
        existing: usize,
    },
}

impl ReadPlan {
    fn len(&self) -> usize {
        match self {
            Self::Ready => 0,
            Self::Cached { sub_groups } => *sub_groups,
            Self::Build { chunks, .. } => chunks.len(),
        }
    }
}

/// Incremental read, yielding one result at a time.
///
/// Sub-groups are read lazily: the provider is only touched when the
/// results of the previous sub-group are used up. An error ends the cursor.
///
/// ```no_run
/// # use opcgate_core::{Session, read::ReadOptions};
/// # async fn demo(session: &mut Session) -> opcgate_core::GatewayResult<()> {
/// let mut cursor = session.iread(vec!["Random.Int4", "Random.Real8"], ReadOptions::new())?;
/// while let Some(result) = cursor.next().await {
///     let result = result?;
///     println!("{} = {:?} ({})", result.tag, result.value, result.quality);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ReadCursor<'s> {
    session: &'s mut Session,
    options: ReadOptions,
    plan: ReadPlan,
    index: usize,
    pending: VecDeque<TagResult>,
    prepared: bool,
    done: bool,
}

impl<'s> ReadCursor<'s> {
    pub(crate) fn new(session: &'s mut Session, options: ReadOptions, plan: ReadPlan) -> Self {
        Self {
            session,
            options,
            plan,
            index: 0,
            pending: VecDeque::new(),
            prepared: false,
            done: false,
        }
    }

    pub(crate) fn ready(session: &'s mut Session, results: Vec<TagResult>) -> Self {
        let mut cursor = Self::new(session, ReadOptions::default(), ReadPlan::Ready);
        cursor.pending.extend(results);
        cursor
    }

    /// Returns the next result, or `None` when the read is complete.
    pub async fn next(&mut self) -> Option<GatewayResult<TagResult>> {
        loop {
            if let Some(result) = self.pending.pop_front() {
                return Some(Ok(result));
            }
            if self.done {
                return None;
            }
            match self.step().await {
                Ok(Some(results)) => self.pending.extend(results),
                Ok(None) => self.done = true,
                Err(error) => {
                    self.done = true;
                    self.discard_unfinished_group().await;
                    return Some(Err(error));
                }
            }
        }
    }

    /// Drains the cursor into a list.
    pub async fn collect(mut self) -> GatewayResult<Vec<TagResult>> {
        let mut results = Vec::new();
        while let Some(result) = self.next().await {
            results.push(result?);
        }
        Ok(results)
    }

    async fn step(&mut self) -> GatewayResult<Option<Vec<TagResult>>> {
        if !self.prepared {
            self.prepared = true;
            self.trim_extra_sub_groups().await?;
        }
        if self.index >= self.plan.len() {
            return Ok(None);
        }

        let index = self.index;
        self.index += 1;
        if index > 0 && !self.options.pause.is_zero() {
            tokio::time::sleep(self.options.pause).await;
        }
        self.read_sub_group(index).await.map(Some)
    }

    /// Drops a group whose first build failed, so the next read builds it
    /// again instead of reusing a partial entry.
    async fn discard_unfinished_group(&mut self) {
        let (ReadPlan::Build { existing: 0, .. }, Some(group)) =
            (&self.plan, self.options.group.as_deref())
        else {
            return;
        };

        let Session {
            provider,
            registry,
            tracer,
            ..
        } = &mut *self.session;
        debug!(group, "Discarding partially built group");
        reconcile::discard_group(&mut **provider, tracer, registry, group).await;
    }

    /// Tears down sub-groups a rebuild no longer needs.
    async fn trim_extra_sub_groups(&mut self) -> GatewayResult<()> {
        let (ReadPlan::Build { chunks, existing }, Some(group)) =
            (&self.plan, self.options.group.as_deref())
        else {
            return Ok(());
        };
        if *existing <= chunks.len() {
            return Ok(());
        }

        let Session {
            provider,
            registry,
            tracer,
            ..
        } = &mut *self.session;
        for sub in registry.split_off(group, chunks.len()) {
            debug!(sub_group = %sub.name(), "Dropping sub-group after rebuild");
            reconcile::teardown(&mut **provider, tracer, sub).await?;
        }
        Ok(())
    }

    async fn read_sub_group(&mut self, index: usize) -> GatewayResult<Vec<TagResult>> {
        let Session {
            provider,
            registry,
            tracer,
            transactions,
            ..
        } = &mut *self.session;
        let provider: &mut dyn PointProvider = &mut **provider;
        let opts = &self.options;

        match (&self.plan, opts.group.as_deref()) {
            (ReadPlan::Build { chunks, .. }, None) => {
                let chunk = &chunks[index];
                let mut sub =
                    reconcile::create_sub_group(provider, tracer, None, opts.update_rate).await?;
                let outcome =
                    read_anonymous(provider, tracer, transactions, &mut sub, chunk, opts).await;

                let teardown = reconcile::teardown(provider, tracer, sub).await;
                let results = outcome?;
                teardown?;
                Ok(results)
            }
            (ReadPlan::Build { chunks, existing }, Some(group)) => {
                let chunk = &chunks[index];
                let source = opts.source.resolve(true);

                if index < *existing {
                    let sub = registry
                        .sub_group_mut(group, index)
                        .ok_or_else(|| missing_sub_group(group, index))?;
                    let delta = ItemDelta::between(chunk, &sub.valid);
                    debug!(
                        sub_group = %sub.name,
                        add = delta.add.len(),
                        remove = delta.remove.len(),
                        "Rebuilding sub-group"
                    );
                    // Removal can fail; nothing is committed before it succeeds.
                    reconcile::remove_items(provider, tracer, sub, &delta.remove).await?;
                    reconcile::add_items(provider, tracer, sub, &delta.add).await;
                    sub.requested = chunk.clone();
                    if !opts.sync {
                        reconcile::ensure_hook(provider, tracer, sub).await?;
                    }
                    collect_results(provider, tracer, transactions, sub, opts, source).await
                } else {
                    let name = sub_group_name(group, index);
                    let sub =
                        reconcile::create_sub_group(provider, tracer, Some(name), opts.update_rate)
                            .await?;
                    registry.store(group, index, sub);
                    let sub = registry
                        .sub_group_mut(group, index)
                        .ok_or_else(|| missing_sub_group(group, index))?;

                    if !opts.sync {
                        reconcile::ensure_hook(provider, tracer, sub).await?;
                    }
                    reconcile::add_items(provider, tracer, sub, chunk).await;
                    sub.requested = chunk.clone();
                    collect_results(provider, tracer, transactions, sub, opts, source).await
                }
            }
            (ReadPlan::Cached { .. }, Some(group)) => {
                let sub = registry
                    .sub_group_mut(group, index)
                    .ok_or_else(|| missing_sub_group(group, index))?;
                if !opts.sync {
                    reconcile::ensure_hook(provider, tracer, sub).await?;
                }
                let source = opts.source.resolve(false);
                collect_results(provider, tracer, transactions, sub, opts, source).await
            }
            (ReadPlan::Cached { .. }, None) | (ReadPlan::Ready, _) => Ok(Vec::new()),
        }
    }
}

/// Reads one throw-away sub-group. The caller tears it down.
async fn read_anonymous(
    provider: &mut dyn PointProvider,
    tracer: &Tracer,
    transactions: &mut TransactionCounter,
    sub: &mut SubGroup,
    chunk: &[String],
    opts: &ReadOptions,
) -> GatewayResult<Vec<TagResult>> {
    if !opts.sync {
        reconcile::ensure_hook(provider, tracer, sub).await?;
    }
    reconcile::add_items(provider, tracer, sub, chunk).await;
    sub.requested = chunk.to_vec();
    let source = opts.source.resolve(true);
    collect_results(provider, tracer, transactions, sub, opts, source).await
}

fn missing_sub_group(group: &str, index: usize) -> GatewayError {
    GatewayError::invalid_argument(format!(
        "group '{group}' has no sub-group {}",
        sub_group_name(group, index)
    ))
}

// =============================================================================
// Result collection
// =============================================================================

struct ItemOutcome {
    value: Value,
    quality: u16,
    timestamp: Option<DateTime<Utc>>,
    code: ItemCode,
}

/// Reads a prepared sub-group and maps the results onto its requested tags.
async fn collect_results(
    provider: &mut dyn PointProvider,
    tracer: &Tracer,
    transactions: &mut TransactionCounter,
    sub: &mut SubGroup,
    opts: &ReadOptions,
    source: DataSource,
) -> GatewayResult<Vec<TagResult>> {
    let mut outcomes: HashMap<String, ItemOutcome> = HashMap::new();

    if !sub.valid.is_empty() {
        if opts.sync {
            let handles = sub.valid_server_handles();
            tracer.emit(Operation::SyncRead, source);
            let reads = provider
                .sync_read(sub.handle, source, &handles)
                .await
                .map_err(|f| GatewayError::provider_fault(Operation::SyncRead.as_str(), &f))?;

            for (tag, read) in sub.valid.iter().zip(reads) {
                outcomes.insert(
                    tag.clone(),
                    ItemOutcome {
                        value: read.value,
                        quality: read.quality,
                        timestamp: read.timestamp,
                        code: read.code,
                    },
                );
            }
        } else {
            let transaction = transactions.next_id();
            tracer.emit(Operation::AsyncRefresh, source);
            provider
                .async_refresh(sub.handle, source, transaction)
                .await
                .map_err(|f| GatewayError::provider_fault(Operation::AsyncRefresh.as_str(), &f))?;

            let hook = sub.hook.as_mut().ok_or_else(|| {
                GatewayError::provider(Operation::Callback.as_str(), "no event hook attached")
            })?;
            let change = wait_for_transaction(hook, transaction, opts.timeout).await?;

            for (client, value, quality, timestamp) in change.rows() {
                if let Some(tag) = sub.tags_by_client_handle.get(&client) {
                    outcomes.insert(
                        tag.clone(),
                        ItemOutcome {
                            value: value.clone(),
                            quality,
                            timestamp,
                            code: S_OK,
                        },
                    );
                }
            }
        }
    }

    let describe = |code: ItemCode| -> String {
        provider
            .error_string(code)
            .map(|text| strip_newlines(&text))
            .unwrap_or_else(|| code.to_string())
    };

    let results = sub
        .requested
        .iter()
        .map(|tag| match outcomes.get(tag) {
            Some(outcome) if outcome.code == S_OK => TagResult {
                tag: tag.clone(),
                value: Some(outcome.value.clone()),
                quality: Quality::from_bits(outcome.quality),
                timestamp: outcome.timestamp,
                error: opts.include_error.then(|| describe(S_OK)),
            },
            Some(outcome) => {
                TagResult::failed(tag.clone(), opts.include_error.then(|| describe(outcome.code)))
            }
            None => TagResult::failed(
                tag.clone(),
                opts.include_error
                    .then(|| sub.rejection(tag).map(&describe).unwrap_or_default()),
            ),
        })
        .collect();

    Ok(results)
}

/// Waits for the data change answering `transaction`.
///
/// Changes for other transactions are discarded. The deadline covers the
/// whole wait, not each received change.
pub(crate) async fn wait_for_transaction(
    hook: &mut EventHook,
    transaction: TransactionId,
    timeout: Duration,
) -> GatewayResult<DataChange> {
    let deadline = Instant::now() + timeout;

    loop {
        match tokio::time::timeout_at(deadline, hook.recv()).await {
            Err(_) => return Err(GatewayError::timeout(Operation::Callback.as_str(), timeout)),
            Ok(None) => {
                return Err(GatewayError::provider(
                    Operation::Callback.as_str(),
                    "event channel closed",
                ))
            }
            Ok(Some(change)) if change.transaction_id == transaction => return Ok(change),
            Ok(Some(change)) => {
                trace!(
                    sub_group = hook.sub_group(),
                    expected = %transaction,
                    received = %change.transaction_id,
                    "Discarding stale data change"
                );
            }
        }
    }
}
