// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Batched write engine.
//!
//! Writes always go through throw-away subscriptions: each chunk of pairs
//! gets its own provider group, its tags are validated and added, accepted
//! values are written synchronously, and the group is deleted again.
//! Client handles in a write group start at 1.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::error::{strip_newlines, GatewayError, GatewayResult, Operation};
use crate::provider::{ClientHandle, ItemCode, PointProvider, S_OK};
use crate::read::DEFAULT_UPDATE_RATE;
use crate::reconcile;
use crate::registry::SubGroup;
use crate::session::Session;
use crate::trace::{join, Tracer};
use crate::types::{Value, WriteResult, WriteStatus};

/// Options of a write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Maximum pairs per chunk.
    pub size: Option<usize>,
    /// Pause between chunks.
    pub pause: Duration,
    /// Attach provider messages to results.
    pub include_error: bool,
}

impl WriteOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the chunk size.
    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the pause between chunks.
    pub fn pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Requests provider messages in results.
    pub fn include_error(mut self, include: bool) -> Self {
        self.include_error = include;
        self
    }
}

/// Incremental write, yielding one result at a time.
#[derive(Debug)]
pub struct WriteCursor<'s> {
    session: &'s mut Session,
    options: WriteOptions,
    chunks: VecDeque<Vec<(String, Value)>>,
    pending: VecDeque<WriteResult>,
    started: bool,
    done: bool,
}

impl<'s> WriteCursor<'s> {
    pub(crate) fn new(
        session: &'s mut Session,
        pairs: Vec<(String, Value)>,
        options: WriteOptions,
    ) -> Self {
        let chunks: VecDeque<Vec<(String, Value)>> = match options.size {
            Some(size) if size > 0 => pairs.chunks(size).map(<[_]>::to_vec).collect(),
            _ if pairs.is_empty() => VecDeque::new(),
            _ => VecDeque::from([pairs]),
        };
        Self {
            session,
            options,
            chunks,
            pending: VecDeque::new(),
            started: false,
            done: false,
        }
    }

    /// Returns the next result, or `None` when the write is complete.
    pub async fn next(&mut self) -> Option<GatewayResult<WriteResult>> {
        loop {
            if let Some(result) = self.pending.pop_front() {
                return Some(Ok(result));
            }
            if self.done {
                return None;
            }
            let Some(chunk) = self.chunks.pop_front() else {
                self.done = true;
                return None;
            };

            if self.started && !self.options.pause.is_zero() {
                tokio::time::sleep(self.options.pause).await;
            }
            self.started = true;

            let Session {
                provider, tracer, ..
            } = &mut *self.session;
            match write_chunk(&mut **provider, tracer, &chunk, self.options.include_error).await
            {
                Ok(results) => self.pending.extend(results),
                Err(error) => {
                    self.done = true;
                    return Some(Err(error));
                }
            }
        }
    }

    /// Drains the cursor into a list.
    pub async fn collect(mut self) -> GatewayResult<Vec<WriteResult>> {
        let mut results = Vec::new();
        while let Some(result) = self.next().await {
            results.push(result?);
        }
        Ok(results)
    }
}

/// Writes one chunk through a throw-away subscription.
async fn write_chunk(
    provider: &mut dyn PointProvider,
    tracer: &Tracer,
    chunk: &[(String, Value)],
    include_error: bool,
) -> GatewayResult<Vec<WriteResult>> {
    let mut sub = reconcile::create_sub_group(provider, tracer, None, DEFAULT_UPDATE_RATE)
        .await?
        .with_first_client_handle(ClientHandle(1));

    let outcome = write_items(provider, tracer, &mut sub, chunk).await;
    let rejected = std::mem::take(&mut sub.rejected);
    let teardown = reconcile::teardown(provider, tracer, sub).await;
    let codes = outcome?;
    teardown?;

    let describe = |code: ItemCode| -> String {
        provider
            .error_string(code)
            .map(|text| strip_newlines(&text))
            .unwrap_or_else(|| code.to_string())
    };

    Ok(chunk
        .iter()
        .map(|(tag, _)| {
            let code = codes
                .get(tag)
                .or_else(|| rejected.get(tag))
                .copied();
            let status = match code {
                Some(S_OK) => WriteStatus::Success,
                _ => WriteStatus::Error,
            };
            WriteResult {
                tag: tag.clone(),
                status,
                error: include_error.then(|| code.map(&describe).unwrap_or_default()),
            }
        })
        .collect())
}

/// Adds the chunk's tags and writes the accepted ones.
///
/// Returns the write code per accepted tag.
async fn write_items(
    provider: &mut dyn PointProvider,
    tracer: &Tracer,
    sub: &mut SubGroup,
    chunk: &[(String, Value)],
) -> GatewayResult<HashMap<String, ItemCode>> {
    let tags: Vec<String> = chunk.iter().map(|(tag, _)| tag.clone()).collect();
    let accepted = reconcile::add_items(provider, tracer, sub, &tags).await;
    if accepted.is_empty() {
        return Ok(HashMap::new());
    }

    let values_by_tag: HashMap<&str, &Value> =
        chunk.iter().map(|(tag, value)| (tag.as_str(), value)).collect();
    let handles = sub.valid_server_handles();
    let values: Vec<Value> = sub
        .valid
        .iter()
        .filter_map(|tag| values_by_tag.get(tag.as_str()).map(|v| (*v).clone()))
        .collect();

    tracer.emit(Operation::SyncWrite, join(&sub.valid));
    let codes = provider
        .sync_write(sub.handle, &handles, &values)
        .await
        .map_err(|f| GatewayError::provider_fault(Operation::SyncWrite.as_str(), &f))?;

    Ok(sub.valid.iter().cloned().zip(codes).collect())
}
