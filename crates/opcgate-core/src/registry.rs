// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Named tag-group registry.
//!
//! A named group is split into sub-groups of at most `size` tags, named
//! `"{group}.{index}"`. Each sub-group maps to one provider subscription and
//! remembers which tags were requested, which were accepted, and the handles
//! the provider and the session assigned to them.
//!
//! ```text
//! GroupRegistry
//! └── "Tanks"          GroupEntry
//!     ├── "Tanks.0"    SubGroup { requested, valid, server handles, client handles }
//!     └── "Tanks.1"    SubGroup { ... }
//! ```
//!
//! The registry itself never calls a provider. [`GroupRegistry::resolve`]
//! only decides whether a read can reuse cached sub-groups or needs a build
//! pass; the read engine carries the plan out.

use std::collections::{BTreeMap, HashMap};

use crate::provider::{ClientHandle, EventHook, GroupHandle, ItemCode, ServerHandle};

// =============================================================================
// SubGroup
// =============================================================================

/// Bookkeeping for one provider subscription.
#[derive(Debug)]
pub struct SubGroup {
    pub(crate) name: String,
    pub(crate) handle: GroupHandle,
    pub(crate) requested: Vec<String>,
    pub(crate) valid: Vec<String>,
    pub(crate) server_handles: HashMap<String, ServerHandle>,
    pub(crate) tags_by_client_handle: BTreeMap<ClientHandle, String>,
    pub(crate) rejected: HashMap<String, ItemCode>,
    pub(crate) hook: Option<EventHook>,
    first_client: ClientHandle,
}

impl SubGroup {
    /// Creates an empty sub-group for a provider subscription.
    pub fn new(name: impl Into<String>, handle: GroupHandle) -> Self {
        Self {
            name: name.into(),
            handle,
            requested: Vec::new(),
            valid: Vec::new(),
            server_handles: HashMap::new(),
            tags_by_client_handle: BTreeMap::new(),
            rejected: HashMap::new(),
            hook: None,
            first_client: ClientHandle(0),
        }
    }

    /// Sets the client handle given to the first item.
    pub(crate) fn with_first_client_handle(mut self, first: ClientHandle) -> Self {
        self.first_client = first;
        self
    }

    /// Sub-group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Provider group handle.
    pub fn handle(&self) -> GroupHandle {
        self.handle
    }

    /// Tags last requested for this sub-group.
    pub fn requested(&self) -> &[String] {
        &self.requested
    }

    /// Tags the provider accepted, in acceptance order.
    pub fn valid(&self) -> &[String] {
        &self.valid
    }

    /// Server handle of an accepted tag.
    pub fn server_handle(&self, tag: &str) -> Option<ServerHandle> {
        self.server_handles.get(tag).copied()
    }

    /// Tag registered under a client handle.
    pub fn tag_for(&self, handle: ClientHandle) -> Option<&str> {
        self.tags_by_client_handle.get(&handle).map(String::as_str)
    }

    /// Status code the provider gave a rejected tag.
    pub fn rejection(&self, tag: &str) -> Option<ItemCode> {
        self.rejected.get(tag).copied()
    }

    /// Returns `true` if an event hook is attached.
    pub fn has_hook(&self) -> bool {
        self.hook.is_some()
    }

    /// Server handles of the accepted tags, parallel to [`SubGroup::valid`].
    pub fn valid_server_handles(&self) -> Vec<ServerHandle> {
        self.valid
            .iter()
            .filter_map(|tag| self.server_handles.get(tag).copied())
            .collect()
    }

    /// Next free client handle: one past the highest in use, or the first
    /// handle when none is in use.
    pub(crate) fn next_client_handle(&self) -> ClientHandle {
        self.tags_by_client_handle
            .keys()
            .next_back()
            .map_or(self.first_client, |h| ClientHandle(h.0 + 1))
    }

    /// Records an accepted tag.
    pub(crate) fn accept(&mut self, tag: &str, server: ServerHandle) {
        self.server_handles.insert(tag.to_string(), server);
        self.rejected.remove(tag);
        if !self.valid.iter().any(|t| t == tag) {
            self.valid.push(tag.to_string());
        }
    }

    /// Records a rejected tag and releases its client handle.
    pub(crate) fn reject(&mut self, tag: &str, code: ItemCode, client: Option<ClientHandle>) {
        self.rejected.insert(tag.to_string(), code);
        if let Some(client) = client {
            self.tags_by_client_handle.remove(&client);
        }
    }

    /// Forgets a removed tag entirely.
    pub(crate) fn forget(&mut self, tag: &str) {
        self.server_handles.remove(tag);
        self.valid.retain(|t| t != tag);
        self.tags_by_client_handle.retain(|_, t| t != tag);
    }

    /// Checks the bookkeeping invariants.
    ///
    /// Every accepted tag was requested (when a request has been recorded)
    /// and has a server handle and a client handle.
    pub fn is_consistent(&self) -> bool {
        self.valid.iter().all(|tag| {
            (self.requested.is_empty() || self.requested.contains(tag))
                && self.server_handles.contains_key(tag)
                && self.tags_by_client_handle.values().any(|t| t == tag)
        })
    }
}

// =============================================================================
// GroupEntry
// =============================================================================

/// The sub-groups of one named group, indexed from zero.
#[derive(Debug, Default)]
pub struct GroupEntry {
    sub_groups: Vec<SubGroup>,
}

impl GroupEntry {
    /// Number of sub-groups.
    pub fn len(&self) -> usize {
        self.sub_groups.len()
    }

    /// Returns `true` if the group has no sub-groups.
    pub fn is_empty(&self) -> bool {
        self.sub_groups.is_empty()
    }

    /// Sub-groups in index order.
    pub fn sub_groups(&self) -> &[SubGroup] {
        &self.sub_groups
    }

    pub(crate) fn into_sub_groups(self) -> Vec<SubGroup> {
        self.sub_groups
    }
}

// =============================================================================
// ResolvePlan
// =============================================================================

/// What a read must do with a group before reading it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvePlan {
    /// Reuse the cached sub-groups as they are.
    Cached {
        /// Number of cached sub-groups.
        sub_groups: usize,
    },
    /// Build (or rebuild) sub-groups from these chunks.
    Build {
        /// Tag chunks, one per sub-group.
        chunks: Vec<Vec<String>>,
        /// Sub-groups that already exist and must be reconciled.
        existing: usize,
    },
}

// =============================================================================
// GroupRegistry
// =============================================================================

/// Registry of named groups held by a session.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: BTreeMap<String, GroupEntry>,
}

impl GroupRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the group is registered.
    pub fn contains(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    /// Registered group names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }

    /// Number of registered groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Looks up a group.
    pub fn get(&self, group: &str) -> Option<&GroupEntry> {
        self.groups.get(group)
    }

    /// Decides how a read of `tags` against `group` proceeds.
    ///
    /// A registered group is reused unless `rebuild` is set. Anonymous
    /// groups always build.
    pub fn resolve(
        &self,
        group: Option<&str>,
        tags: &[String],
        size: Option<usize>,
        rebuild: bool,
    ) -> ResolvePlan {
        let existing = group.and_then(|g| self.groups.get(g));

        match existing {
            Some(entry) if !rebuild => ResolvePlan::Cached {
                sub_groups: entry.len(),
            },
            _ => ResolvePlan::Build {
                chunks: partition(tags, size),
                existing: existing.map_or(0, GroupEntry::len),
            },
        }
    }

    pub(crate) fn sub_group_mut(&mut self, group: &str, index: usize) -> Option<&mut SubGroup> {
        self.groups
            .get_mut(group)
            .and_then(|entry| entry.sub_groups.get_mut(index))
    }

    /// Stores a sub-group at `index`, replacing or appending.
    pub(crate) fn store(&mut self, group: &str, index: usize, sub: SubGroup) {
        let entry = self.groups.entry(group.to_string()).or_default();
        if index < entry.sub_groups.len() {
            entry.sub_groups[index] = sub;
        } else {
            entry.sub_groups.push(sub);
        }
    }

    /// Detaches sub-groups from index `keep` onward.
    pub(crate) fn split_off(&mut self, group: &str, keep: usize) -> Vec<SubGroup> {
        match self.groups.get_mut(group) {
            Some(entry) if keep < entry.sub_groups.len() => entry.sub_groups.split_off(keep),
            _ => Vec::new(),
        }
    }

    /// Removes a group from the registry.
    pub(crate) fn take(&mut self, group: &str) -> Option<GroupEntry> {
        self.groups.remove(group)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Name of sub-group `index` of `group`.
pub fn sub_group_name(group: &str, index: usize) -> String {
    format!("{group}.{index}")
}

/// Splits tags into chunks of at most `size`.
///
/// Without a size (or with zero) everything goes in one chunk, even when
/// `tags` is empty.
pub fn partition(tags: &[String], size: Option<usize>) -> Vec<Vec<String>> {
    match size {
        Some(size) if size > 0 => tags.chunks(size).map(<[String]>::to_vec).collect(),
        _ => vec![tags.to_vec()],
    }
}

/// Items to add and remove when a sub-group is rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDelta {
    /// Requested tags that are not currently accepted.
    pub add: Vec<String>,
    /// Accepted tags that are no longer requested.
    pub remove: Vec<String>,
}

impl ItemDelta {
    /// Computes the delta from the accepted tags to the requested ones.
    pub fn between(requested: &[String], valid: &[String]) -> Self {
        let mut add: Vec<String> = Vec::new();
        for tag in requested {
            if !valid.contains(tag) && !add.contains(tag) {
                add.push(tag.clone());
            }
        }
        let remove = valid
            .iter()
            .filter(|tag| !requested.contains(tag))
            .cloned()
            .collect();
        Self { add, remove }
    }

    /// Returns `true` if nothing changes.
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}
