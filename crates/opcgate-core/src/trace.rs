// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Provider call tracing.
//!
//! Every provider call is logged at `TRACE` level and, when a hook is set,
//! handed to the hook as a one-line label such as `AddItems(Random.Int4)`.

use std::fmt;
use std::sync::Arc;

use crate::error::Operation;

/// Callback receiving one label per provider call.
pub type TraceHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Emits provider-call labels.
#[derive(Clone, Default)]
pub struct Tracer {
    hook: Option<TraceHook>,
}

impl Tracer {
    /// Creates a tracer without a hook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs or clears the hook.
    pub fn set_hook(&mut self, hook: Option<TraceHook>) {
        self.hook = hook;
    }

    /// Returns `true` if a hook is installed.
    pub fn has_hook(&self) -> bool {
        self.hook.is_some()
    }

    /// Records a provider call.
    pub fn emit(&self, op: Operation, detail: impl fmt::Display) {
        let label = format!("{op}({detail})");
        tracing::trace!(operation = op.as_str(), "{label}");
        if let Some(hook) = &self.hook {
            hook(&label);
        }
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

/// Joins tags for a trace label.
pub(crate) fn join(tags: &[String]) -> String {
    tags.join(",")
}
