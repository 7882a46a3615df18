// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Multi-session host.
//!
//! The gateway hands out sessions to remote callers and keeps track of who
//! holds them. Each session sits behind its own async mutex, so callers on
//! different sessions never wait on each other while calls on one session
//! are serialised.
//!
//! ```text
//! Gateway
//! ├── factory        ProviderFactory shared by every session
//! ├── settings       SessionSettings template
//! └── sessions       DashMap<SessionId, SessionSlot>
//!                    └── Arc<Mutex<Session>> + host / created / last activity
//! ```

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{GatewayError, GatewayResult};
use crate::provider::ProviderFactory;
use crate::session::Session;
use crate::settings::SessionSettings;

/// Identifier of a hosted session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Public view of a hosted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session identifier.
    pub id: SessionId,
    /// Remote host that created the session.
    pub host: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last acquire.
    pub last_activity: DateTime<Utc>,
}

struct SessionSlot {
    session: Arc<Mutex<Session>>,
    host: String,
    created_at: DateTime<Utc>,
    last_activity: RwLock<DateTime<Utc>>,
}

impl SessionSlot {
    fn summary(&self, id: SessionId) -> SessionSummary {
        SessionSummary {
            id,
            host: self.host.clone(),
            created_at: self.created_at,
            last_activity: *self.last_activity.read(),
        }
    }
}

/// Hosts sessions for remote callers.
pub struct Gateway {
    factory: Arc<dyn ProviderFactory>,
    settings: SessionSettings,
    max_sessions: Option<usize>,
    /// Sessions hosted or being opened; bounded by `max_sessions`.
    reserved: AtomicUsize,
    sessions: DashMap<SessionId, SessionSlot>,
}

impl Gateway {
    /// Creates a gateway opening sessions with `settings`.
    pub fn new(factory: Arc<dyn ProviderFactory>, settings: SessionSettings) -> Self {
        Self {
            factory,
            settings,
            max_sessions: None,
            reserved: AtomicUsize::new(0),
            sessions: DashMap::new(),
        }
    }

    /// Limits the number of concurrent sessions.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = Some(max);
        self
    }

    /// Opens a session on behalf of `remote_host`.
    pub fn create_session(&self, remote_host: impl Into<String>) -> GatewayResult<SessionId> {
        self.reserve_slot()?;
        let session = match Session::open(self.factory.as_ref(), self.settings.clone()) {
            Ok(session) => session,
            Err(error) => {
                self.reserved.fetch_sub(1, Ordering::AcqRel);
                return Err(error);
            }
        };
        let id = SessionId::new();
        let host = remote_host.into();
        let now = Utc::now();

        info!(session = %id, host = %host, class = session.class(), "Session created");
        self.sessions.insert(
            id,
            SessionSlot {
                session: Arc::new(Mutex::new(session)),
                host,
                created_at: now,
                last_activity: RwLock::new(now),
            },
        );
        Ok(id)
    }

    /// Locks a session for exclusive use and records the activity.
    pub async fn acquire(&self, id: SessionId) -> GatewayResult<OwnedMutexGuard<Session>> {
        let session = {
            let slot = self
                .sessions
                .get(&id)
                .ok_or_else(|| unknown_session(id))?;
            *slot.last_activity.write() = Utc::now();
            Arc::clone(&slot.session)
        };
        Ok(session.lock_owned().await)
    }

    /// Closes and forgets a session. Returns `false` for an unknown id.
    pub async fn release_session(&self, id: SessionId) -> GatewayResult<bool> {
        let Some((_, slot)) = self.sessions.remove(&id) else {
            return Ok(false);
        };
        self.reserved.fetch_sub(1, Ordering::AcqRel);

        let mut session = slot.session.lock().await;
        if session.is_connected() {
            if let Err(error) = session.close().await {
                warn!(session = %id, "Close on release failed: {error}");
            }
        }
        info!(session = %id, host = %slot.host, "Session released");
        Ok(true)
    }

    /// Claims a slot under the session limit.
    fn reserve_slot(&self) -> GatewayResult<()> {
        let max = self.max_sessions.unwrap_or(usize::MAX);
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|_| GatewayError::configuration(format!("session limit of {max} reached")))
    }

    /// Summaries of every hosted session, oldest first.
    pub fn sessions(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| entry.value().summary(*entry.key()))
            .collect();
        summaries.sort_by_key(|s| s.created_at);
        summaries
    }

    /// Number of hosted sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no sessions are hosted.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("sessions", &self.sessions.len())
            .field("max_sessions", &self.max_sessions)
            .finish()
    }
}

fn unknown_session(id: SessionId) -> GatewayError {
    GatewayError::invalid_argument(format!("unknown session {id}"))
}
