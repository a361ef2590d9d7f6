//! In-memory table of live sessions.
//!
//! The registry is the only shared mutable structure in the server. It is
//! injected into the dispatcher and the sweeper (no ambient singleton), so
//! tests can instantiate isolated registries. All five operations are atomic
//! with respect to each other; concurrent `get` + `touch` for the same id may
//! lose a timestamp update (last-writer-wins) but never an entry.

use crate::session::transport::SessionTransport;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

struct SessionEntry {
    transport: Arc<SessionTransport>,
    last_activity: Instant,
}

/// Process-wide session table: id → (transport, last-activity).
///
/// Empty at startup; populated by handshakes; pruned by explicit close and the
/// eviction sweep.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transport under a freshly generated id and return the id.
    ///
    /// Ids are UUIDv4; the insert happens under the write lock, so a collision
    /// with a live id (however unlikely) is detected and retried rather than
    /// clobbering the existing session.
    pub async fn create(&self, transport: Arc<SessionTransport>) -> String {
        let mut sessions = self.sessions.write().await;
        loop {
            let id = Uuid::new_v4().to_string();
            if sessions.contains_key(&id) {
                continue;
            }
            sessions.insert(
                id.clone(),
                SessionEntry {
                    transport,
                    last_activity: Instant::now(),
                },
            );
            return id;
        }
    }

    /// Look up a session's transport.
    pub async fn get(&self, id: &str) -> Option<Arc<SessionTransport>> {
        let sessions = self.sessions.read().await;
        sessions.get(id).map(|entry| entry.transport.clone())
    }

    /// Refresh a session's activity timestamp. No-op when the id is unknown
    /// (already evicted); the caller must treat that as a fresh "unknown
    /// session" condition.
    pub async fn touch(&self, id: &str) -> bool {
        self.touch_at(id, Instant::now()).await
    }

    /// `touch` with an explicit clock, used by tests exercising the eviction
    /// arithmetic.
    pub async fn touch_at(&self, id: &str, now: Instant) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(entry) => {
                entry.last_activity = now;
                true
            }
            None => false,
        }
    }

    /// Remove a session, returning its transport so the caller can close it.
    /// Idempotent: removing an absent id returns `None` without error.
    pub async fn remove(&self, id: &str) -> Option<Arc<SessionTransport>> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id).map(|entry| entry.transport)
    }

    /// Remove and return every session inactive for longer than `ttl` as of
    /// `now`. The caller is responsible for closing the returned transports,
    /// outside any registry lock.
    pub async fn sweep_expired(
        &self,
        now: Instant,
        ttl: Duration,
    ) -> Vec<(String, Arc<SessionTransport>)> {
        let mut sessions = self.sessions.write().await;
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, entry)| {
                now.saturating_duration_since(entry.last_activity) > ttl
            })
            .map(|(id, _)| id.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|id| {
                sessions
                    .remove(&id)
                    .map(|entry| (id, entry.transport))
            })
            .collect()
    }

    /// Remove and return every session, for graceful shutdown.
    pub async fn drain_all(&self) -> Vec<(String, Arc<SessionTransport>)> {
        let mut sessions = self.sessions.write().await;
        sessions
            .drain()
            .map(|(id, entry)| (id, entry.transport))
            .collect()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
