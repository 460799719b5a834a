//! In-process registry of open traversal sessions.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::traversal::TraversalSession;

struct Entry {
    session: TraversalSession,
    last_touched: Instant,
}

/// Open traversal sessions keyed by a generated UUID v4.
///
/// A session is only driven by the caller holding its id; the lock only
/// guards the map itself. Sessions idle for longer than `idle_ttl` are
/// dropped the next time the registry is used.
pub struct SessionRegistry {
    idle_ttl: Duration,
    sessions: Mutex<HashMap<String, Entry>>,
}

impl SessionRegistry {
    /// A zero `idle_ttl` keeps sessions until they are closed.
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            idle_ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Register `session` and return its new id.
    pub async fn open(&self, session: TraversalSession) -> String {
        let id = Uuid::new_v4().to_string();
        debug!(session_id = %id, tree_id = %session.tree().tree_id(), "Session opened");

        let mut sessions = self.sessions.lock().await;
        self.evict_idle(&mut sessions);
        sessions.insert(
            id.clone(),
            Entry {
                session,
                last_touched: Instant::now(),
            },
        );
        id
    }

    /// Run `f` against the session with `id`.
    pub async fn with_session<R, F>(&self, id: &str, f: F) -> EngineResult<R>
    where
        F: FnOnce(&mut TraversalSession) -> EngineResult<R>,
    {
        let mut sessions = self.sessions.lock().await;
        self.evict_idle(&mut sessions);
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| EngineError::SessionNotFound {
                session_id: id.to_string(),
            })?;
        entry.last_touched = Instant::now();
        f(&mut entry.session)
    }

    /// Drop the session with `id`.
    pub async fn close(&self, id: &str) -> EngineResult<()> {
        let mut sessions = self.sessions.lock().await;
        self.evict_idle(&mut sessions);
        match sessions.remove(id) {
            Some(_) => {
                debug!(session_id = %id, "Session closed");
                Ok(())
            }
            None => Err(EngineError::SessionNotFound {
                session_id: id.to_string(),
            }),
        }
    }

    /// Open sessions, not counting idle ones awaiting eviction.
    pub async fn len(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        self.evict_idle(&mut sessions);
        sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn evict_idle(&self, sessions: &mut HashMap<String, Entry>) {
        if self.idle_ttl.is_zero() {
            return;
        }
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_touched.elapsed() < self.idle_ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "Evicted idle traversal sessions");
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(1800))
    }
}
