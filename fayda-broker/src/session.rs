//! Pending verification sessions
//!
//! A session bridges the two HTTP calls of a challenge: it parks the live
//! browser page between `initiate` and `verify` together with everything the
//! caller sent on `initiate`. Sessions live for a fixed TTL; expired ones are
//! invisible to `get` and get closed by the sweeper.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use fayda_core::{Fan, Portal};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::driver::ChallengeHandle;

/// Unique session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        SessionId(crate::crypto::generate_id())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the caller sent on `initiate`, replayed on `verify`
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub fan: Fan,
    pub portal: Portal,
    pub email: String,
    pub organization_name: Option<String>,
    pub system_description: Option<String>,
    pub webhook_url: Option<String>,
    /// Plaintext; hashed by the registration step
    pub credential: String,
    /// Developer-client the end user is verifying for
    pub client_id: Option<String>,
}

/// A pending challenge
pub struct Session {
    pub id: SessionId,
    pub context: RequestContext,
    pub created_at: DateTime<Utc>,
    created: Instant,
    handle: Mutex<Option<Box<dyn ChallengeHandle>>>,
}

impl Session {
    pub fn new(context: RequestContext, handle: Box<dyn ChallengeHandle>) -> Self {
        Self {
            id: SessionId::generate(),
            context,
            created_at: Utc::now(),
            created: Instant::now(),
            handle: Mutex::new(Some(handle)),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created.elapsed() >= ttl
    }

    /// Claim the automation handle without waiting.
    ///
    /// `None` means another request is already working on this session.
    pub fn try_claim(&self) -> Option<MutexGuard<'_, Option<Box<dyn ChallengeHandle>>>> {
        self.handle.try_lock().ok()
    }

    /// Close the handle if nobody holds it. Returns false when it is in use.
    async fn close_if_idle(&self) -> bool {
        match self.handle.try_lock() {
            Ok(mut guard) => {
                if let Some(mut handle) = guard.take() {
                    handle.close().await;
                }
                true
            }
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("context", &self.context)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// TTL-bounded in-memory session map
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    ttl: Duration,
    sweep_interval: Duration,
    sweeper: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    pub fn new(ttl: Duration, sweep_interval: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
            sweep_interval,
            sweeper: std::sync::Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn insert(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        self.sessions
            .write()
            .unwrap()
            .insert(session.id.clone(), Arc::clone(&session));
        session
    }

    /// Look up a live session; expired entries are treated as absent
    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .unwrap()
            .get(id)
            .filter(|s| !s.is_expired(self.ttl))
            .cloned()
    }

    /// Drop a session from the map. The caller owns closing its handle.
    pub fn remove(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.write().unwrap().remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict expired sessions, closing their browsers. Returns how many were evicted.
    pub async fn sweep_expired(&self) -> usize {
        let expired: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.write().unwrap();
            let ids: Vec<SessionId> = sessions
                .values()
                .filter(|s| s.is_expired(self.ttl))
                .map(|s| s.id.clone())
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for session in &expired {
            if session.close_if_idle().await {
                tracing::info!(session_id = %session.id, "Session expired, browser closed");
            } else {
                // A verify call holds it and will close it when done
                tracing::debug!(session_id = %session.id, "Session expired while in use");
            }
        }

        expired.len()
    }

    /// Start the periodic sweeper
    pub fn spawn_sweeper(self: &Arc<Self>) {
        let store = Arc::downgrade(self);
        let interval = self.sweep_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else { break };
                let evicted = store.sweep_expired().await;
                if evicted > 0 {
                    tracing::debug!(evicted, "Session sweep");
                }
            }
        });

        if let Some(previous) = self.sweeper.lock().unwrap().replace(task) {
            previous.abort();
        }
    }

    /// Stop the sweeper and close every live browser
    pub async fn shutdown(&self) {
        if let Some(task) = self.sweeper.lock().unwrap().take() {
            task.abort();
        }

        let drained: Vec<Arc<Session>> = self
            .sessions
            .write()
            .unwrap()
            .drain()
            .map(|(_, s)| s)
            .collect();

        for session in &drained {
            session.close_if_idle().await;
        }

        tracing::info!(closed = drained.len(), "Session store shut down");
    }
}
