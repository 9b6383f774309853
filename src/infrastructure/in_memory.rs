use crate::domain::ports::SessionStore;
use crate::domain::session::SessionId;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct SessionEntry {
    values: HashMap<String, Vec<u8>>,
    touched: Instant,
}

/// A thread-safe in-memory session store.
///
/// Uses `Arc<RwLock<HashMap<SessionId, _>>>` so clones share the same data.
/// With an idle timeout, a session that has not been written for longer than
/// the timeout reads as empty. Every write drops all expired sessions.
#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, SessionEntry>>>,
    idle_timeout: Option<Duration>,
}

impl InMemorySessionStore {
    /// Creates a new, empty store whose sessions never expire.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::default(),
            idle_timeout: Some(idle_timeout),
        }
    }

    fn is_expired(&self, entry: &SessionEntry) -> bool {
        self.idle_timeout
            .is_some_and(|timeout| entry.touched.elapsed() > timeout)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session: &SessionId, key: &str) -> Result<Option<Vec<u8>>> {
        let mut sessions = self.sessions.write().await;
        let Some(entry) = sessions.get(session) else {
            return Ok(None);
        };
        if self.is_expired(entry) {
            tracing::debug!(%session, "session expired");
            sessions.remove(session);
            return Ok(None);
        }
        Ok(entry.values.get(key).cloned())
    }

    async fn set(&self, session: &SessionId, key: &str, value: Vec<u8>) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, entry| !self.is_expired(entry));
        let swept = before - sessions.len();
        if swept > 0 {
            tracing::debug!(swept, "expired sessions dropped");
        }
        let entry = sessions
            .entry(session.clone())
            .or_insert_with(|| SessionEntry {
                values: HashMap::new(),
                touched: now,
            });
        entry.values.insert(key.to_string(), value);
        entry.touched = now;
        Ok(())
    }

    async fn remove(&self, session: &SessionId, key: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get_mut(session) {
            entry.values.remove(key);
            if entry.values.is_empty() {
                sessions.remove(session);
            }
        }
        Ok(())
    }
}
