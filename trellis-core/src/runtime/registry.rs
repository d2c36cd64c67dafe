//! Session Registry
//!
//! Concurrent map from session id to its [`SessionHandle`]. Sessions share
//! nothing but this map.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use super::handle::SessionHandle;
use super::session::SessionId;
use crate::config::EngineConfig;

pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<SessionHandle>>,
    config: EngineConfig,
}

impl SessionRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
        }
    }

    /// The session for `id`, spawning it if needed. Must be called inside a
    /// tokio runtime.
    pub fn open(&self, id: SessionId) -> Arc<SessionHandle> {
        let entry = self.sessions.entry(id.clone()).or_insert_with(|| {
            info!(session = %id, "opening session");
            Arc::new(SessionHandle::spawn(id, self.config.clone()))
        });
        Arc::clone(entry.value())
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a session. Its task ends once the last handle is dropped.
    pub fn close(&self, id: &SessionId) -> Option<Arc<SessionHandle>> {
        let (_, handle) = self.sessions.remove(id)?;
        info!(session = %id, "closed session");
        Some(handle)
    }

    /// Open session ids, sorted.
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
