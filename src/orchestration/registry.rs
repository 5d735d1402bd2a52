//! # Session Registry
//!
//! Concurrent map of running sessions to their coordinator handles, keyed by
//! the current session id.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use super::coordinator::SessionHandle;
use crate::models::OrchestrationSession;

#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    handles: Arc<DashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the handle's current session id. Returns the handle it
    /// replaced, if any.
    pub fn register(&self, handle: SessionHandle) -> Option<SessionHandle> {
        let session_id = handle.session_id();
        debug!(session_id = %session_id, "Registering session");
        self.handles.insert(session_id, handle)
    }

    /// Move a handle whose session was retried under its new id
    pub fn rekey(&self, previous_id: &str, handle: SessionHandle) {
        self.handles.remove(previous_id);
        self.register(handle);
    }

    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.handles.get(session_id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, session_id: &str) -> Option<SessionHandle> {
        self.handles.remove(session_id).map(|(_, handle)| handle)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.handles.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.handles.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn snapshots(&self) -> Vec<Arc<OrchestrationSession>> {
        self.handles
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect()
    }

    /// Sessions that have not reached a terminal status
    pub fn active_sessions(&self) -> Vec<Arc<OrchestrationSession>> {
        self.snapshots()
            .into_iter()
            .filter(|snapshot| !snapshot.is_completed())
            .collect()
    }
}
