//! Session registry: the server-wide map of live sessions.
//!
//! Membership is the only cross-session shared state besides the admission
//! gate, so it sits behind a single `RwLock`. Sessions insert themselves at
//! registration and remove themselves during cleanup; removing an id that is
//! already gone is a no-op so racing teardown paths stay harmless.

use crate::session::{Session, SessionId};
use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> SessionRegistry {
        SessionRegistry::default()
    }

    /// Registers a session under its id.
    pub async fn insert(&self, session: Arc<Session>) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id(), session);
    }

    /// Removes a session entry. Returns whether an entry was present.
    pub async fn remove(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(&id).is_some() {
            info!("session {} deregistered", id);
            true
        } else {
            false
        }
    }

    pub async fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        let sessions = self.sessions.read().await;
        sessions.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of every registered session, for shutdown sweeps.
    pub async fn all(&self) -> Vec<Arc<Session>> {
        let sessions = self.sessions.read().await;
        sessions.values().cloned().collect()
    }
}
