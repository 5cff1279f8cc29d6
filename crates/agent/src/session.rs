//! Session registry.
//!
//! Sessions are created on first contact and live until cleared or the
//! process exits. Every mutation is one short write-locked section; the
//! lock is never held across an `.await`.

use docent_core::agent::AgentKind;
use docent_core::message::{Message, Session, SessionId};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Session>>,
    capacity: usize,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl SessionRegistry {
    /// A registry that keeps at most `capacity` sessions, evicting the
    /// least recently updated one when full.
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Snapshot of a session, creating it if it does not exist.
    pub fn get_or_create(&self, id: &SessionId) -> Session {
        if let Some(session) = self.get(id) {
            return session;
        }
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        if !sessions.contains_key(id) && sessions.len() >= self.capacity {
            evict_oldest(&mut sessions);
        }
        sessions
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(session = %id, "Session created");
                Session::new(id.clone())
            })
            .clone()
    }

    pub fn get(&self, id: &SessionId) -> Option<Session> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).get(id).cloned()
    }

    /// Append a completed exchange and set the active agent.
    ///
    /// Creates the session if it was cleared while the turn ran.
    pub fn record_exchange(
        &self,
        id: &SessionId,
        user: Message,
        assistant: Message,
        agent: Option<AgentKind>,
    ) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        if !sessions.contains_key(id) && sessions.len() >= self.capacity {
            evict_oldest(&mut sessions);
        }
        let session = sessions.entry(id.clone()).or_insert_with(|| Session::new(id.clone()));
        session.push(user);
        session.push(assistant);
        if agent.is_some() {
            session.active_agent = agent;
        }
    }

    /// The last `window` messages of a session, oldest first.
    pub fn history(&self, id: &SessionId, window: usize) -> Vec<Message> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .map(|s| s.recent(window).to_vec())
            .unwrap_or_default()
    }

    /// Remove a session. Returns whether it existed.
    pub fn clear(&self, id: &SessionId) -> bool {
        self.sessions.write().unwrap_or_else(|e| e.into_inner()).remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn evict_oldest(sessions: &mut HashMap<SessionId, Session>) {
    let oldest = sessions
        .values()
        .min_by_key(|s| s.updated_at)
        .map(|s| s.id.clone());
    if let Some(id) = oldest {
        debug!(session = %id, "Evicting least recently used session");
        sessions.remove(&id);
    }
}
