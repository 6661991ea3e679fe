use crate::transport::SessionId;
use quartz_ring::ConsumerId;
use std::collections::HashMap;

/// Per-subscriber state, owned by the event-loop thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    /// Read position in the broadcast ring.
    pub cursor: ConsumerId,
    /// Messages delivered so far.
    pub delivered: u64,
}

/// Live sessions keyed by transport id. Only touched from the event loop.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previous session stored under `id`, if any.
    pub fn insert(&mut self, id: SessionId, cursor: ConsumerId) -> Option<Session> {
        self.sessions.insert(
            id,
            Session {
                cursor,
                delivered: 0,
            },
        )
    }

    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        self.sessions.remove(&id)
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    /// Session ids in ascending order.
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
