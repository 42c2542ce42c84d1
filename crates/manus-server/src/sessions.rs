//! Session Memory
//!
//! Keeps a short text history per session and makes sure only one run at a
//! time works on a given session.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Duration, Utc};

use manus_core::Turn;

use crate::config::MemoryConfig;

#[derive(Debug)]
struct Session {
    turns: Vec<Turn>,
    updated_at: DateTime<Utc>,
    busy: bool,
}

impl Session {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            turns: Vec::new(),
            updated_at: now,
            busy: false,
        }
    }
}

/// In-memory session store
#[derive(Clone, Debug)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<String, Session>>>,
    config: MemoryConfig,
}

impl SessionStore {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        now - session.updated_at > Duration::hours(self.config.expire_hours)
    }

    /// Mark a session busy. Returns `None` while another run holds it.
    pub fn try_begin(&self, id: &str) -> Option<SessionGuard> {
        self.try_begin_at(id, Utc::now())
    }

    fn try_begin_at(&self, id: &str, now: DateTime<Utc>) -> Option<SessionGuard> {
        let mut sessions = self.lock();
        let session = sessions.entry(id.to_string()).or_insert_with(|| Session::new(now));
        if session.busy {
            return None;
        }
        if self.is_expired(session, now) {
            tracing::debug!(session = id, "Session expired, starting fresh");
            session.turns.clear();
        }
        session.busy = true;
        session.updated_at = now;

        Some(SessionGuard {
            store: self.clone(),
            id: id.to_string(),
        })
    }

    /// Stored history for a session (empty when memory is off)
    pub fn history(&self, id: &str) -> Vec<Turn> {
        if !self.config.enabled {
            return Vec::new();
        }
        self.lock().get(id).map(|s| s.turns.clone()).unwrap_or_default()
    }

    /// Remember one instruction/answer exchange, dropping the oldest beyond
    /// `max_history`.
    pub fn record_exchange(&self, id: &str, instruction: &str, answer: &str) {
        if !self.config.enabled || answer.trim().is_empty() {
            return;
        }
        let now = Utc::now();
        let mut sessions = self.lock();
        let session = sessions.entry(id.to_string()).or_insert_with(|| Session::new(now));
        session.turns.push(Turn::user(instruction));
        session.turns.push(Turn::assistant(answer));

        let keep = self.config.max_history * 2;
        if session.turns.len() > keep {
            let excess = session.turns.len() - keep;
            session.turns.drain(..excess);
        }
        session.updated_at = now;
    }

    /// Drop idle sessions that are not running
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, s| s.busy || !self.is_expired(s, now));
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Clear the busy flag; a session with nothing remembered is dropped
    fn release(&self, id: &str) {
        let mut sessions = self.lock();
        if let Some(session) = sessions.get_mut(id) {
            session.busy = false;
            if session.turns.is_empty() {
                sessions.remove(id);
            }
        }
    }
}

/// Clears the session's busy flag when dropped
#[derive(Debug)]
pub struct SessionGuard {
    store: SessionStore,
    id: String,
}

impl SessionGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.store.release(&self.id);
    }
}
