//! Per-client assistant sessions.
//!
//! Keyed by client address. Unseen clients are awake. Entries live until
//! `purge_idle` removes them.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

/// Whether a client's assistant is listening, and when it last heard from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSession {
    pub active: bool,
    pub last_activity: DateTime<Utc>,
}

impl ClientSession {
    fn new() -> Self {
        Self {
            active: true,
            last_activity: Utc::now(),
        }
    }
}

/// Session totals for health reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounts {
    pub total: usize,
    pub active: usize,
    pub sleeping: usize,
}

/// Thread-safe session table. Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, ClientSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the assistant is awake for `client_id`. Unseen clients are awake.
    pub fn is_active(&self, client_id: &str) -> bool {
        self.sessions
            .get(client_id)
            .map(|session| session.active)
            .unwrap_or(true)
    }

    /// Record activity now and force the awake flag, creating the session if needed.
    pub fn set_active(&self, client_id: &str, active: bool) {
        self.transition(client_id, |current| *current = active);
    }

    /// Record activity now and run `step` on the awake flag while the entry
    /// is locked, so no other update can land between its read and its write.
    pub fn transition<T>(&self, client_id: &str, step: impl FnOnce(&mut bool) -> T) -> T {
        let mut session = self
            .sessions
            .entry(client_id.to_string())
            .or_insert_with(ClientSession::new);
        session.last_activity = Utc::now();
        step(&mut session.active)
    }

    pub fn get(&self, client_id: &str) -> Option<ClientSession> {
        self.sessions.get(client_id).map(|session| *session)
    }

    pub fn counts(&self) -> SessionCounts {
        let mut counts = SessionCounts::default();
        for session in self.sessions.iter() {
            counts.total += 1;
            if session.active {
                counts.active += 1;
            } else {
                counts.sleeping += 1;
            }
        }
        counts
    }

    /// Drop sessions with no activity for longer than `max_idle`.
    /// Returns how many were removed.
    pub fn purge_idle(&self, max_idle: Duration) -> usize {
        let cutoff = Utc::now() - max_idle;
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.last_activity >= cutoff);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unseen_client_is_active() {
        let store = SessionStore::new();
        assert!(store.is_active("203.0.113.7"));
        assert!(store.get("203.0.113.7").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_active_creates_and_updates() {
        let store = SessionStore::new();
        store.set_active("a", false);
        assert!(!store.is_active("a"));
        store.set_active("a", true);
        assert!(store.is_active("a"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_transition_moves_last_activity_forward() {
        let store = SessionStore::new();
        store.transition("a", |_| ());
        let first = store.get("a").expect("session exists").last_activity;
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.transition("a", |_| ());
        let second = store.get("a").expect("session exists").last_activity;
        assert!(second > first);
        assert!(store.is_active("a"));
    }

    #[test]
    fn test_counts_split_active_and_sleeping() {
        let store = SessionStore::new();
        store.transition("a", |_| ());
        store.transition("b", |_| ());
        store.set_active("c", false);

        let counts = store.counts();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.active, 2);
        assert_eq!(counts.sleeping, 1);
        assert_eq!(counts.active + counts.sleeping, counts.total);
    }

    #[test]
    fn test_purge_idle_keeps_recent_sessions() {
        let store = SessionStore::new();
        store.transition("old", |_| ());
        std::thread::sleep(std::time::Duration::from_millis(30));
        store.transition("new", |_| ());

        let removed = store.purge_idle(Duration::milliseconds(15));
        assert_eq!(removed, 1);
        assert!(store.get("old").is_none());
        assert!(store.get("new").is_some());
    }

    #[test]
    fn test_transition_reports_what_the_step_saw() {
        let store = SessionStore::new();
        let was_awake = store.transition("a", |active| {
            let before = *active;
            *active = false;
            before
        });
        assert!(was_awake);
        assert!(!store.is_active("a"));
    }

    #[test]
    fn test_concurrent_toggles_are_not_lost() {
        let store = SessionStore::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        store.transition("a", |active| *active = !*active);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        // 8000 flips from awake lands back on awake only if none were lost.
        assert!(store.is_active("a"));
        assert_eq!(store.len(), 1);
    }
}
