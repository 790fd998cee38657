//! In-memory per-caller conversation state.
//!
//! Pure state container, no I/O. Sessions are created lazily, capped at a
//! fixed number of turns with front eviction, and lost on process restart.
//! A reset clears the turn list but keeps the caller's entry so a later
//! prompt starts a fresh conversation under the same key.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single turn in a caller's conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Process-wide map from caller identity to a bounded turn history.
///
/// A single lock over the map gives per-caller mutual exclusion: every
/// operation is a short synchronous splice, so two concurrent requests from
/// the same caller (a user double-submitting) cannot interleave mid-append.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, VecDeque<Turn>>>,
    cap: usize,
}

impl SessionStore {
    /// Create a store with the given per-session turn cap.
    pub fn new(cap: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            cap,
        }
    }

    /// Append a turn to a caller's session, evicting the oldest turns once
    /// the cap is exceeded.
    pub fn append(&self, caller_id: &str, turn: Turn) {
        let mut sessions = self.sessions.lock().expect("session map lock poisoned");
        let turns = sessions.entry(caller_id.to_string()).or_default();
        turns.push_back(turn);
        while turns.len() > self.cap {
            turns.pop_front();
        }
    }

    /// Current turn list for a caller. Empty if the caller has no session.
    pub fn get(&self, caller_id: &str) -> Vec<Turn> {
        let sessions = self.sessions.lock().expect("session map lock poisoned");
        sessions
            .get(caller_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Last `n` turns for a caller, oldest first.
    ///
    /// Used by the fast streaming path to shrink the context window sent
    /// upstream without touching the stored history.
    pub fn tail(&self, caller_id: &str, n: usize) -> Vec<Turn> {
        let sessions = self.sessions.lock().expect("session map lock poisoned");
        sessions
            .get(caller_id)
            .map(|turns| turns.iter().skip(turns.len().saturating_sub(n)).cloned().collect())
            .unwrap_or_default()
    }

    /// Clear a caller's turn list without removing the entry.
    pub fn reset(&self, caller_id: &str) {
        let mut sessions = self.sessions.lock().expect("session map lock poisoned");
        if let Some(turns) = sessions.get_mut(caller_id) {
            turns.clear();
        }
    }

    /// Number of turns currently held for a caller.
    pub fn len(&self, caller_id: &str) -> usize {
        let sessions = self.sessions.lock().expect("session map lock poisoned");
        sessions.get(caller_id).map(VecDeque::len).unwrap_or(0)
    }

    /// Whether a caller has no recorded turns.
    pub fn is_empty(&self, caller_id: &str) -> bool {
        self.len(caller_id) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_get_preserves_order() {
        let store = SessionStore::new(32);
        store.append("u1", Turn::user("hello"));
        store.append("u1", Turn::assistant("hi"));

        let turns = store.get("u1");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].content, "hello");
        assert_eq!(turns[1].role, Role::Assistant);
    }

    #[test]
    fn get_unknown_caller_is_empty() {
        let store = SessionStore::new(32);
        assert!(store.get("nobody").is_empty());
        assert!(store.is_empty("nobody"));
    }

    #[test]
    fn growth_is_bounded_with_front_eviction() {
        let store = SessionStore::new(4);
        for i in 0..20 {
            store.append("u1", Turn::user(format!("msg {i}")));
            assert!(store.len("u1") <= 4, "cap exceeded after append {i}");
        }
        let turns = store.get("u1");
        assert_eq!(turns.len(), 4);
        // Oldest evicted first: the survivors are the last four appends.
        assert_eq!(turns[0].content, "msg 16");
        assert_eq!(turns[3].content, "msg 19");
    }

    #[test]
    fn reset_is_idempotent_and_keeps_entry() {
        let store = SessionStore::new(32);
        store.append("u1", Turn::user("hello"));
        assert!(!store.is_empty("u1"));
        store.reset("u1");
        assert!(store.is_empty("u1"));
        store.reset("u1");
        assert!(store.is_empty("u1"));

        // A subsequent prompt starts a fresh list of length 1.
        store.append("u1", Turn::user("again"));
        assert_eq!(store.len("u1"), 1);
    }

    #[test]
    fn reset_unknown_caller_is_a_no_op() {
        let store = SessionStore::new(32);
        store.reset("nobody");
        assert!(store.get("nobody").is_empty());
    }

    #[test]
    fn tail_returns_most_recent_turns() {
        let store = SessionStore::new(32);
        for i in 0..10 {
            store.append("u1", Turn::user(format!("m{i}")));
        }
        let tail = store.tail("u1", 3);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].content, "m7");
        assert_eq!(tail[2].content, "m9");

        // Shorter history than the window returns everything.
        store.append("u2", Turn::user("only"));
        assert_eq!(store.tail("u2", 8).len(), 1);
    }

    #[test]
    fn sessions_are_isolated_per_caller() {
        let store = SessionStore::new(32);
        store.append("u1", Turn::user("a"));
        store.append("u2", Turn::user("b"));
        store.reset("u1");
        assert!(store.get("u1").is_empty());
        assert_eq!(store.len("u2"), 1);
    }
}
