//! Process-lifetime conversation store.
//!
//! Threads live until the process exits: no eviction, no size cap and no
//! persistence across restarts.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use ta_domain::error::{Error, Result};
use ta_domain::trace::TraceEvent;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One user-message / assistant-reply exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
    pub created_at: DateTime<Utc>,
}

/// Result of [`ConversationStore::get_or_create`].
#[derive(Debug, Clone)]
pub struct Resolved {
    pub session_id: String,
    /// Prior turns, oldest first.
    pub history: Vec<Turn>,
    pub is_new: bool,
}

/// Session-id keyed turn history.
///
/// Callers serialize turns of the same session themselves (the gateway holds a
/// per-session lock across a whole turn); the store only guarantees that each
/// `append` is atomic.
pub trait ConversationStore: Send + Sync {
    /// Resolve `session_id`, or allocate a new empty session when it is absent
    /// or unknown.
    fn get_or_create(&self, session_id: Option<&str>) -> Resolved;

    /// Append a finished turn. Returns the session's new turn count.
    fn append(&self, session_id: &str, user: &str, assistant: &str) -> Result<usize>;

    /// Snapshot of a session's turns, `None` if the id is unknown.
    fn history(&self, session_id: &str) -> Option<Vec<Turn>>;

    /// Number of sessions held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-memory implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default)]
struct Session {
    turns: Vec<Turn>,
}

/// The map lock is held only to find or insert an entry; reads and appends
/// take the entry's own lock.
#[derive(Default)]
pub struct InMemoryConversationStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, session_id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().get(session_id).cloned()
    }

    fn create(&self) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        self.sessions
            .write()
            .insert(session_id.clone(), Arc::new(Mutex::new(Session::default())));
        session_id
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn get_or_create(&self, session_id: Option<&str>) -> Resolved {
        if let Some(id) = session_id {
            if let Some(entry) = self.entry(id) {
                let history = entry.lock().turns.clone();
                TraceEvent::SessionResolved {
                    session_id: id.to_owned(),
                    is_new: false,
                    prior_turns: history.len(),
                }
                .emit();
                return Resolved {
                    session_id: id.to_owned(),
                    history,
                    is_new: false,
                };
            }
            tracing::debug!(requested = %id, "unknown session id, allocating a new one");
        }

        let session_id = self.create();
        TraceEvent::SessionResolved {
            session_id: session_id.clone(),
            is_new: true,
            prior_turns: 0,
        }
        .emit();

        Resolved {
            session_id,
            history: Vec::new(),
            is_new: true,
        }
    }

    fn append(&self, session_id: &str, user: &str, assistant: &str) -> Result<usize> {
        let entry = self
            .entry(session_id)
            .ok_or_else(|| Error::Other(format!("unknown session '{session_id}'")))?;

        let turns = {
            let mut session = entry.lock();
            session.turns.push(Turn {
                user: user.to_owned(),
                assistant: assistant.to_owned(),
                created_at: Utc::now(),
            });
            session.turns.len()
        };

        TraceEvent::TurnAppended {
            session_id: session_id.to_owned(),
            turns,
        }
        .emit();

        Ok(turns)
    }

    fn history(&self, session_id: &str) -> Option<Vec<Turn>> {
        self.entry(session_id).map(|e| e.lock().turns.clone())
    }

    fn len(&self) -> usize {
        self.sessions.read().len()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn absent_id_allocates_new_session() {
        let store = InMemoryConversationStore::new();
        let r = store.get_or_create(None);
        assert!(r.is_new);
        assert!(r.history.is_empty());
        assert!(uuid::Uuid::parse_str(&r.session_id).is_ok());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_id_is_replaced_by_fresh_id() {
        let store = InMemoryConversationStore::new();
        let r = store.get_or_create(Some("made-up-by-client"));
        assert!(r.is_new);
        assert_ne!(r.session_id, "made-up-by-client");
        assert!(store.history("made-up-by-client").is_none());
    }

    #[test]
    fn history_is_visible_on_next_resolve() {
        let store = InMemoryConversationStore::new();
        let id = store.get_or_create(None).session_id;
        store
            .append(&id, "Packing for Tokyo in April?", "Layers and an umbrella.")
            .unwrap();

        let r = store.get_or_create(Some(&id));
        assert!(!r.is_new);
        assert_eq!(r.session_id, id);
        assert_eq!(r.history.len(), 1);
        assert_eq!(r.history[0].user, "Packing for Tokyo in April?");
        assert_eq!(r.history[0].assistant, "Layers and an umbrella.");
    }

    #[test]
    fn append_to_unknown_session_fails() {
        let store = InMemoryConversationStore::new();
        assert!(store.append("nope", "u", "a").is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn appends_keep_order_and_count() {
        let store = InMemoryConversationStore::new();
        let id = store.get_or_create(None).session_id;
        for i in 0..5 {
            let n = store.append(&id, &format!("q{i}"), &format!("a{i}")).unwrap();
            assert_eq!(n, i + 1);
        }
        let users: Vec<String> = store.history(&id).unwrap().into_iter().map(|t| t.user).collect();
        assert_eq!(users, vec!["q0", "q1", "q2", "q3", "q4"]);
    }

    #[test]
    fn concurrent_sessions_are_independent() {
        let store = Arc::new(InMemoryConversationStore::new());
        let ids: Vec<String> = (0..8).map(|_| store.get_or_create(None).session_id).collect();

        let handles: Vec<_> = ids
            .iter()
            .cloned()
            .map(|id| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store.append(&id, &format!("{id}-{i}"), "ok").unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        for id in &ids {
            let turns = store.history(id).unwrap();
            assert_eq!(turns.len(), 50);
            assert!(turns.iter().enumerate().all(|(i, t)| t.user == format!("{id}-{i}")));
        }
    }
}
