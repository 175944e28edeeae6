//! Per-user session state and the concurrent session store.
//!
//! A session is the runtime cursor over the static dialogue graph: the
//! current state, the navigation history, collected answers and resolved
//! entity ids. Sessions are intentionally ephemeral; everything worth
//! keeping is persisted to the backend as the conversation advances.
//!
//! The store serializes turns per user: each session sits behind its own
//! async mutex, so two events from the same user are processed one after
//! the other while different users proceed in parallel.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::dialogue::StateId;

/// Runtime state of one user's questionnaire run.
#[derive(Debug, Clone)]
pub struct Session {
    pub current_state: StateId,
    /// States to return to on "back", most recent last. Never records the
    /// same state twice in a row.
    history: Vec<StateId>,
    /// Collected answers keyed by the node's logical field name.
    pub answers: HashMap<String, String>,
    /// Pain-point branch labels picked so far, in pick order.
    pub pain_points: Vec<String>,
    /// Current page of a paged option menu, when one is open.
    pub page_cursor: Option<usize>,
    pub enterprise_id: Option<i64>,
    pub respondent_id: Option<i64>,
    pub survey_id: Option<i64>,
    /// Most recently resolved question.
    pub question_id: Option<i64>,
    pub software_category_id: Option<i64>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            current_state: StateId::Consent,
            history: Vec::new(),
            answers: HashMap::new(),
            pain_points: Vec::new(),
            page_cursor: None,
            enterprise_id: None,
            respondent_id: None,
            survey_id: None,
            question_id: None,
            software_category_id: None,
        }
    }

    /// Records `state` as a return point for "back". Consecutive duplicates
    /// are collapsed so reprompts and paging never inflate the stack.
    pub fn push_history(&mut self, state: StateId) {
        if self.history.last() != Some(&state) {
            self.history.push(state);
        }
    }

    /// Pops the most recent return point, if any.
    pub fn pop_history(&mut self) -> Option<StateId> {
        self.history.pop()
    }

    pub fn history_is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Concurrent map of user id to session, one lock per user.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<i64, Arc<Mutex<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the user's session handle, creating a fresh one at the
    /// consent state if none exists.
    pub fn get_or_create(&self, user_id: i64) -> Arc<Mutex<Session>> {
        self.sessions
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(Session::new())))
            .clone()
    }

    /// Replaces any existing session with a fresh one. `/start` semantics:
    /// restarting always begins from consent.
    pub fn reset(&self, user_id: i64) -> Arc<Mutex<Session>> {
        let fresh = Arc::new(Mutex::new(Session::new()));
        self.sessions.insert(user_id, fresh.clone());
        fresh
    }

    /// Drops the user's session entirely (survey finished or cancelled).
    pub fn remove(&self, user_id: i64) {
        self.sessions.remove(&user_id);
    }

    pub fn contains(&self, user_id: i64) -> bool {
        self.sessions.contains_key(&user_id)
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
    fn history_collapses_consecutive_duplicates() {
        let mut session = Session::new();
        session.push_history(StateId::Consent);
        session.push_history(StateId::Consent);
        session.push_history(StateId::CompanyName);
        session.push_history(StateId::Consent);
        assert_eq!(session.pop_history(), Some(StateId::Consent));
        assert_eq!(session.pop_history(), Some(StateId::CompanyName));
        assert_eq!(session.pop_history(), Some(StateId::Consent));
        assert_eq!(session.pop_history(), None);
    }

    #[test]
    fn store_creates_once_and_resets_fresh() {
        let store = SessionStore::new();
        let first = store.get_or_create(7);
        let again = store.get_or_create(7);
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(store.len(), 1);

        let fresh = store.reset(7);
        assert!(!Arc::ptr_eq(&first, &fresh));

        store.remove(7);
        assert!(!store.contains(7));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn sessions_are_independent_per_user() {
        let store = SessionStore::new();
        {
            let handle = store.get_or_create(1);
            let mut session = handle.lock().await;
            session.current_state = StateId::Email;
        }
        let other = store.get_or_create(2);
        assert_eq!(other.lock().await.current_state, StateId::Consent);
        assert_eq!(
            store.get_or_create(1).lock().await.current_state,
            StateId::Email
        );
    }
}
