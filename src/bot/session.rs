//! Per-sender conversation state.
//!
//! One session per distinct sender id, created on first contact and kept for
//! the life of the process. All mutation goes through [`SessionStore`].

use std::collections::HashMap;
use std::sync::Mutex;

/// Display profile fetched lazily from the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
}

/// Where a sender currently is in the add-keyword flow.
///
/// Idle is both the initial and the resting state; every flow path returns
/// here on completion or error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowState {
    #[default]
    Idle,
    /// Waiting for the name of the keyword being authored.
    AwaitingKeywordName,
    /// Keyword captured; waiting for the text-or-buttons choice command.
    ChoosingReplyKind,
    /// Waiting for the plain-text reply body.
    AwaitingKeywordText,
    /// Waiting for the button title.
    AwaitingButtonTitle,
    /// Title captured; waiting for the 1-3 button-count choice command.
    AwaitingButtonCount,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    pub profile: Option<Profile>,
    pub state: FlowState,
    /// Keyword under authoring; set on entering the flow, cleared on exit.
    pub pending_keyword: Option<String>,
    pub pending_button_title: Option<String>,
    pub pending_button_count: Option<u8>,
    /// Last normalized input the keyword engine dispatched for this sender.
    pub last_keyword: Option<String>,
}

impl Session {
    /// Return the flow to its resting state and drop authoring scratch.
    pub fn reset_flow(&mut self) {
        self.state = FlowState::Idle;
        self.pending_keyword = None;
        self.pending_button_title = None;
        self.pending_button_count = None;
    }
}

/// Process-lifetime session map, keyed by sender id. Unbounded.
#[derive(Default)]
pub struct SessionStore {
    inner: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a sender's session, creating it if absent.
    pub fn get(&self, sender_id: &str) -> Session {
        let mut sessions = self.inner.lock().expect("session lock poisoned");
        sessions.entry(sender_id.to_string()).or_default().clone()
    }

    /// Mutate a sender's session in place, creating it if absent.
    pub fn update<R>(&self, sender_id: &str, mutate: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.inner.lock().expect("session lock poisoned");
        mutate(sessions.entry(sender_id.to_string()).or_default())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("session lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
