//! Conversation sessions
//!
//! A session is an append-only message history keyed by an opaque id. The
//! [`SessionStore`] owns every session for the lifetime of the process and
//! hands each one out behind an async mutex, so a turn can hold its session
//! for its whole duration.

use crate::providers::Message;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// A session shared between the store and in-flight turns
pub type SharedSession = Arc<tokio::sync::Mutex<Session>>;

/// Conversation state for one session id
#[derive(Debug, Clone)]
pub struct Session {
    /// Session identifier
    pub id: String,
    /// When the session was first referenced
    pub created_at: DateTime<Utc>,
    /// Rolling summary, reserved for memory backends that produce one
    pub summary: String,
    /// Tool names the session has been granted, reserved
    pub tools: Vec<String>,
    messages: Vec<Message>,
}

impl Session {
    /// Create an empty session
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            summary: String::new(),
            tools: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Committed history, oldest first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Append one message to the history
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append messages to the history, preserving order
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    /// Number of committed messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if nothing has been committed yet
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Process-wide session registry
///
/// # Examples
///
/// ```
/// use agentd::session::SessionStore;
/// use std::sync::Arc;
///
/// let store = SessionStore::new("global");
/// let a = store.get_or_create(None);
/// let b = store.get_or_create(Some("global"));
/// assert!(Arc::ptr_eq(&a, &b));
/// assert_eq!(store.count(), 1);
/// ```
pub struct SessionStore {
    default_id: String,
    sessions: Mutex<HashMap<String, SharedSession>>,
}

impl SessionStore {
    /// Create a store whose id-less lookups resolve to `default_id`
    pub fn new(default_id: impl Into<String>) -> Self {
        Self {
            default_id: default_id.into(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Id used when a caller supplies none
    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    /// Resolve a caller-supplied id, falling back to the default for
    /// absent or empty ids
    pub fn resolve_id<'a>(&'a self, session_id: Option<&'a str>) -> &'a str {
        session_id
            .filter(|id| !id.is_empty())
            .unwrap_or(self.default_id.as_str())
    }

    /// Return the session for `session_id`, creating it on first use
    pub fn get_or_create(&self, session_id: Option<&str>) -> SharedSession {
        let id = self.resolve_id(session_id);
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::debug!("Created session {}", id);
                Arc::new(tokio::sync::Mutex::new(Session::new(id)))
            })
            .clone()
    }

    /// Create a session under a freshly generated id
    pub fn new_session(&self) -> (String, SharedSession) {
        let id = Uuid::new_v4().to_string();
        let session = self.get_or_create(Some(&id));
        (id, session)
    }

    /// Number of distinct sessions
    pub fn count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
