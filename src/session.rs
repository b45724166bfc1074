//! Per-session conversation state and in-flight request tracking
//!
//! This module holds the two pieces of mutable state the chat handler relies
//! on across otherwise-stateless requests: an ordered turn history per session
//! id, and a cancellation token per in-flight request id. Both maps live for
//! the lifetime of the process and are never persisted.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Maximum number of turns retained per session.
///
/// When an append pushes a history past this limit, the oldest turns are
/// evicted whole from the front until exactly this many remain.
pub const MAX_HISTORY_TURNS: usize = 30;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user.
    User,
    /// The generative model.
    Model,
}

/// An inline binary payload carried inside a turn.
///
/// The `data` field is base64 text, matching the upstream inline-data wire
/// format, so parts round-trip to the provider without re-encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// Media type of the payload (e.g. `image/png`, `application/pdf`).
    pub mime_type: String,
    /// Base64-encoded payload bytes.
    pub data: String,
}

/// One payload element of a turn: plain text or an inline blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    /// Plain text content.
    Text {
        /// The text itself.
        text: String,
    },
    /// Inline binary content with a media type.
    InlineData {
        /// The encoded payload.
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl Part {
    /// Creates a text part.
    ///
    /// # Examples
    ///
    /// ```
    /// use sahayak::session::Part;
    ///
    /// let part = Part::text("Hello");
    /// assert!(matches!(part, Part::Text { .. }));
    /// ```
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Creates an inline-data part from already base64-encoded bytes.
    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        }
    }

    /// Returns the text content when this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::InlineData { .. } => None,
        }
    }
}

/// One message exchange unit: a role plus one or more parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced this turn.
    pub role: Role,
    /// Ordered payload of the turn.
    pub parts: Vec<Part>,
}

impl Turn {
    /// Creates a user turn with the given parts.
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    /// Creates a model turn containing a single text part.
    ///
    /// # Examples
    ///
    /// ```
    /// use sahayak::session::{Role, Turn};
    ///
    /// let turn = Turn::model_text("Namaste!");
    /// assert_eq!(turn.role, Role::Model);
    /// assert_eq!(turn.parts.len(), 1);
    /// ```
    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenated text of all text parts, ignoring inline blobs.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Process-wide conversation and in-flight request state.
///
/// The store owns two maps: session id to turn history, and request id to the
/// cancellation token of the request currently processing under that id. Each
/// operation locks exactly one map for its duration, so operations are atomic
/// with respect to each other even when the chat handler and the cancellation
/// endpoint race on the same id.
///
/// Cancellation is cooperative: [`SessionStore::cancel_request`] only marks
/// the token, and the chat handler checks [`SessionStore::is_cancelled`] after
/// its upstream call returns, discarding the result instead of delivering it.
/// A cancellation that lands after [`SessionStore::end_request`] loses
/// silently and reports "not found".
///
/// # Examples
///
/// ```
/// use sahayak::session::{SessionStore, Turn};
///
/// let store = SessionStore::new();
/// assert!(store.history("s1").is_empty());
///
/// store.append_turns("s1", vec![Turn::model_text("hi")]);
/// assert_eq!(store.history("s1").len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SessionStore {
    conversations: Mutex<HashMap<String, Vec<Turn>>>,
    in_flight: Mutex<HashMap<String, CancellationToken>>,
}

impl SessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the turn history for a session, creating an empty one for an
    /// unseen id.
    ///
    /// Never fails; the returned vector is a snapshot, not a live view.
    pub fn history(&self, session_id: &str) -> Vec<Turn> {
        let mut conversations = self.conversations.lock().expect("conversations lock");
        conversations
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Appends turns to a session in the order given, then trims the history
    /// to the most recent [`MAX_HISTORY_TURNS`] turns.
    ///
    /// Trimming removes whole turns from the front only. Turns from one call
    /// are appended as a unit; concurrent appends to the same session are
    /// serialized in whichever order they take the lock.
    pub fn append_turns(&self, session_id: &str, turns: Vec<Turn>) {
        let mut conversations = self.conversations.lock().expect("conversations lock");
        let history = conversations.entry(session_id.to_string()).or_default();
        history.extend(turns);

        if history.len() > MAX_HISTORY_TURNS {
            let excess = history.len() - MAX_HISTORY_TURNS;
            history.drain(..excess);
            tracing::debug!(
                session_id,
                evicted = excess,
                "trimmed conversation history"
            );
        }
    }

    /// Registers an in-flight request and returns its cancellation token.
    ///
    /// The returned token is the handle the chat handler carries through the
    /// upstream call; the store keeps a clone so a concurrent
    /// [`SessionStore::cancel_request`] can mark it. A stale entry under the
    /// same id is overwritten.
    pub fn begin_request(&self, request_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        let mut in_flight = self.in_flight.lock().expect("in_flight lock");
        if in_flight
            .insert(request_id.to_string(), token.clone())
            .is_some()
        {
            tracing::warn!(request_id, "overwrote stale in-flight entry");
        }
        token
    }

    /// Marks an in-flight request as cancelled.
    ///
    /// Returns true when an entry existed (including one already cancelled:
    /// the flag is idempotent and stays set). Returns false when the request
    /// already completed or never existed; callers surface that as an
    /// informational "not found", not an error.
    pub fn cancel_request(&self, request_id: &str) -> bool {
        let in_flight = self.in_flight.lock().expect("in_flight lock");
        match in_flight.get(request_id) {
            Some(token) => {
                token.cancel();
                tracing::info!(request_id, "cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Reports whether an in-flight request has been cancelled.
    ///
    /// True only while an entry exists and its token is marked. Once
    /// [`SessionStore::end_request`] has removed the entry this returns false:
    /// a cancellation racing against completion loses once the original call
    /// finishes first.
    pub fn is_cancelled(&self, request_id: &str) -> bool {
        let in_flight = self.in_flight.lock().expect("in_flight lock");
        in_flight
            .get(request_id)
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }

    /// Removes the in-flight entry for a request id unconditionally.
    ///
    /// Called exactly once by whichever path (success, failure, or observed
    /// cancellation) concludes processing for the id. Removing an absent
    /// entry is a no-op.
    pub fn end_request(&self, request_id: &str) {
        let mut in_flight = self.in_flight.lock().expect("in_flight lock");
        in_flight.remove(request_id);
    }

    /// Number of sessions currently tracked.
    pub fn session_count(&self) -> usize {
        self.conversations.lock().expect("conversations lock").len()
    }

    /// Whether a session id has been seen.
    pub fn has_session(&self, session_id: &str) -> bool {
        self.conversations
            .lock()
            .expect("conversations lock")
            .contains_key(session_id)
    }
}
