//! Session handle: the registry-visible side of a running session.
//!
//! A `SessionHandle` is a cheap clone (an `mpsc::Sender` plus identity).
//! The broker uses it to offer responses to the owning controller without
//! blocking; ownership filtering happens here, before an event can reach
//! the controller's armed wait.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::program::ChoiceEvent;

/// Capacity of a session's response channel. Anything beyond a couple of
/// near-simultaneous clicks is stale by definition and may be dropped.
pub(crate) const RESPONSE_CHANNEL_CAPACITY: usize = 8;

/// Outcome of offering a response to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// The response was delivered to the session's wait.
    Accepted,
    /// The actor is not the session owner; nothing was delivered.
    NotOwner,
    /// The session is no longer accepting responses (retired, or its
    /// buffer is saturated with stale clicks).
    Unavailable,
}

/// Handle to a running session, stored in the registry.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: String,
    owner_id: String,
    tx: mpsc::Sender<ChoiceEvent>,
}

impl SessionHandle {
    pub(crate) fn new(id: String, owner_id: String, tx: mpsc::Sender<ChoiceEvent>) -> Self {
        Self { id, owner_id, tx }
    }

    /// The session id (equal to the id of the bound message).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Identity of the only actor whose responses are accepted.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Offer a response to the session without blocking.
    ///
    /// Responses from non-owners are rejected here so they can never
    /// consume the armed wait or reset the deadline.
    pub fn offer(&self, event: ChoiceEvent) -> Offer {
        if event.actor_id != self.owner_id {
            return Offer::NotOwner;
        }

        match self.tx.try_send(event) {
            Ok(()) => Offer::Accepted,
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => Offer::Unavailable,
        }
    }
}
