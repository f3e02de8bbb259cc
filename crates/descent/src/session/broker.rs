//! Interaction broker: demultiplexes platform button presses to sessions.
//!
//! A callback query carries the id of the message it was pressed on; that
//! id is the session id. The broker looks the session up and offers the
//! response without blocking, so one session awaiting the game service can
//! never stall delivery for the others.

use tracing::debug;

use descent_gateway_protocol::CallbackQueryData;

use super::handle::Offer;
use super::program::ChoiceEvent;
use super::registry::SessionRegistry;

/// Private notice shown to an actor pressing buttons on someone else's
/// session.
const NOT_OWNER_NOTICE: &str = "This isn't your session. Run the command yourself to play.";

/// Routes callback queries to the sessions that own them.
#[derive(Clone)]
pub struct InteractionBroker {
    registry: SessionRegistry,
}

impl InteractionBroker {
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }

    /// Dispatch one callback query.
    ///
    /// Exactly one dispatch per physical event; unmatched or stale events
    /// are dropped with a diagnostic log, never surfaced to the user.
    /// Returns an optional private notice for the pressing actor.
    pub fn dispatch(&self, query: &CallbackQueryData) -> Option<String> {
        let Some(handle) = self.registry.lookup(&query.message_id) else {
            debug!(
                message_id = %query.message_id,
                choice_id = %query.choice_id,
                "callback for unknown or retired session dropped"
            );
            return None;
        };

        let event = ChoiceEvent {
            actor_id: query.sender.id.clone(),
            choice_id: query.choice_id.clone(),
        };

        match handle.offer(event) {
            Offer::Accepted => None,
            Offer::NotOwner => {
                debug!(
                    message_id = %query.message_id,
                    actor_id = %query.sender.id,
                    owner_id = %handle.owner_id(),
                    "response from non-owner rejected"
                );
                Some(NOT_OWNER_NOTICE.to_string())
            }
            Offer::Unavailable => {
                debug!(
                    message_id = %query.message_id,
                    choice_id = %query.choice_id,
                    "response arrived after the wait was claimed; dropped"
                );
                None
            }
        }
    }
}
