//! Per-session controller: drives one session from creation to retirement.
//!
//! Each session runs in a dedicated tokio task. The task owns the session
//! program and processes at most one response at a time, so state
//! transitions are serialized without locks. The armed wait is a
//! `tokio::select!` over the response channel, the deadline timer and the
//! registry's shutdown signal; rearming rebuilds the sleep future, which
//! cancels the previous deadline atomically.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use descent_gateway_protocol::DisplayPayload;

use crate::chat::ChatPort;

use super::handle::{RESPONSE_CHANNEL_CAPACITY, SessionHandle};
use super::program::{Advance, BoxedProgram, ChoiceEvent};
use super::registry::{SessionError, SessionRegistry};

/// Accent color of the generic failure payload.
const COLOR_FAILURE: u32 = 0xFF5555;

// ============================================================================
// Session Status
// ============================================================================

/// Lifecycle state a session retires with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Completed,
    Expired,
    Failed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Expired => "expired",
            SessionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Session Controller
// ============================================================================

/// Drives one session: render → await one response within the deadline →
/// step → re-render or retire.
pub struct SessionController {
    id: String,
    chat_id: String,
    program: BoxedProgram,
    registry: SessionRegistry,
    chat: Arc<dyn ChatPort>,
    response_rx: mpsc::Receiver<ChoiceEvent>,
    shutdown_rx: watch::Receiver<bool>,
}

impl SessionController {
    /// Render a program's initial state into a fresh message, register the
    /// session under the message id and arm the first wait.
    ///
    /// Returns the session id (the id of the rendered message).
    pub async fn start(
        registry: &SessionRegistry,
        chat: &Arc<dyn ChatPort>,
        chat_id: &str,
        interaction_token: Option<&str>,
        program: BoxedProgram,
    ) -> Result<String, SessionError> {
        let payload = program.render();
        let message_id = chat.post(chat_id, interaction_token, payload).await?;
        Self::attach(registry, chat, chat_id, &message_id, program).await?;
        Ok(message_id)
    }

    /// Bind a program to an existing message id and spawn its controller.
    ///
    /// Fails with [`SessionError::RegistrationConflict`] if a non-retired
    /// session already owns the message.
    pub async fn attach(
        registry: &SessionRegistry,
        chat: &Arc<dyn ChatPort>,
        chat_id: &str,
        message_id: &str,
        program: BoxedProgram,
    ) -> Result<(), SessionError> {
        let (tx, response_rx) = mpsc::channel(RESPONSE_CHANNEL_CAPACITY);
        let handle = SessionHandle::new(
            message_id.to_string(),
            program.owner_id().to_string(),
            tx,
        );
        registry.register(handle)?;

        let controller = SessionController {
            id: message_id.to_string(),
            chat_id: chat_id.to_string(),
            program,
            registry: registry.clone(),
            chat: chat.clone(),
            response_rx,
            shutdown_rx: registry.shutdown_signal(),
        };

        let task = tokio::spawn(controller.run());
        registry.track(task).await;
        Ok(())
    }

    /// Main session loop. Consumes exactly one response per armed wait;
    /// runs until the program terminates, the deadline elapses, or the
    /// process shuts down. Always retires the session on exit.
    async fn run(mut self) {
        debug!(session_id = %self.id, owner_id = %self.program.owner_id(), "session started");

        let mut deadline = Instant::now() + self.program.ttl();

        let status = loop {
            tokio::select! {
                maybe = self.response_rx.recv() => {
                    // Registry holds a sender for the session's lifetime, so
                    // a closed channel means the registry itself is gone.
                    let Some(choice) = maybe else {
                        break SessionStatus::Failed;
                    };

                    debug!(
                        session_id = %self.id,
                        choice_id = %choice.choice_id,
                        "response claimed the armed wait"
                    );

                    match self.program.advance(choice).await {
                        Ok(Advance::Finished(outcome)) => {
                            Self::render_edit(&self.chat, &self.chat_id, &self.id, outcome).await;
                            break SessionStatus::Completed;
                        }
                        Ok(Advance::Rearmed) => {
                            let payload = self.program.render();
                            Self::render_edit(&self.chat, &self.chat_id, &self.id, payload).await;
                            self.discard_stale();
                            deadline = Instant::now() + self.program.ttl();
                        }
                        Ok(Advance::Chained(delegate)) => {
                            debug!(session_id = %self.id, "session chained to delegate program");
                            self.program = delegate;
                            let payload = self.program.render();
                            Self::render_edit(&self.chat, &self.chat_id, &self.id, payload).await;
                            self.discard_stale();
                            deadline = Instant::now() + self.program.ttl();
                        }
                        Err(e) => {
                            // Full detail stays in the log; the user sees
                            // only the generic failure payload.
                            error!(
                                session_id = %self.id,
                                error = %format!("{e:#}"),
                                "session step failed"
                            );
                            Self::render_edit(&self.chat, &self.chat_id, &self.id, failure_payload()).await;
                            break SessionStatus::Failed;
                        }
                    }
                }

                _ = tokio::time::sleep_until(deadline) => {
                    let payload = self.expired_payload();
                    Self::render_edit(&self.chat, &self.chat_id, &self.id, payload).await;
                    break SessionStatus::Expired;
                }

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        debug!(session_id = %self.id, "session stopping for shutdown");
                        break SessionStatus::Expired;
                    }
                }
            }
        };

        self.registry.retire(&self.id);
        debug!(session_id = %self.id, status = %status, "session retired");
    }

    /// Edit the bound message; delivery failures are logged, never fatal
    /// to the state machine.
    ///
    /// Borrows only the chat fields rather than `&self` so the returned
    /// future does not carry the non-`Sync` program across the await,
    /// keeping the spawned session task `Send`.
    async fn render_edit(chat: &Arc<dyn ChatPort>, chat_id: &str, id: &str, payload: DisplayPayload) {
        if let Err(e) = chat.edit(chat_id, id, payload).await {
            warn!(session_id = %id, error = %e, "failed to render session update");
        }
    }

    /// Drop responses that arrived while a step was running. They raced
    /// the wait that was already claimed and must not touch the new one.
    fn discard_stale(&mut self) {
        while let Ok(stale) = self.response_rx.try_recv() {
            debug!(
                session_id = %self.id,
                choice_id = %stale.choice_id,
                "dropping stale response"
            );
        }
    }

    /// The last render with every action disabled and the expiry notice
    /// appended.
    fn expired_payload(&self) -> DisplayPayload {
        let mut payload = self.program.render().disabled();
        let notice = self.program.expired_notice();
        if payload.body.is_empty() {
            payload.body = notice.to_string();
        } else {
            payload.body = format!("{}\n\n*{}*", payload.body, notice);
        }
        payload
    }
}

/// Generic user-facing failure payload. Error detail never appears here.
pub fn failure_payload() -> DisplayPayload {
    DisplayPayload::text(
        "Something went wrong while contacting the game service. Please try again later.",
    )
    .with_color(COLOR_FAILURE)
}
