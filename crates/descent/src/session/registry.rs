//! Process-wide table of active sessions.
//!
//! The registry is the only shared mutable structure in the session engine.
//! It is constructed at startup and passed by handle to the broker (lookup)
//! and the controllers (register/retire), so tests can swap in their own.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::chat::ChatError;

use super::handle::SessionHandle;

// ============================================================================
// Errors
// ============================================================================

/// Errors from session lifecycle operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A non-retired session already owns the target message.
    #[error("a session already owns message {0}")]
    RegistrationConflict(String),

    /// The initial render could not be delivered.
    #[error("chat delivery failed: {0}")]
    Chat(#[from] ChatError),
}

// ============================================================================
// Session Registry
// ============================================================================

/// Registry of active sessions, keyed by the id of the bound message.
///
/// Guarantees at most one active session per id: registering over a live
/// entry fails with [`SessionError::RegistrationConflict`]. Thread-safe and
/// cheap to clone.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, SessionHandle>>,
    /// Controller task handles, awaited at shutdown.
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            sessions: Arc::new(DashMap::new()),
            tasks: Arc::new(Mutex::new(Vec::new())),
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        }
    }

    /// Register a session under its message id.
    ///
    /// Fails if a non-retired session already owns the id; the atomic
    /// entry check makes concurrent registrations race safely.
    pub fn register(&self, handle: SessionHandle) -> Result<(), SessionError> {
        match self.sessions.entry(handle.id().to_string()) {
            Entry::Occupied(entry) => {
                warn!(session_id = %entry.key(), "rejected duplicate session registration");
                Err(SessionError::RegistrationConflict(entry.key().clone()))
            }
            Entry::Vacant(entry) => {
                entry.insert(handle);
                Ok(())
            }
        }
    }

    /// Look up the session bound to a message id.
    pub fn lookup(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Remove a session from the registry.
    ///
    /// Safe to call more than once; returns whether an entry was removed.
    pub fn retire(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Number of active sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Track a controller task for graceful shutdown.
    pub(crate) async fn track(&self, task: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().await;
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    /// Watch channel that flips to `true` when shutdown begins.
    pub(crate) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Signal all session controllers to stop and wait for them.
    pub async fn shutdown(&self) {
        info!(active = self.len(), "shutting down session registry");

        if self.shutdown_tx.send(true).is_err() {
            warn!("failed to send session shutdown signal");
            return;
        }

        let tasks = {
            let mut tasks = self.tasks.lock().await;
            std::mem::take(&mut *tasks)
        };
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = ?e, "session controller panicked during shutdown");
            }
        }

        info!("session registry shutdown complete");
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::handle::RESPONSE_CHANNEL_CAPACITY;
    use tokio::sync::mpsc;

    fn handle(id: &str) -> SessionHandle {
        let (tx, rx) = mpsc::channel(RESPONSE_CHANNEL_CAPACITY);
        // Leak the receiver so the channel stays open for the test.
        std::mem::forget(rx);
        SessionHandle::new(id.to_string(), "owner".to_string(), tx)
    }

    #[tokio::test]
    async fn register_then_lookup() {
        let registry = SessionRegistry::new();

        registry.register(handle("msg_1")).unwrap();

        let found = registry.lookup("msg_1").unwrap();
        assert_eq!(found.id(), "msg_1");
        assert_eq!(found.owner_id(), "owner");
        assert!(registry.lookup("msg_2").is_none());
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let registry = SessionRegistry::new();

        registry.register(handle("msg_1")).unwrap();
        let err = registry.register(handle("msg_1")).unwrap_err();
        assert!(matches!(err, SessionError::RegistrationConflict(id) if id == "msg_1"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_registrations_admit_exactly_one() {
        let registry = SessionRegistry::new();

        let mut joins = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            joins.push(tokio::spawn(async move {
                registry.register(handle("msg_contested")).is_ok()
            }));
        }

        let mut admitted = 0;
        for join in joins {
            if join.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn retire_is_idempotent() {
        let registry = SessionRegistry::new();
        registry.register(handle("msg_1")).unwrap();

        assert!(registry.retire("msg_1"));
        assert!(registry.lookup("msg_1").is_none());
        assert!(!registry.retire("msg_1"));
        assert!(!registry.retire("never_registered"));
    }

    #[tokio::test]
    async fn retirement_frees_the_id_for_reuse() {
        let registry = SessionRegistry::new();

        registry.register(handle("msg_1")).unwrap();
        registry.retire("msg_1");
        registry.register(handle("msg_1")).unwrap();
        assert_eq!(registry.len(), 1);
    }
}
