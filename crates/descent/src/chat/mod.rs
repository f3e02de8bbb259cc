//! Chat gateway management: registration, outbound rendering, event pump.
//!
//! The [`ChatManager`] owns the channel pair of every registered gateway,
//! routes inbound events (command invocations, button presses) to the
//! configured [`EventHandler`], and correlates outbound commands with their
//! `CommandOk`/`CommandError` confirmations so callers can learn the id of
//! the message a render produced.
//!
//! The session engine drives rendering through the narrow [`ChatPort`]
//! trait; tests substitute an in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::{debug, error, info, warn};
use ulid::Ulid;

use descent_gateway_protocol::{
    CallbackQueryData, CommandInvokedData, DisplayPayload, GatewayCommand, GatewayEvent,
};

/// Default timeout for a command handler run (covers backend calls).
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

/// Default wait for a gateway to confirm an outbound command.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(10);

const CHANNEL_CAPACITY: usize = 100;

// ============================================================================
// Errors
// ============================================================================

/// Errors delivering to or through a gateway.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("gateway {0} not registered")]
    GatewayNotFound(String),

    #[error("gateway channel closed")]
    ChannelClosed,

    #[error("gateway did not confirm the command in time")]
    ConfirmTimeout,

    #[error("gateway error ({code}): {message}")]
    Gateway { code: String, message: String },

    #[error("gateway confirmed without a message id")]
    NoMessageId,
}

// ============================================================================
// Ports and Handlers
// ============================================================================

/// Outbound rendering surface consumed by the session engine and commands.
#[async_trait]
pub trait ChatPort: Send + Sync {
    /// Render a payload into a chat; returns the created message id.
    ///
    /// With `interaction_token` set, the payload answers a deferred command
    /// invocation instead of being posted stand-alone.
    async fn post(
        &self,
        chat_id: &str,
        interaction_token: Option<&str>,
        payload: DisplayPayload,
    ) -> Result<String, ChatError>;

    /// Replace the content of an existing message.
    async fn edit(
        &self,
        chat_id: &str,
        message_id: &str,
        payload: DisplayPayload,
    ) -> Result<(), ChatError>;
}

/// Handler for inbound gateway events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle a command invocation. The handler replies through its own
    /// [`ChatPort`]; slow backend calls run off the event-pump path.
    async fn handle_command(&self, gateway: &str, data: &CommandInvokedData);

    /// Handle a button press. Must not block: routing decisions only.
    ///
    /// Returns an optional private notice for the pressing user.
    fn handle_callback(&self, gateway: &str, data: &CallbackQueryData) -> Option<String>;
}

// ============================================================================
// Chat Manager
// ============================================================================

type Confirm = Result<Option<String>, ChatError>;

/// Manager for all registered chat gateways. Cheap to clone.
#[derive(Clone)]
pub struct ChatManager {
    inner: Arc<RwLock<ManagerInner>>,
    /// Outstanding confirmations by request id.
    pending: Arc<DashMap<String, oneshot::Sender<Confirm>>>,
    handler_timeout: Duration,
    confirm_timeout: Duration,
}

struct ManagerInner {
    gateways: HashMap<String, mpsc::Sender<GatewayCommand>>,
    handler: Option<Arc<dyn EventHandler>>,
    event_tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl ChatManager {
    pub fn new(handler_timeout: Duration, confirm_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ManagerInner {
                gateways: HashMap::new(),
                handler: None,
                event_tasks: Vec::new(),
            })),
            pending: Arc::new(DashMap::new()),
            handler_timeout,
            confirm_timeout,
        }
    }

    /// Set the handler for inbound events.
    pub async fn set_handler(&self, handler: Arc<dyn EventHandler>) {
        let mut inner = self.inner.write().await;
        inner.handler = Some(handler);
    }

    /// Register a gateway and get its communication channels.
    ///
    /// Returns the command receiver (core → gateway) and the event sender
    /// (gateway → core); an event pump for the gateway is spawned here.
    pub async fn register(
        &self,
        name: impl Into<String>,
    ) -> (mpsc::Receiver<GatewayCommand>, mpsc::Sender<GatewayEvent>) {
        let name = name.into();
        let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (evt_tx, evt_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let pump = {
            let manager = self.clone();
            let gateway = name.clone();
            tokio::spawn(async move {
                manager.pump_events(gateway, evt_rx).await;
            })
        };

        {
            let mut inner = self.inner.write().await;
            inner.gateways.insert(name.clone(), cmd_tx);
            inner.event_tasks.push(pump);
        }

        info!(gateway = %name, "gateway registered");
        (cmd_rx, evt_tx)
    }

    /// Remove a gateway.
    pub async fn unregister(&self, name: &str) {
        let mut inner = self.inner.write().await;
        if inner.gateways.remove(name).is_some() {
            info!(gateway = %name, "gateway unregistered");
        }
    }

    /// A [`ChatPort`] bound to one gateway.
    pub fn port(&self, gateway: &str) -> Arc<dyn ChatPort> {
        Arc::new(GatewayPort {
            manager: self.clone(),
            gateway: gateway.to_string(),
        })
    }

    /// Answer a callback query, optionally with a private notice.
    /// Fire-and-forget: the gateway needs no confirmation here.
    pub async fn answer_callback(
        &self,
        gateway: &str,
        callback_query_id: &str,
        text: Option<String>,
    ) -> Result<(), ChatError> {
        let tx = self.command_tx(gateway).await?;
        tx.send(GatewayCommand::AnswerCallbackQuery {
            request_id: Ulid::new().to_string(),
            callback_query_id: callback_query_id.to_string(),
            text,
        })
        .await
        .map_err(|_| ChatError::ChannelClosed)
    }

    /// Shutdown all gateways gracefully and wait for their event pumps.
    pub async fn shutdown(&self) {
        let gateways: Vec<_> = {
            let inner = self.inner.read().await;
            inner.gateways.clone().into_iter().collect()
        };
        for (name, tx) in gateways {
            debug!(gateway = %name, "sending shutdown to gateway");
            let _ = tx.send(GatewayCommand::Shutdown).await;
        }

        let tasks = {
            let mut inner = self.inner.write().await;
            std::mem::take(&mut inner.event_tasks)
        };
        for task in tasks {
            let _ = task.await;
        }
    }

    // ------------------------------------------------------------------------
    // Outbound delivery
    // ------------------------------------------------------------------------

    async fn command_tx(&self, gateway: &str) -> Result<mpsc::Sender<GatewayCommand>, ChatError> {
        let inner = self.inner.read().await;
        inner
            .gateways
            .get(gateway)
            .cloned()
            .ok_or_else(|| ChatError::GatewayNotFound(gateway.to_string()))
    }

    /// Send a command and wait for its `CommandOk`/`CommandError`.
    async fn deliver(
        &self,
        gateway: &str,
        request_id: String,
        command: GatewayCommand,
    ) -> Result<Option<String>, ChatError> {
        let tx = self.command_tx(gateway).await?;

        let (confirm_tx, confirm_rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), confirm_tx);

        if tx.send(command).await.is_err() {
            self.pending.remove(&request_id);
            return Err(ChatError::ChannelClosed);
        }

        match tokio::time::timeout(self.confirm_timeout, confirm_rx).await {
            Ok(Ok(confirm)) => confirm,
            Ok(Err(_)) => Err(ChatError::ChannelClosed),
            Err(_) => {
                self.pending.remove(&request_id);
                Err(ChatError::ConfirmTimeout)
            }
        }
    }

    fn resolve_pending(&self, request_id: &str, confirm: Confirm) {
        match self.pending.remove(request_id) {
            Some((_, tx)) => {
                let _ = tx.send(confirm);
            }
            None => debug!(request_id = %request_id, "confirmation without a waiting request"),
        }
    }

    // ------------------------------------------------------------------------
    // Event pump
    // ------------------------------------------------------------------------

    async fn pump_events(&self, gateway: String, mut rx: mpsc::Receiver<GatewayEvent>) {
        let mut inflight = tokio::task::JoinSet::new();

        while let Some(event) = rx.recv().await {
            while inflight.try_join_next().is_some() {}

            match event {
                GatewayEvent::Ready {
                    gateway: reported,
                    version,
                    capabilities,
                } => {
                    info!(
                        gateway = %gateway,
                        reported_name = %reported,
                        version = %version,
                        capabilities = ?capabilities,
                        "gateway ready"
                    );
                }

                GatewayEvent::CommandInvoked(data) => {
                    debug!(
                        gateway = %gateway,
                        command = %data.command,
                        chat_id = %data.chat_id,
                        sender_id = %data.sender.id,
                        "command invoked"
                    );

                    let handler = {
                        let inner = self.inner.read().await;
                        inner.handler.clone()
                    };
                    let Some(handler) = handler else {
                        warn!(gateway = %gateway, "no event handler registered");
                        continue;
                    };

                    let gateway = gateway.clone();
                    let handler_timeout = self.handler_timeout;
                    inflight.spawn(async move {
                        let run = handler.handle_command(&gateway, &data);
                        if tokio::time::timeout(handler_timeout, run).await.is_err() {
                            warn!(
                                gateway = %gateway,
                                command = %data.command,
                                timeout_secs = handler_timeout.as_secs(),
                                "command handler timed out"
                            );
                        }
                    });
                }

                GatewayEvent::CallbackQuery(data) => {
                    debug!(
                        gateway = %gateway,
                        message_id = %data.message_id,
                        choice_id = %data.choice_id,
                        sender_id = %data.sender.id,
                        "callback query received"
                    );

                    let handler = {
                        let inner = self.inner.read().await;
                        inner.handler.clone()
                    };
                    let Some(handler) = handler else {
                        continue;
                    };

                    // Routing is non-blocking; the session's own task does
                    // the slow work. Answer immediately either way so the
                    // platform dismisses its loading state.
                    let notice = handler.handle_callback(&gateway, &data);
                    if let Err(e) = self
                        .answer_callback(&gateway, &data.callback_query_id, notice)
                        .await
                    {
                        warn!(
                            gateway = %gateway,
                            callback_query_id = %data.callback_query_id,
                            error = %e,
                            "failed to answer callback query"
                        );
                    }
                }

                GatewayEvent::CommandOk {
                    request_id,
                    message_id,
                } => {
                    self.resolve_pending(&request_id, Ok(message_id));
                }

                GatewayEvent::CommandError {
                    request_id,
                    code,
                    message,
                } => {
                    error!(
                        gateway = %gateway,
                        request_id = %request_id,
                        code = %code,
                        message = %message,
                        "gateway command failed"
                    );
                    self.resolve_pending(&request_id, Err(ChatError::Gateway { code, message }));
                }

                GatewayEvent::Pong {
                    request_id,
                    uptime_seconds,
                    connected,
                } => {
                    debug!(
                        gateway = %gateway,
                        request_id = %request_id,
                        uptime_seconds,
                        connected,
                        "gateway pong"
                    );
                }

                GatewayEvent::Error {
                    code,
                    message,
                    fatal,
                } => {
                    if fatal {
                        error!(gateway = %gateway, code = %code, message = %message, "fatal gateway error");
                        self.unregister(&gateway).await;
                    } else {
                        warn!(gateway = %gateway, code = %code, message = %message, "gateway error");
                    }
                }

                GatewayEvent::Shutdown { reason } => {
                    info!(gateway = %gateway, reason = %reason, "gateway shutdown");
                    self.unregister(&gateway).await;
                    break;
                }
            }
        }

        while inflight.join_next().await.is_some() {}
        debug!(gateway = %gateway, "gateway event pump stopped");
    }
}

impl Default for ChatManager {
    fn default() -> Self {
        Self::new(DEFAULT_HANDLER_TIMEOUT, DEFAULT_CONFIRM_TIMEOUT)
    }
}

// ============================================================================
// Gateway Port
// ============================================================================

struct GatewayPort {
    manager: ChatManager,
    gateway: String,
}

#[async_trait]
impl ChatPort for GatewayPort {
    async fn post(
        &self,
        chat_id: &str,
        interaction_token: Option<&str>,
        payload: DisplayPayload,
    ) -> Result<String, ChatError> {
        let request_id = Ulid::new().to_string();
        let command = GatewayCommand::SendMessage {
            request_id: request_id.clone(),
            chat_id: chat_id.to_string(),
            interaction_token: interaction_token.map(str::to_string),
            payload,
        };

        match self.manager.deliver(&self.gateway, request_id, command).await? {
            Some(message_id) => Ok(message_id),
            None => Err(ChatError::NoMessageId),
        }
    }

    async fn edit(
        &self,
        chat_id: &str,
        message_id: &str,
        payload: DisplayPayload,
    ) -> Result<(), ChatError> {
        let request_id = Ulid::new().to_string();
        let command = GatewayCommand::EditMessage {
            request_id: request_id.clone(),
            chat_id: chat_id.to_string(),
            message_id: message_id.to_string(),
            payload,
        };

        self.manager
            .deliver(&self.gateway, request_id, command)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fake gateway loop answering every confirmable command.
    fn echo_gateway(
        mut cmd_rx: mpsc::Receiver<GatewayCommand>,
        evt_tx: mpsc::Sender<GatewayEvent>,
        fail: bool,
    ) {
        tokio::spawn(async move {
            let mut next_message_id = 1000u64;
            while let Some(command) = cmd_rx.recv().await {
                let request_id = match command {
                    GatewayCommand::SendMessage { request_id, .. } => {
                        next_message_id += 1;
                        let event = if fail {
                            GatewayEvent::CommandError {
                                request_id,
                                code: "platform_error".to_string(),
                                message: "boom".to_string(),
                            }
                        } else {
                            GatewayEvent::CommandOk {
                                request_id,
                                message_id: Some(next_message_id.to_string()),
                            }
                        };
                        let _ = evt_tx.send(event).await;
                        continue;
                    }
                    GatewayCommand::EditMessage { request_id, .. } => request_id,
                    GatewayCommand::Shutdown => {
                        let _ = evt_tx
                            .send(GatewayEvent::Shutdown {
                                reason: "requested".to_string(),
                            })
                            .await;
                        break;
                    }
                    _ => continue,
                };
                let _ = evt_tx
                    .send(GatewayEvent::CommandOk {
                        request_id,
                        message_id: None,
                    })
                    .await;
            }
        });
    }

    #[tokio::test]
    async fn post_resolves_with_created_message_id() {
        let manager = ChatManager::default();
        let (cmd_rx, evt_tx) = manager.register("fake").await;
        echo_gateway(cmd_rx, evt_tx, false);

        let port = manager.port("fake");
        let id = port
            .post("chat_1", None, DisplayPayload::text("hello"))
            .await
            .unwrap();
        assert_eq!(id, "1001");

        port.edit("chat_1", &id, DisplayPayload::text("edited"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn gateway_error_surfaces_to_caller() {
        let manager = ChatManager::default();
        let (cmd_rx, evt_tx) = manager.register("fake").await;
        echo_gateway(cmd_rx, evt_tx, true);

        let port = manager.port("fake");
        let err = port
            .post("chat_1", None, DisplayPayload::text("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Gateway { code, .. } if code == "platform_error"));
    }

    #[tokio::test]
    async fn unconfirmed_command_times_out() {
        let manager = ChatManager::new(DEFAULT_HANDLER_TIMEOUT, Duration::from_millis(50));
        let (_cmd_rx, _evt_tx) = manager.register("mute").await;

        let port = manager.port("mute");
        let err = port
            .post("chat_1", None, DisplayPayload::text("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::ConfirmTimeout));
    }

    #[tokio::test]
    async fn unknown_gateway_is_an_error() {
        let manager = ChatManager::default();
        let port = manager.port("ghost");
        let err = port
            .post("chat_1", None, DisplayPayload::text("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::GatewayNotFound(name) if name == "ghost"));
    }
}
