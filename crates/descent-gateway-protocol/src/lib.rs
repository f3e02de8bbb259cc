//! Gateway Protocol types for communication between the Descent core and
//! chat gateway plugins.
//!
//! A gateway bridges one chat platform (Discord, Telegram, ...) to the bot
//! core. The protocol is bidirectional:
//!
//! - **Commands** (core → gateway): render a message, edit it, answer a
//!   button press.
//! - **Events** (gateway → core): a slash command was invoked, a button was
//!   pressed, a command completed.
//!
//! Built-in gateways exchange these types over Rust channels; every type is
//! serde-serializable (JSON Lines) so an external gateway process can speak
//! the same protocol.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Commands (core → gateway)
// ============================================================================

/// Commands sent from the core to a gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayCommand {
    /// Render a message into a chat.
    ///
    /// When `interaction_token` is set, the message answers a deferred
    /// command invocation instead of being posted as a free-standing
    /// message. Either way the gateway reports the created message id via
    /// `CommandOk`.
    SendMessage {
        request_id: String,
        chat_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        interaction_token: Option<String>,
        payload: DisplayPayload,
    },

    /// Replace the content of a previously sent message.
    EditMessage {
        request_id: String,
        chat_id: String,
        message_id: String,
        payload: DisplayPayload,
    },

    /// Answer a callback query (dismiss the loading state on a pressed
    /// button). With `text`, the gateway shows it privately to the actor.
    AnswerCallbackQuery {
        request_id: String,
        callback_query_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },

    /// Health check / ping.
    Ping { request_id: String },

    /// Request graceful shutdown.
    Shutdown,
}

// ============================================================================
// Display Payload
// ============================================================================

/// A platform-agnostic rendered message: rich text plus selectable actions.
///
/// Gateways map this to their native rich-message format (Discord embeds
/// with button components, for instance).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub body: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<DisplayField>,
    /// Accent color as 0xRRGGBB, if the platform supports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    /// Rows of selectable actions presented under the message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Vec<ActionSpec>>,
}

/// A labelled name/value pair inside a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

impl DisplayPayload {
    /// Create a payload with only body text.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_field(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        inline: bool,
    ) -> Self {
        self.fields.push(DisplayField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn with_actions(mut self, row: Vec<ActionSpec>) -> Self {
        self.actions.push(row);
        self
    }

    /// Return a copy with every action disabled.
    pub fn disabled(&self) -> Self {
        let mut copy = self.clone();
        for row in &mut copy.actions {
            for action in row {
                action.disabled = true;
            }
        }
        copy
    }

    /// Whether any enabled action remains.
    pub fn has_live_actions(&self) -> bool {
        self.actions
            .iter()
            .flatten()
            .any(|action| !action.disabled)
    }
}

// ============================================================================
// Action Spec
// ============================================================================

/// A presentable choice attached to a message.
///
/// `id` is the token matched against incoming callback queries; `label` and
/// `kind` are presentation hints the core never interprets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub kind: ActionKind,
    #[serde(default)]
    pub disabled: bool,
}

/// Visual style of an action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    #[default]
    Primary,
    Secondary,
    Success,
    Danger,
}

impl ActionSpec {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: ActionKind::Primary,
            disabled: false,
        }
    }

    pub fn kind(mut self, kind: ActionKind) -> Self {
        self.kind = kind;
        self
    }
}

// ============================================================================
// Events (gateway → core)
// ============================================================================

/// Events sent from a gateway to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// Gateway is connected and ready to receive commands.
    Ready {
        gateway: String,
        version: String,
        #[serde(default)]
        capabilities: Vec<String>,
    },

    /// A user invoked a chat command.
    CommandInvoked(Box<CommandInvokedData>),

    /// A user pressed an action button on a rendered message.
    CallbackQuery(Box<CallbackQueryData>),

    /// Command completed successfully.
    CommandOk {
        request_id: String,
        /// Id of the message the command created or edited, when known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },

    /// Command failed.
    CommandError {
        request_id: String,
        code: String,
        message: String,
    },

    /// Response to a Ping command.
    Pong {
        request_id: String,
        uptime_seconds: u64,
        connected: bool,
    },

    /// Gateway-level error not tied to a specific command.
    Error {
        code: String,
        message: String,
        /// Whether the gateway will shut down because of this error.
        #[serde(default)]
        fatal: bool,
    },

    /// Gateway is shutting down.
    Shutdown { reason: String },
}

/// Data for a command invocation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandInvokedData {
    /// Command name without the leading slash, e.g. `combat`.
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcommand: Option<String>,
    /// Named option values, stringified by the gateway.
    #[serde(default)]
    pub options: HashMap<String, String>,
    /// Chat where the command was invoked.
    pub chat_id: String,
    /// Platform token for answering the invocation, when the platform
    /// requires interaction-scoped replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_token: Option<String>,
    pub sender: Sender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Data for a callback query event (action button press).
///
/// `message_id` identifies the rendered message the button belongs to and
/// doubles as the interactive-session correlation id in the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackQueryData {
    /// Unique identifier for this callback query.
    pub callback_query_id: String,
    /// Chat where the callback originated.
    pub chat_id: String,
    /// User who pressed the button.
    pub sender: Sender,
    /// Message that carried the pressed action.
    pub message_id: String,
    /// `ActionSpec::id` of the pressed action.
    pub choice_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Sender identity attached to events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sender {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

// ============================================================================
// Command Definitions
// ============================================================================

/// Declarative description of a chat command.
///
/// The core owns the command catalogue; gateways translate it into their
/// platform's registration format (Discord slash commands, bot menus, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDef {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcommands: Vec<SubcommandDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubcommandDef {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionDef {
    pub name: String,
    pub description: String,
    pub kind: OptionKind,
    #[serde(default)]
    pub required: bool,
}

/// Value type of a command option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    String,
    Integer,
    User,
}

impl CommandDef {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            options: Vec::new(),
            subcommands: Vec::new(),
        }
    }

    pub fn option(mut self, option: OptionDef) -> Self {
        self.options.push(option);
        self
    }

    pub fn subcommand(mut self, subcommand: SubcommandDef) -> Self {
        self.subcommands.push(subcommand);
        self
    }
}

impl SubcommandDef {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            options: Vec::new(),
        }
    }

    pub fn option(mut self, option: OptionDef) -> Self {
        self.options.push(option);
        self
    }
}

impl OptionDef {
    pub fn new(name: impl Into<String>, description: impl Into<String>, kind: OptionKind) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

// ============================================================================
// Gateway Capabilities
// ============================================================================

/// Well-known gateway capabilities.
pub mod capabilities {
    /// Gateway supports editing messages in place.
    pub const EDIT: &str = "edit";
    /// Gateway supports action buttons on messages.
    pub const BUTTONS: &str = "buttons";
    /// Gateway supports rich embed rendering.
    pub const EMBEDS: &str = "embeds";
    /// Gateway supports private (ephemeral) notices to a single user.
    pub const EPHEMERAL: &str = "ephemeral";
}

// ============================================================================
// Error Codes
// ============================================================================

/// Well-known error codes for `CommandError` and `Error` events.
pub mod error_codes {
    /// Chat/channel not found.
    pub const CHAT_NOT_FOUND: &str = "chat_not_found";
    /// Message not found (for edits).
    pub const MESSAGE_NOT_FOUND: &str = "message_not_found";
    /// Rate limited by the platform.
    pub const RATE_LIMITED: &str = "rate_limited";
    /// Platform API error.
    pub const PLATFORM_ERROR: &str = "platform_error";
    /// Invalid request from the core.
    pub const INVALID_REQUEST: &str = "invalid_request";
    /// Gateway not connected to the platform.
    pub const NOT_CONNECTED: &str = "not_connected";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_serialization_roundtrip() {
        let cmd = GatewayCommand::SendMessage {
            request_id: "req_001".to_string(),
            chat_id: "123".to_string(),
            interaction_token: None,
            payload: DisplayPayload::text("A wild trader appears"),
        };

        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains(r#""type":"send_message""#));

        let parsed: GatewayCommand = serde_json::from_str(&json).unwrap();
        match parsed {
            GatewayCommand::SendMessage { payload, .. } => {
                assert_eq!(payload.body, "A wild trader appears");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = GatewayEvent::CallbackQuery(Box::new(CallbackQueryData {
            callback_query_id: "cb1".to_string(),
            chat_id: "42".to_string(),
            sender: Sender {
                id: "99".to_string(),
                username: Some("alice".to_string()),
                display_name: None,
            },
            message_id: "777".to_string(),
            choice_id: "combat:next".to_string(),
            timestamp: None,
        }));

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"callback_query""#));

        let parsed: GatewayEvent = serde_json::from_str(&json).unwrap();
        match parsed {
            GatewayEvent::CallbackQuery(data) => {
                assert_eq!(data.message_id, "777");
                assert_eq!(data.choice_id, "combat:next");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn disabled_copies_every_action() {
        let payload = DisplayPayload::text("round over")
            .with_actions(vec![
                ActionSpec::new("combat:next", "Next Round"),
                ActionSpec::new("combat:flee", "Flee").kind(ActionKind::Danger),
            ])
            .with_actions(vec![ActionSpec::new("combat:info", "Details")]);

        assert!(payload.has_live_actions());

        let disabled = payload.disabled();
        assert!(!disabled.has_live_actions());
        assert!(
            disabled
                .actions
                .iter()
                .flatten()
                .all(|action| action.disabled)
        );
        // the original is untouched
        assert!(payload.has_live_actions());
    }

    #[test]
    fn payload_builder_accumulates_fields() {
        let payload = DisplayPayload::text("body")
            .with_title("Combat Round")
            .with_color(0xE74C3C)
            .with_field("You", "12 / 20 HP", true)
            .with_field("Enemy", "0 / 15 HP", true)
            .with_footer("Page 1 of 3");

        assert_eq!(payload.title.as_deref(), Some("Combat Round"));
        assert_eq!(payload.fields.len(), 2);
        assert!(payload.fields.iter().all(|f| f.inline));
        assert_eq!(payload.footer.as_deref(), Some("Page 1 of 3"));
    }

    #[test]
    fn action_kind_defaults_to_primary() {
        let json = r#"{"id":"x","label":"X"}"#;
        let action: ActionSpec = serde_json::from_str(json).unwrap();
        assert_eq!(action.kind, ActionKind::Primary);
        assert!(!action.disabled);
    }
}
