//! Discord gateway for Descent using serenity.
//!
//! Bridges the Discord Bot API to the gateway protocol: registers the slash
//! command catalogue on ready, translates interactions into protocol
//! events, and renders [`DisplayPayload`]s as embeds with button rows.
//!
//! Slash invocations are deferred immediately (Discord's three-second rule)
//! and answered when the core sends the first `SendMessage` carrying the
//! interaction token; button presses are answered when the core sends
//! `AnswerCallbackQuery`, as an ephemeral notice when text is attached.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use serenity::all::{
    ButtonStyle, ChannelId, Colour, CommandDataOption, CommandDataOptionValue,
    CommandInteraction, CommandOptionType, ComponentInteraction, CreateActionRow, CreateButton,
    CreateCommand, CreateCommandOption, CreateEmbed, CreateEmbedFooter,
    CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage, EditMessage,
    EditInteractionResponse, GatewayIntents, GuildId, MessageId,
};
use serenity::async_trait;
use serenity::model::application::Interaction;
use serenity::model::gateway::Ready;
use serenity::model::user::User;
use serenity::prelude::*;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use descent_gateway_protocol::{
    ActionKind, ActionSpec, CallbackQueryData, CommandDef, CommandInvokedData, DisplayPayload,
    GatewayCommand, GatewayEvent, OptionDef, OptionKind, Sender, capabilities,
};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the Discord gateway.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    /// Discord bot token.
    pub bot_token: String,
    /// Guild to register commands in; global registration when `None`
    /// (global rollout can take up to an hour on Discord's side).
    pub guild_id: Option<u64>,
    /// Slash command catalogue to register.
    pub commands: Vec<CommandDef>,
}

// ============================================================================
// Discord Gateway
// ============================================================================

/// Discord gateway bridging the Bot API with the Descent core.
pub struct DiscordGateway {
    config: DiscordConfig,
    started_at: Instant,
}

impl DiscordGateway {
    pub fn new(config: DiscordConfig) -> Self {
        Self {
            config,
            started_at: Instant::now(),
        }
    }

    /// Start the gateway and communicate via the provided channels.
    ///
    /// Blocks until shutdown is requested.
    pub async fn start(
        self,
        event_tx: mpsc::Sender<GatewayEvent>,
        mut command_rx: mpsc::Receiver<GatewayCommand>,
    ) {
        let intents = GatewayIntents::GUILDS;

        let pending_commands: Arc<DashMap<String, CommandInteraction>> = Arc::new(DashMap::new());
        let pending_components: Arc<DashMap<String, ComponentInteraction>> =
            Arc::new(DashMap::new());

        let handler = Handler {
            event_tx: event_tx.clone(),
            commands: self.config.commands.clone(),
            guild_id: self.config.guild_id,
            pending_commands: pending_commands.clone(),
            pending_components: pending_components.clone(),
        };

        let mut client = match Client::builder(&self.config.bot_token, intents)
            .event_handler(handler)
            .await
        {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "failed to create Discord client");
                let _ = event_tx
                    .send(GatewayEvent::Error {
                        code: "client_error".to_string(),
                        message: e.to_string(),
                        fatal: true,
                    })
                    .await;
                return;
            }
        };

        let ready_event = GatewayEvent::Ready {
            gateway: "discord".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            capabilities: vec![
                capabilities::EDIT.to_string(),
                capabilities::BUTTONS.to_string(),
                capabilities::EMBEDS.to_string(),
                capabilities::EPHEMERAL.to_string(),
            ],
        };
        if event_tx.send(ready_event).await.is_err() {
            error!("failed to send ready event");
            return;
        }

        info!("Discord gateway started");

        let http = client.http.clone();
        let shard_manager = client.shard_manager.clone();
        let event_tx_for_commands = event_tx.clone();
        let started_at = self.started_at;

        // Command handler: core → Discord.
        let command_handle = tokio::spawn(async move {
            let shard_manager = shard_manager;
            while let Some(command) = command_rx.recv().await {
                match command {
                    GatewayCommand::SendMessage {
                        request_id,
                        chat_id,
                        interaction_token,
                        payload,
                    } => {
                        let result = send_payload(
                            &http,
                            &pending_commands,
                            &chat_id,
                            interaction_token.as_deref(),
                            &payload,
                        )
                        .await;

                        let event = match result {
                            Ok(message_id) => GatewayEvent::CommandOk {
                                request_id,
                                message_id: Some(message_id),
                            },
                            Err(e) => GatewayEvent::CommandError {
                                request_id,
                                code: "send_failed".to_string(),
                                message: e,
                            },
                        };
                        if event_tx_for_commands.send(event).await.is_err() {
                            break;
                        }
                    }

                    GatewayCommand::EditMessage {
                        request_id,
                        chat_id,
                        message_id,
                        payload,
                    } => {
                        let result = edit_payload(&http, &chat_id, &message_id, &payload).await;

                        let event = match result {
                            Ok(()) => GatewayEvent::CommandOk {
                                request_id,
                                message_id: Some(message_id),
                            },
                            Err(e) => GatewayEvent::CommandError {
                                request_id,
                                code: "edit_failed".to_string(),
                                message: e,
                            },
                        };
                        if event_tx_for_commands.send(event).await.is_err() {
                            break;
                        }
                    }

                    GatewayCommand::AnswerCallbackQuery {
                        callback_query_id,
                        text,
                        ..
                    } => {
                        let Some((_, component)) = pending_components.remove(&callback_query_id)
                        else {
                            debug!(
                                callback_query_id = %callback_query_id,
                                "no pending interaction for callback answer"
                            );
                            continue;
                        };

                        let response = match text {
                            Some(text) => CreateInteractionResponse::Message(
                                CreateInteractionResponseMessage::new()
                                    .content(text)
                                    .ephemeral(true),
                            ),
                            None => CreateInteractionResponse::Acknowledge,
                        };
                        if let Err(e) = component.create_response(&http, response).await {
                            warn!(error = %e, "failed to answer component interaction");
                        }
                    }

                    GatewayCommand::Ping { request_id } => {
                        let event = GatewayEvent::Pong {
                            request_id,
                            uptime_seconds: started_at.elapsed().as_secs(),
                            connected: true,
                        };
                        if event_tx_for_commands.send(event).await.is_err() {
                            break;
                        }
                    }

                    GatewayCommand::Shutdown => {
                        info!("Discord gateway received shutdown command");
                        shard_manager.shutdown_all().await;
                        let _ = event_tx_for_commands
                            .send(GatewayEvent::Shutdown {
                                reason: "shutdown requested".to_string(),
                            })
                            .await;
                        break;
                    }
                }
            }
            debug!("command handler stopped");
        });

        // Start the Discord client (blocks until shutdown).
        if let Err(e) = client.start().await {
            error!(error = %e, "Discord client error");
        }

        command_handle.abort();
        info!("Discord gateway stopped");
    }
}

// ============================================================================
// Event Handler
// ============================================================================

struct Handler {
    event_tx: mpsc::Sender<GatewayEvent>,
    commands: Vec<CommandDef>,
    guild_id: Option<u64>,
    /// Deferred slash invocations awaiting the core's reply, by token.
    pending_commands: Arc<DashMap<String, CommandInteraction>>,
    /// Unanswered button presses, by interaction id.
    pending_components: Arc<DashMap<String, ComponentInteraction>>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            user = %ready.user.name,
            user_id = %ready.user.id,
            "Discord bot connected"
        );

        let commands: Vec<CreateCommand> = self.commands.iter().map(create_command).collect();
        let count = commands.len();
        let result = match self.guild_id {
            Some(id) => GuildId::new(id).set_commands(&ctx.http, commands).await,
            None => {
                serenity::model::application::Command::set_global_commands(&ctx.http, commands)
                    .await
            }
        };

        match result {
            Ok(registered) => info!(
                requested = count,
                registered = registered.len(),
                "slash commands registered"
            ),
            Err(e) => error!(error = %e, "failed to register slash commands"),
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => {
                // Defer within Discord's three-second window; the core
                // answers through the stashed token.
                if let Err(e) = command.defer(&ctx.http).await {
                    warn!(
                        command = %command.data.name,
                        error = %e,
                        "failed to defer command interaction"
                    );
                    return;
                }

                let (subcommand, options) = extract_options(&command.data.options);
                let data = CommandInvokedData {
                    command: command.data.name.clone(),
                    subcommand,
                    options,
                    chat_id: command.channel_id.to_string(),
                    interaction_token: Some(command.token.clone()),
                    sender: sender_of(&command.user),
                    timestamp: Some(Utc::now()),
                };

                self.pending_commands
                    .insert(command.token.clone(), command);

                if let Err(e) = self
                    .event_tx
                    .send(GatewayEvent::CommandInvoked(Box::new(data)))
                    .await
                {
                    warn!(error = %e, "failed to forward command invocation");
                }
            }

            Interaction::Component(component) => {
                let data = CallbackQueryData {
                    callback_query_id: component.id.to_string(),
                    chat_id: component.channel_id.to_string(),
                    sender: sender_of(&component.user),
                    message_id: component.message.id.to_string(),
                    choice_id: component.data.custom_id.clone(),
                    timestamp: Some(Utc::now()),
                };

                self.pending_components
                    .insert(component.id.to_string(), component);

                if let Err(e) = self
                    .event_tx
                    .send(GatewayEvent::CallbackQuery(Box::new(data)))
                    .await
                {
                    warn!(error = %e, "failed to forward callback query");
                }
            }

            _ => {}
        }
    }
}

fn sender_of(user: &User) -> Sender {
    Sender {
        id: user.id.to_string(),
        username: Some(user.name.clone()),
        display_name: user.global_name.clone(),
    }
}

// ============================================================================
// Option Extraction
// ============================================================================

fn extract_options(
    options: &[CommandDataOption],
) -> (Option<String>, HashMap<String, String>) {
    if let Some(first) = options.first()
        && let CommandDataOptionValue::SubCommand(nested) = &first.value
    {
        return (Some(first.name.clone()), flatten_options(nested));
    }
    (None, flatten_options(options))
}

fn flatten_options(options: &[CommandDataOption]) -> HashMap<String, String> {
    options
        .iter()
        .filter_map(|opt| stringify(&opt.value).map(|v| (opt.name.clone(), v)))
        .collect()
}

fn stringify(value: &CommandDataOptionValue) -> Option<String> {
    match value {
        CommandDataOptionValue::String(s) => Some(s.clone()),
        CommandDataOptionValue::Integer(i) => Some(i.to_string()),
        CommandDataOptionValue::Number(n) => Some(n.to_string()),
        CommandDataOptionValue::Boolean(b) => Some(b.to_string()),
        CommandDataOptionValue::User(id) => Some(id.get().to_string()),
        _ => None,
    }
}

// ============================================================================
// Command Registration
// ============================================================================

fn create_command(def: &CommandDef) -> CreateCommand {
    let mut command = CreateCommand::new(&def.name).description(&def.description);
    for option in &def.options {
        command = command.add_option(create_option(option));
    }
    for sub in &def.subcommands {
        let mut sub_option =
            CreateCommandOption::new(CommandOptionType::SubCommand, &sub.name, &sub.description);
        for option in &sub.options {
            sub_option = sub_option.add_sub_option(create_option(option));
        }
        command = command.add_option(sub_option);
    }
    command
}

fn create_option(def: &OptionDef) -> CreateCommandOption {
    CreateCommandOption::new(option_type(def.kind), &def.name, &def.description)
        .required(def.required)
}

fn option_type(kind: OptionKind) -> CommandOptionType {
    match kind {
        OptionKind::String => CommandOptionType::String,
        OptionKind::Integer => CommandOptionType::Integer,
        OptionKind::User => CommandOptionType::User,
    }
}

// ============================================================================
// Payload Rendering
// ============================================================================

fn build_embed(payload: &DisplayPayload) -> CreateEmbed {
    let mut embed = CreateEmbed::new().description(payload.body.clone());
    if let Some(ref title) = payload.title {
        embed = embed.title(title.clone());
    }
    if let Some(color) = payload.color {
        embed = embed.colour(Colour::new(color));
    }
    for field in &payload.fields {
        embed = embed.field(field.name.clone(), field.value.clone(), field.inline);
    }
    if let Some(ref url) = payload.image_url {
        embed = embed.image(url.clone());
    }
    if let Some(ref footer) = payload.footer {
        embed = embed.footer(CreateEmbedFooter::new(footer.clone()));
    }
    embed
}

fn build_components(payload: &DisplayPayload) -> Vec<CreateActionRow> {
    payload
        .actions
        .iter()
        .map(|row| CreateActionRow::Buttons(row.iter().map(build_button).collect()))
        .collect()
}

fn build_button(action: &ActionSpec) -> CreateButton {
    CreateButton::new(&action.id)
        .label(&action.label)
        .style(button_style(action.kind))
        .disabled(action.disabled)
}

fn button_style(kind: ActionKind) -> ButtonStyle {
    match kind {
        ActionKind::Primary => ButtonStyle::Primary,
        ActionKind::Secondary => ButtonStyle::Secondary,
        ActionKind::Success => ButtonStyle::Success,
        ActionKind::Danger => ButtonStyle::Danger,
    }
}

// ============================================================================
// Command Execution
// ============================================================================

async fn send_payload(
    http: &Arc<serenity::http::Http>,
    pending_commands: &Arc<DashMap<String, CommandInteraction>>,
    chat_id: &str,
    interaction_token: Option<&str>,
    payload: &DisplayPayload,
) -> Result<String, String> {
    // Answer the deferred invocation when we still hold its interaction;
    // the edited response is a real message with a real id.
    if let Some(token) = interaction_token
        && let Some((_, interaction)) = pending_commands.remove(token)
    {
        let builder = EditInteractionResponse::new()
            .embed(build_embed(payload))
            .components(build_components(payload));
        let message = interaction
            .edit_response(http, builder)
            .await
            .map_err(|e| e.to_string())?;
        return Ok(message.id.to_string());
    }

    let channel_id: u64 = chat_id.parse().map_err(|_| "invalid chat_id".to_string())?;
    let builder = CreateMessage::new()
        .embed(build_embed(payload))
        .components(build_components(payload));
    let message = ChannelId::new(channel_id)
        .send_message(http, builder)
        .await
        .map_err(|e| e.to_string())?;
    Ok(message.id.to_string())
}

async fn edit_payload(
    http: &Arc<serenity::http::Http>,
    chat_id: &str,
    message_id: &str,
    payload: &DisplayPayload,
) -> Result<(), String> {
    let channel_id: u64 = chat_id.parse().map_err(|_| "invalid chat_id".to_string())?;
    let msg_id: u64 = message_id
        .parse()
        .map_err(|_| "invalid message_id".to_string())?;

    let builder = EditMessage::new()
        .embed(build_embed(payload))
        .components(build_components(payload));

    ChannelId::new(channel_id)
        .edit_message(http, MessageId::new(msg_id), builder)
        .await
        .map_err(|e| e.to_string())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use descent_gateway_protocol::SubcommandDef;

    #[test]
    fn button_styles_map_one_to_one() {
        assert_eq!(button_style(ActionKind::Primary), ButtonStyle::Primary);
        assert_eq!(button_style(ActionKind::Secondary), ButtonStyle::Secondary);
        assert_eq!(button_style(ActionKind::Success), ButtonStyle::Success);
        assert_eq!(button_style(ActionKind::Danger), ButtonStyle::Danger);
    }

    #[test]
    fn stringify_covers_the_supported_kinds() {
        assert_eq!(
            stringify(&CommandDataOptionValue::String("x".to_string())),
            Some("x".to_string())
        );
        assert_eq!(
            stringify(&CommandDataOptionValue::Integer(5)),
            Some("5".to_string())
        );
        assert_eq!(
            stringify(&CommandDataOptionValue::Boolean(true)),
            Some("true".to_string())
        );
    }

    #[test]
    fn create_command_carries_subcommands() {
        let def = CommandDef::new("trade", "Trading").subcommand(
            SubcommandDef::new("accept", "Accept a trade").option(
                OptionDef::new("trade_id", "Trade to accept", OptionKind::Integer).required(),
            ),
        );
        // Builder output is opaque; just make sure construction does not
        // panic and the definition round-trips.
        let _ = create_command(&def);
        assert_eq!(def.subcommands[0].options[0].name, "trade_id");
    }
}
