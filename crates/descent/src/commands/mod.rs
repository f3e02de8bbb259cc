//! Chat command handlers.
//!
//! Each module owns one command: its option parsing, its calls into the
//! game service, and its rendering. Interactive commands hand a
//! [`SessionSpec`](crate::session::SessionSpec) to the session engine;
//! plain commands reply once and are done.

pub mod balance;
pub mod barter;
pub mod combat;
pub mod explore;
pub mod help;
pub mod inventory;
pub mod roll;
pub mod shop;
pub mod start;
pub mod stats;
pub mod story;
pub mod trade;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, warn};

use descent_gateway_protocol::{
    ActionSpec, CallbackQueryData, CommandDef, CommandInvokedData, DisplayPayload, OptionDef,
    OptionKind, SubcommandDef,
};

use crate::chat::{ChatError, ChatManager, ChatPort, EventHandler};
use crate::client::GameClient;
use crate::session::{
    BoxedProgram, InteractionBroker, SessionController, SessionError, SessionRegistry,
    failure_payload,
};

/// Discord allows five buttons per row; stay one under for breathing room.
const ACTIONS_PER_ROW: usize = 4;

// ============================================================================
// Command Catalogue
// ============================================================================

/// Every command the bot registers, in display order.
pub fn catalog() -> Vec<CommandDef> {
    vec![
        CommandDef::new("start", "🚀 Start a new dungeon-crawling adventure"),
        CommandDef::new(
            "combat",
            "⚔️ Resolve your next combat round (or start a new battle)",
        ),
        CommandDef::new("explore", "🏰 Descend to the next dungeon floor"),
        CommandDef::new("barter", "🛒 Encounter the wandering trader"),
        CommandDef::new("inventory", "📦 View and manage your inventory"),
        CommandDef::new("roll-power", "🎲 Roll for a new power (cost: 100 🪙)"),
        CommandDef::new("story", "📖 Advance the campaign narrative"),
        CommandDef::new("trade", "🤝 Player-to-player trading commands")
            .subcommand(
                SubcommandDef::new("propose", "Propose a trade to another player")
                    .option(
                        OptionDef::new("target", "The user you want to trade with", OptionKind::User)
                            .required(),
                    )
                    .option(
                        OptionDef::new("item_id", "The ID of the item you offer", OptionKind::String)
                            .required(),
                    )
                    .option(
                        OptionDef::new(
                            "quantity",
                            "Quantity of the offered item",
                            OptionKind::Integer,
                        )
                        .required(),
                    )
                    .option(
                        OptionDef::new(
                            "request_item_id",
                            "The ID of the item you want in return",
                            OptionKind::String,
                        )
                        .required(),
                    )
                    .option(
                        OptionDef::new(
                            "request_quantity",
                            "Quantity of the requested item",
                            OptionKind::Integer,
                        )
                        .required(),
                    ),
            )
            .subcommand(
                SubcommandDef::new("accept", "Accept a pending trade").option(
                    OptionDef::new("trade_id", "The ID of the trade to accept", OptionKind::Integer)
                        .required(),
                ),
            )
            .subcommand(
                SubcommandDef::new("cancel", "Cancel a pending trade you initiated").option(
                    OptionDef::new("trade_id", "The ID of the trade to cancel", OptionKind::Integer)
                        .required(),
                ),
            ),
        CommandDef::new("balance", "💰 View your current gold and rank"),
        CommandDef::new("stats", "📊 View your character stats and equipped items"),
        CommandDef::new("shop", "🛒 Browse and buy items")
            .subcommand(SubcommandDef::new(
                "list",
                "List all available items in the shop",
            ))
            .subcommand(
                SubcommandDef::new("buy", "Buy an item from the shop").option(
                    OptionDef::new(
                        "item_id",
                        "The ID of the item to purchase",
                        OptionKind::String,
                    )
                    .required(),
                ),
            ),
        CommandDef::new("help", "❓ Show all available commands and how to use them"),
    ]
}

// ============================================================================
// Command Router
// ============================================================================

/// Routes gateway events to command handlers and the interaction broker.
pub struct CommandRouter {
    client: Arc<GameClient>,
    registry: SessionRegistry,
    broker: InteractionBroker,
    chat: ChatManager,
}

impl CommandRouter {
    pub fn new(client: Arc<GameClient>, registry: SessionRegistry, chat: ChatManager) -> Self {
        let broker = InteractionBroker::new(registry.clone());
        Self {
            client,
            registry,
            broker,
            chat,
        }
    }
}

#[async_trait]
impl EventHandler for CommandRouter {
    async fn handle_command(&self, gateway: &str, data: &CommandInvokedData) {
        let ctx = CommandContext {
            data: data.clone(),
            client: self.client.clone(),
            registry: self.registry.clone(),
            chat: self.chat.port(gateway),
        };

        let result = match data.command.as_str() {
            "start" => start::run(&ctx).await,
            "combat" => combat::run(&ctx).await,
            "explore" => explore::run(&ctx).await,
            "barter" => barter::run(&ctx).await,
            "inventory" => inventory::run(&ctx).await,
            "roll-power" => roll::run(&ctx).await,
            "story" => story::run(&ctx).await,
            "trade" => trade::run(&ctx).await,
            "balance" => balance::run(&ctx).await,
            "stats" => stats::run(&ctx).await,
            "shop" => shop::run(&ctx).await,
            "help" => help::run(&ctx).await,
            other => {
                warn!(command = %other, "no handler for command");
                return;
            }
        };

        if let Err(e) = result {
            error!(
                command = %data.command,
                user_id = %data.sender.id,
                error = %format!("{e:#}"),
                "command failed"
            );
            if let Err(e) = ctx.reply(failure_payload()).await {
                warn!(command = %data.command, error = %e, "failed to send failure reply");
            }
        }
    }

    fn handle_callback(&self, _gateway: &str, data: &CallbackQueryData) -> Option<String> {
        self.broker.dispatch(data)
    }
}

// ============================================================================
// Command Context
// ============================================================================

/// Everything one command invocation needs: the event data plus handles to
/// the service client, the session engine and the chat surface.
pub struct CommandContext {
    pub data: CommandInvokedData,
    pub client: Arc<GameClient>,
    pub registry: SessionRegistry,
    pub chat: Arc<dyn ChatPort>,
}

impl CommandContext {
    pub fn user_id(&self) -> &str {
        &self.data.sender.id
    }

    /// Best display name available for the invoking user.
    pub fn username(&self) -> &str {
        self.data
            .sender
            .display_name
            .as_deref()
            .or(self.data.sender.username.as_deref())
            .unwrap_or(&self.data.sender.id)
    }

    pub fn option(&self, name: &str) -> Option<&str> {
        self.data.options.get(name).map(String::as_str)
    }

    pub fn required_option(&self, name: &str) -> anyhow::Result<&str> {
        self.option(name)
            .ok_or_else(|| anyhow::anyhow!("missing required option '{name}'"))
    }

    pub fn int_option(&self, name: &str) -> anyhow::Result<i64> {
        let raw = self.required_option(name)?;
        raw.parse()
            .map_err(|_| anyhow::anyhow!("option '{name}' is not a number: {raw}"))
    }

    /// Reply to the invocation; returns the created message id.
    pub async fn reply(&self, payload: DisplayPayload) -> Result<String, ChatError> {
        self.chat
            .post(
                &self.data.chat_id,
                self.data.interaction_token.as_deref(),
                payload,
            )
            .await
    }

    /// Start an interactive session bound to the command's reply message.
    pub async fn start_session(&self, program: BoxedProgram) -> Result<String, SessionError> {
        SessionController::start(
            &self.registry,
            &self.chat,
            &self.data.chat_id,
            self.data.interaction_token.as_deref(),
            program,
        )
        .await
    }
}

// ============================================================================
// Shared rendering helpers
// ============================================================================

/// Lay a flat action list out in rows.
pub(crate) fn action_rows(actions: &[ActionSpec]) -> Vec<Vec<ActionSpec>> {
    actions
        .chunks(ACTIONS_PER_ROW)
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Format gold with thousands separators, the way the game service quotes
/// prices.
pub(crate) fn format_gold(amount: i64) -> String {
    let negative = amount < 0;
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if negative {
        format!("-{out}")
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_names_are_unique() {
        let defs = catalog();
        let mut names: Vec<_> = defs.iter().map(|d| d.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), defs.len());
    }

    #[test]
    fn catalog_covers_the_interactive_commands() {
        let defs = catalog();
        for name in [
            "combat",
            "explore",
            "barter",
            "inventory",
            "roll-power",
            "story",
            "trade",
        ] {
            assert!(defs.iter().any(|d| d.name == name), "missing {name}");
        }
    }

    #[test]
    fn action_rows_chunk_at_four() {
        let actions: Vec<_> = (0..9)
            .map(|i| ActionSpec::new(format!("a{i}"), format!("A{i}")))
            .collect();
        let rows = action_rows(&actions);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].len(), 4);
        assert_eq!(rows[2].len(), 1);
    }

    #[test]
    fn format_gold_groups_thousands() {
        assert_eq!(format_gold(0), "0");
        assert_eq!(format_gold(999), "999");
        assert_eq!(format_gold(1000), "1,000");
        assert_eq!(format_gold(1234567), "1,234,567");
        assert_eq!(format_gold(-4200), "-4,200");
    }
}
