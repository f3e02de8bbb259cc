use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use descent::chat::ChatManager;
use descent::client::GameClient;
use descent::commands::{self, CommandRouter};
use descent::config::Config;
use descent::session::SessionRegistry;

// ============================================================================
// CLI Types
// ============================================================================

/// Descent - chat-bot front end for the Eternity's Descent dungeon crawler
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bot
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "descent.yaml")]
        config: String,
    },
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => serve(&config).await,
    }
}

async fn serve(config_path: &str) -> Result<()> {
    let config = Config::load(config_path)
        .await
        .with_context(|| format!("loading {config_path}"))?;

    let client = Arc::new(GameClient::new(&config.service)?);
    let registry = SessionRegistry::new();
    let chat = ChatManager::default();

    let router = Arc::new(CommandRouter::new(
        client.clone(),
        registry.clone(),
        chat.clone(),
    ));
    chat.set_handler(router).await;

    let mut gateways_started = 0usize;

    #[cfg(feature = "gateway-discord")]
    if let Some(discord) = config.gateways.discord.clone() {
        use descent_gateway_discord::{DiscordConfig, DiscordGateway};

        let guild_id = discord
            .guild_id
            .as_deref()
            .map(str::parse::<u64>)
            .transpose()
            .context("gateways.discord.guild_id is not a valid id")?;

        let (cmd_rx, evt_tx) = chat.register("discord").await;
        let gateway = DiscordGateway::new(DiscordConfig {
            bot_token: discord.bot_token,
            guild_id,
            commands: commands::catalog(),
        });
        tokio::spawn(gateway.start(evt_tx, cmd_rx));
        gateways_started += 1;
        info!("discord gateway starting");
    }

    if gateways_started == 0 {
        warn!("no gateways configured; the bot will idle");
    }

    info!(
        service = %config.service.base_url,
        "descent bot running; press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    info!("shutting down");
    chat.shutdown().await;
    registry.shutdown().await;
    Ok(())
}

// ============================================================================
// Initialization
// ============================================================================

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
