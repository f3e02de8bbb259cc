//! `/start` — create a new game profile.

use descent_gateway_protocol::DisplayPayload;
use ulid::Ulid;

use super::{CommandContext, format_gold};

const COLOR_START: u32 = 0x00FFAA;

pub async fn run(ctx: &CommandContext) -> anyhow::Result<()> {
    // Correlation id for tracing the request through the game service.
    let correlation_id = Ulid::new().to_string();
    let profile = ctx
        .client
        .create_profile(ctx.user_id(), &correlation_id)
        .await?;

    let payload = DisplayPayload::text("Your journey begins now—good luck!")
        .with_title("🎉 Adventure Started!")
        .with_color(COLOR_START)
        .with_field("Session ID", format!("`{}`", profile.session_id), false)
        .with_field("Dungeon Level", profile.dungeon_level.to_string(), true)
        .with_field("XP", format_gold(profile.xp), true)
        .with_field("Gold", format!("{} 🪙", format_gold(profile.gold)), true);

    ctx.reply(payload).await?;
    Ok(())
}
