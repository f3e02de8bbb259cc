//! `/balance` — gold balance and rank.

use descent_gateway_protocol::DisplayPayload;

use super::{CommandContext, format_gold};

const COLOR_GOLD: u32 = 0xFFD700;

pub async fn run(ctx: &CommandContext) -> anyhow::Result<()> {
    let balance = ctx.client.balance(ctx.user_id()).await?;

    let mut payload = DisplayPayload::text(String::new())
        .with_title(format!("{}'s Balance", ctx.username()))
        .with_color(COLOR_GOLD)
        .with_field("Gold", format!("{} 🪙", format_gold(balance.gold)), true)
        .with_field("Rank", format!("**{}**", balance.rank), true);

    if let Some(next_rank_xp) = balance.next_rank_xp {
        payload = payload.with_field(
            "Progress to Next Rank",
            format!(
                "{} / {} XP",
                format_gold(balance.xp),
                format_gold(next_rank_xp)
            ),
            false,
        );
    }

    ctx.reply(payload).await?;
    Ok(())
}
