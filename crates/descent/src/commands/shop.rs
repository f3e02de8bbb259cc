//! `/shop` — browse the catalogue and buy items.

use descent_gateway_protocol::DisplayPayload;

use super::{CommandContext, format_gold};

const COLOR_SHOP: u32 = 0x00AA88;
const COLOR_PURCHASE: u32 = 0x00CC66;

pub async fn run(ctx: &CommandContext) -> anyhow::Result<()> {
    match ctx.data.subcommand.as_deref() {
        Some("list") | None => list(ctx).await,
        Some("buy") => buy(ctx).await,
        Some(other) => anyhow::bail!("unknown shop subcommand: {other}"),
    }
}

async fn list(ctx: &CommandContext) -> anyhow::Result<()> {
    let items = ctx.client.shop_items().await?;

    if items.is_empty() {
        ctx.reply(DisplayPayload::text("🛒 The shop is currently empty."))
            .await?;
        return Ok(());
    }

    let mut payload = DisplayPayload::text("Browse items available for purchase:")
        .with_title("🛒 Item Shop")
        .with_color(COLOR_SHOP);

    for item in &items {
        payload = payload.with_field(
            format!("**{}** (`{}`)", item.name, item.id),
            format!(
                "{}\n**Price:** {} 🪙",
                item.description,
                format_gold(item.price)
            ),
            false,
        );
    }

    ctx.reply(payload).await?;
    Ok(())
}

async fn buy(ctx: &CommandContext) -> anyhow::Result<()> {
    let item_id = ctx.required_option("item_id")?;
    let purchase = ctx.client.shop_buy(ctx.user_id(), item_id).await?;

    let (true, Some(item)) = (purchase.success, purchase.item) else {
        let reason = purchase
            .error
            .unwrap_or_else(|| "the purchase could not be completed".to_string());
        ctx.reply(DisplayPayload::text(format!("❌ {reason}"))).await?;
        return Ok(());
    };

    let payload = DisplayPayload::text(format!(
        "You purchased **{}** (x{})",
        item.name,
        item.quantity.unwrap_or(1)
    ))
    .with_title("✅ Purchase Successful")
    .with_color(COLOR_PURCHASE)
    .with_field("Item ID", format!("`{}`", item.id), true)
    .with_field("Cost", format!("{} 🪙", format_gold(item.price)), true)
    .with_field(
        "Balance",
        format!("{} 🪙", format_gold(purchase.balance.unwrap_or_default())),
        true,
    );

    ctx.reply(payload).await?;
    Ok(())
}
