//! `/help` — list every command, generated from the catalogue.

use descent_gateway_protocol::DisplayPayload;

use super::{CommandContext, catalog};

const COLOR_HELP: u32 = 0x0099FF;

pub async fn run(ctx: &CommandContext) -> anyhow::Result<()> {
    let mut payload = DisplayPayload::text("Here are all the commands you can use:")
        .with_title("📖 Command List")
        .with_color(COLOR_HELP);

    for def in catalog() {
        let value = if def.subcommands.is_empty() {
            def.description.clone()
        } else {
            let subs = def
                .subcommands
                .iter()
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>()
                .join(" | ");
            format!("{} ({subs})", def.description)
        };
        payload = payload.with_field(format!("/{}", def.name), value, false);
    }

    ctx.reply(payload).await?;
    Ok(())
}
