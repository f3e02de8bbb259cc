//! `/stats` — character sheet with stats and equipment.

use descent_gateway_protocol::DisplayPayload;

use crate::client::EquipmentItem;

use super::{CommandContext, format_gold};

const COLOR_STATS: u32 = 0x3498DB;

pub async fn run(ctx: &CommandContext) -> anyhow::Result<()> {
    let profile = ctx.client.player_stats(ctx.user_id()).await?;

    if !profile.success {
        ctx.reply(DisplayPayload::text(
            "❌ Could not load your stats. Please try again later.",
        ))
        .await?;
        return Ok(());
    }

    let mut payload = DisplayPayload::text(String::new())
        .with_title(format!("{}'s Character Profile", ctx.username()))
        .with_color(COLOR_STATS)
        .with_field("Rank", format!("**{}**", profile.rank), true)
        .with_field(
            "XP",
            format!(
                "{} / {}",
                format_gold(profile.xp),
                format_gold(profile.next_rank_xp)
            ),
            true,
        );

    for (name, value) in &profile.stats {
        payload = payload.with_field(capitalize(name), value.to_string(), true);
    }

    payload = payload.with_field("🗡️ Equipment", equipment_lines(&profile.equipment), false);

    ctx.reply(payload).await?;
    Ok(())
}

fn equipment_lines(equipment: &[EquipmentItem]) -> String {
    if equipment.is_empty() {
        return "_No items equipped._".to_string();
    }
    equipment
        .iter()
        .map(|eq| {
            let status = if eq.is_equipped { " (Equipped)" } else { "" };
            format!("**{}:** {}{}", eq.slot, eq.name, status)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalize_handles_common_cases() {
        assert_eq!(capitalize("strength"), "Strength");
        assert_eq!(capitalize("a"), "A");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn equipment_lines_mark_equipped_slots() {
        let equipment = vec![
            EquipmentItem {
                id: "sw1".to_string(),
                name: "Rust Sword".to_string(),
                slot: "Weapon".to_string(),
                is_equipped: true,
                icon_url: None,
            },
            EquipmentItem {
                id: "sh1".to_string(),
                name: "Oak Shield".to_string(),
                slot: "Offhand".to_string(),
                is_equipped: false,
                icon_url: None,
            },
        ];

        let lines = equipment_lines(&equipment);
        assert!(lines.contains("**Weapon:** Rust Sword (Equipped)"));
        assert!(lines.contains("**Offhand:** Oak Shield"));
        assert!(!lines.contains("Oak Shield (Equipped)"));
    }

    #[test]
    fn empty_equipment_renders_placeholder() {
        assert_eq!(equipment_lines(&[]), "_No items equipped._");
    }
}
