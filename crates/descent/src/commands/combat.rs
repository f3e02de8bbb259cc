//! `/combat` — resolve the next round of combat.
//!
//! Each round is decided by the game service; the session keeps offering a
//! button for the next round (or the next encounter once the current one
//! ends) until the player walks away.

use std::sync::Arc;
use std::time::Duration;

use descent_gateway_protocol::{ActionSpec, DisplayPayload};

use crate::client::{CombatRound, GameClient};
use crate::session::{SessionSpec, StepResult};

use super::{CommandContext, action_rows};

const COMBAT_TTL: Duration = Duration::from_secs(60);
const COLOR_COMBAT: u32 = 0xE74C3C;

pub async fn run(ctx: &CommandContext) -> anyhow::Result<()> {
    let round = ctx.client.resolve_combat(ctx.user_id()).await?;

    if !round.success {
        // Service-side refusal, e.g. no active game profile.
        ctx.reply(DisplayPayload::text(format!("❌ {}", round.message)))
            .await?;
        return Ok(());
    }

    let spec = session(ctx.client.clone(), ctx.user_id().to_string(), round);
    ctx.start_session(spec.boxed()).await?;
    Ok(())
}

/// Build the combat session for an already-resolved first round.
fn session(
    client: Arc<GameClient>,
    owner: String,
    first: CombatRound,
) -> SessionSpec<CombatRound> {
    let user_id = owner.clone();
    let actions = round_actions(&first);

    SessionSpec::new(owner, first, render_round, move |state, choice| {
        let client = client.clone();
        let user_id = user_id.clone();
        async move {
            if choice.choice_id != "combat_next" {
                let actions = round_actions(&state);
                return Ok(StepResult::Continue { state, actions });
            }

            let round = client.resolve_combat(&user_id).await?;
            if !round.success {
                return Ok(StepResult::Terminal {
                    outcome: DisplayPayload::text(format!("❌ {}", round.message)),
                });
            }
            let actions = round_actions(&round);
            Ok(StepResult::Continue {
                state: round,
                actions,
            })
        }
    })
    .actions(actions)
    .ttl(COMBAT_TTL)
    .expired_notice("⌛ The battlefield falls silent. Run /combat to fight on.")
}

fn round_actions(round: &CombatRound) -> Vec<ActionSpec> {
    let label = if round.combat_end {
        "🔄 Next Encounter"
    } else {
        "⚔️ Next Round"
    };
    vec![ActionSpec::new("combat_next", label)]
}

fn render_round(round: &CombatRound, actions: &[ActionSpec]) -> DisplayPayload {
    let mut payload = DisplayPayload::text(round.message.clone())
        .with_title("⚔️ Combat Round")
        .with_color(COLOR_COMBAT)
        .with_field(
            "🛡️ You",
            format!("{} / {} HP", round.player_hp, round.player_max_hp),
            true,
        )
        .with_field(
            "👹 Enemy",
            format!("{} / {} HP", round.enemy_hp, round.enemy_max_hp),
            true,
        );

    if round.combat_end && !round.loot.is_empty() {
        let loot = round
            .loot
            .iter()
            .map(|item| format!("• **{}** x{}", item.name, item.qty))
            .collect::<Vec<_>>()
            .join("\n");
        payload = payload.with_field("🎁 Loot Acquired", loot, false);
    }

    payload.actions = action_rows(actions);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(combat_end: bool, loot: Vec<crate::client::LootItem>) -> CombatRound {
        CombatRound {
            success: true,
            message: "You trade blows with the ghoul.".to_string(),
            player_hp: 18,
            player_max_hp: 20,
            enemy_hp: 7,
            enemy_max_hp: 15,
            loot,
            combat_end,
        }
    }

    #[test]
    fn mid_combat_offers_next_round() {
        let actions = round_actions(&round(false, vec![]));
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].id, "combat_next");
        assert!(actions[0].label.contains("Next Round"));
    }

    #[test]
    fn ended_combat_offers_next_encounter() {
        let actions = round_actions(&round(true, vec![]));
        assert!(actions[0].label.contains("Next Encounter"));
    }

    #[test]
    fn render_shows_both_hp_bars() {
        let r = round(false, vec![]);
        let payload = render_round(&r, &round_actions(&r));

        assert_eq!(payload.title.as_deref(), Some("⚔️ Combat Round"));
        assert_eq!(payload.fields.len(), 2);
        assert_eq!(payload.fields[0].value, "18 / 20 HP");
        assert_eq!(payload.fields[1].value, "7 / 15 HP");
        assert!(payload.has_live_actions());
    }

    #[test]
    fn loot_field_appears_only_when_the_encounter_ends() {
        let loot = vec![crate::client::LootItem {
            id: "bone".to_string(),
            name: "Ghoul Bone".to_string(),
            qty: 2,
        }];

        let ongoing = render_round(&round(false, loot.clone()), &[]);
        assert!(!ongoing.fields.iter().any(|f| f.name.contains("Loot")));

        let ended = render_round(&round(true, loot), &[]);
        let loot_field = ended
            .fields
            .iter()
            .find(|f| f.name.contains("Loot"))
            .unwrap();
        assert!(loot_field.value.contains("**Ghoul Bone** x2"));
    }
}
