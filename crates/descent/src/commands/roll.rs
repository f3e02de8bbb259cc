//! `/roll-power` — gacha roll with a confirm/cancel prompt.
//!
//! The roll costs gold, so nothing is charged until the player confirms.
//! Confirm, cancel and timeout all end the session.

use std::sync::Arc;
use std::time::Duration;

use descent_gateway_protocol::{ActionKind, ActionSpec, DisplayPayload};

use crate::client::GameClient;
use crate::session::{SessionSpec, StepResult};

use super::{CommandContext, action_rows, format_gold};

const ROLL_TTL: Duration = Duration::from_secs(30);
const COLOR_PROMPT: u32 = 0xFFA500;
const COLOR_REWARD: u32 = 0x00FF00;

/// Cost of one roll, in gold.
const ROLL_COST: i64 = 100;

pub async fn run(ctx: &CommandContext) -> anyhow::Result<()> {
    let spec = session(ctx.client.clone(), ctx.user_id().to_string());
    ctx.start_session(spec.boxed()).await?;
    Ok(())
}

fn session(client: Arc<GameClient>, owner: String) -> SessionSpec<()> {
    let user_id = owner.clone();

    SessionSpec::new(owner, (), render_prompt, move |_state, choice| {
        let client = client.clone();
        let user_id = user_id.clone();
        async move {
            match choice.choice_id.as_str() {
                "roll_cancel" => Ok(StepResult::Terminal {
                    outcome: DisplayPayload::text("❌ Roll canceled."),
                }),
                "roll_confirm" => {
                    let roll = client.roll_power(&user_id, ROLL_COST).await?;
                    let outcome = match (roll.success, roll.reward) {
                        (true, Some(reward)) => {
                            let balance = roll.balance.unwrap_or_default();
                            let mut payload = DisplayPayload::text(String::new())
                                .with_title("🎉 Roll Result")
                                .with_color(COLOR_REWARD)
                                .with_field(
                                    "You received",
                                    format!("**{}**", reward.name),
                                    false,
                                )
                                .with_field("Rarity", reward.rarity.clone(), true)
                                .with_field(
                                    "Your New Balance",
                                    format!("{} 🪙", format_gold(balance)),
                                    true,
                                );
                            if let Some(url) = reward.image_url {
                                payload = payload.with_image(url);
                            }
                            payload
                        }
                        _ => DisplayPayload::text(format!(
                            "❌ {}",
                            roll.error
                                .unwrap_or_else(|| "The gacha machine jams.".to_string())
                        )),
                    };
                    Ok(StepResult::Terminal { outcome })
                }
                _ => Ok(StepResult::Continue {
                    state: (),
                    actions: prompt_actions(),
                }),
            }
        }
    })
    .actions(prompt_actions())
    .ttl(ROLL_TTL)
    .expired_notice("⌛ Time expired — roll canceled.")
}

fn prompt_actions() -> Vec<ActionSpec> {
    vec![
        ActionSpec::new("roll_confirm", "Confirm Roll"),
        ActionSpec::new("roll_cancel", "Cancel").kind(ActionKind::Secondary),
    ]
}

fn render_prompt(_state: &(), actions: &[ActionSpec]) -> DisplayPayload {
    let mut payload = DisplayPayload::text(format!(
        "This roll costs **{} 🪙**. Do you want to proceed?",
        format_gold(ROLL_COST)
    ))
    .with_title("🎲 Gacha Roll")
    .with_color(COLOR_PROMPT);
    payload.actions = action_rows(actions);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_offers_confirm_and_cancel() {
        let actions = prompt_actions();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].id, "roll_confirm");
        assert_eq!(actions[1].id, "roll_cancel");
        assert_eq!(actions[1].kind, ActionKind::Secondary);
    }

    #[test]
    fn prompt_states_the_cost() {
        let payload = render_prompt(&(), &prompt_actions());
        assert_eq!(payload.title.as_deref(), Some("🎲 Gacha Roll"));
        assert!(payload.body.contains("**100 🪙**"));
        assert!(payload.has_live_actions());
    }
}
