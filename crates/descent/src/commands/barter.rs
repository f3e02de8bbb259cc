//! `/barter` — deal with the wandering trader.
//!
//! The trader appears on roughly one floor in seven; when present, the
//! session offers one buy button per ware plus a skip. Buying and skipping
//! both end the session.

use std::sync::Arc;
use std::time::Duration;

use descent_gateway_protocol::{ActionKind, ActionSpec, DisplayPayload};

use crate::client::{GameClient, TraderItem};
use crate::session::{ChoiceEvent, SessionSpec, StepResult};

use super::{CommandContext, action_rows, format_gold};

const BARTER_TTL: Duration = Duration::from_secs(60);
const COLOR_TRADER: u32 = 0x00A8FF;
const COLOR_PURCHASE: u32 = 0x00CC66;

const BUY_PREFIX: &str = "barter_buy_";

pub async fn run(ctx: &CommandContext) -> anyhow::Result<()> {
    let encounter = ctx.client.trader_encounter(ctx.user_id()).await?;

    if !encounter.spawn {
        ctx.reply(DisplayPayload::text(
            "😕 No wandering trader showed up this floor.",
        ))
        .await?;
        return Ok(());
    }

    let spec = trader_session(
        ctx.client.clone(),
        ctx.user_id().to_string(),
        encounter.items,
    );
    ctx.start_session(spec.boxed()).await?;
    Ok(())
}

/// Build the trader session from an already-confirmed encounter.
///
/// Also used by `/explore` when it chains into a trader it discovered.
pub fn trader_session(
    client: Arc<GameClient>,
    owner: String,
    items: Vec<TraderItem>,
) -> SessionSpec<Vec<TraderItem>> {
    let user_id = owner.clone();
    let actions = ware_actions(&items);

    let step = move |items: Vec<TraderItem>, choice: ChoiceEvent| {
        let client = client.clone();
        let user_id = user_id.clone();
        async move {
            if choice.choice_id == "barter_skip" {
                return Ok(StepResult::Terminal {
                    outcome: DisplayPayload::text("🕶️ You decided to skip the trader."),
                });
            }

            let Some(item_id) = choice.choice_id.strip_prefix(BUY_PREFIX) else {
                let actions = ware_actions(&items);
                return Ok(StepResult::Continue {
                    state: items,
                    actions,
                });
            };

            let purchase = client.trader_buy(&user_id, item_id).await?;
            let outcome = match (purchase.success, purchase.item) {
                (true, Some(item)) => DisplayPayload::text(format!(
                    "✅ You purchased **{}** for {} 🪙!",
                    item.name,
                    format_gold(item.price)
                ))
                .with_color(COLOR_PURCHASE),
                _ => DisplayPayload::text(format!(
                    "❌ {}",
                    purchase
                        .error
                        .unwrap_or_else(|| "The trader refuses the deal.".to_string())
                )),
            };
            Ok(StepResult::Terminal { outcome })
        }
    };

    SessionSpec::new(
        owner,
        items,
        |items, actions| render_wares(items, actions),
        step,
    )
    .actions(actions)
    .ttl(BARTER_TTL)
    .expired_notice("⌛ Time's up – the trader has packed up and left.")
}

fn ware_actions(items: &[TraderItem]) -> Vec<ActionSpec> {
    let mut actions: Vec<ActionSpec> = items
        .iter()
        .map(|item| {
            ActionSpec::new(format!("{BUY_PREFIX}{}", item.id), format!("Buy {}", item.name))
        })
        .collect();
    actions.push(ActionSpec::new("barter_skip", "Skip Trader").kind(ActionKind::Secondary));
    actions
}

fn render_wares(items: &[TraderItem], actions: &[ActionSpec]) -> DisplayPayload {
    let mut payload = DisplayPayload::text("He offers the following items for sale:")
        .with_title("🔹 A Wandering Trader Appears!")
        .with_color(COLOR_TRADER);

    for item in items {
        payload = payload.with_field(
            format!("{} — {} 🪙", item.name, format_gold(item.price)),
            item.description.clone(),
            false,
        );
    }

    payload.actions = action_rows(actions);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wares() -> Vec<TraderItem> {
        vec![
            TraderItem {
                id: "elixir".to_string(),
                name: "Crimson Elixir".to_string(),
                description: "Restores 50 HP.".to_string(),
                price: 1250,
            },
            TraderItem {
                id: "rope".to_string(),
                name: "Silk Rope".to_string(),
                description: "Never frays.".to_string(),
                price: 300,
            },
        ]
    }

    #[test]
    fn one_buy_button_per_ware_plus_skip() {
        let actions = ware_actions(&wares());
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0].id, "barter_buy_elixir");
        assert_eq!(actions[1].id, "barter_buy_rope");
        assert_eq!(actions[2].id, "barter_skip");
        assert_eq!(actions[2].kind, ActionKind::Secondary);
    }

    #[test]
    fn render_lists_every_ware_with_price() {
        let items = wares();
        let payload = render_wares(&items, &ware_actions(&items));

        assert_eq!(payload.fields.len(), 2);
        assert_eq!(payload.fields[0].name, "Crimson Elixir — 1,250 🪙");
        assert_eq!(payload.fields[1].value, "Never frays.");
        assert!(payload.has_live_actions());
    }
}
