//! `/explore` — descend to the next dungeon floor.
//!
//! Descending again continues the session; when a wandering trader spawns
//! the session can hand its message over to the barter flow.

use std::sync::Arc;
use std::time::Duration;

use descent_gateway_protocol::{ActionKind, ActionSpec, DisplayPayload};

use crate::client::{DungeonFloor, GameClient};
use crate::session::{SessionSpec, StepResult};

use super::{CommandContext, action_rows, barter};

const EXPLORE_TTL: Duration = Duration::from_secs(60);
const COLOR_FLOOR: u32 = 0x1F8B4C;

pub async fn run(ctx: &CommandContext) -> anyhow::Result<()> {
    let floor = ctx.client.generate_floor(ctx.user_id()).await?;

    if !floor.success {
        let reason = if floor.description.is_empty() {
            "Unable to generate dungeon.".to_string()
        } else {
            floor.description
        };
        ctx.reply(DisplayPayload::text(format!("❌ {reason}"))).await?;
        return Ok(());
    }

    let spec = session(ctx.client.clone(), ctx.user_id().to_string(), floor);
    ctx.start_session(spec.boxed()).await?;
    Ok(())
}

fn session(
    client: Arc<GameClient>,
    owner: String,
    first: DungeonFloor,
) -> SessionSpec<DungeonFloor> {
    let user_id = owner.clone();
    let actions = floor_actions(&first);

    SessionSpec::new(owner.clone(), first, render_floor, move |state, choice| {
        let client = client.clone();
        let user_id = user_id.clone();
        let owner = owner.clone();
        async move {
            match choice.choice_id.as_str() {
                "explore_next" => {
                    let floor = client.generate_floor(&user_id).await?;
                    if !floor.success {
                        let reason = if floor.description.is_empty() {
                            "Unable to generate dungeon.".to_string()
                        } else {
                            floor.description
                        };
                        return Ok(StepResult::Terminal {
                            outcome: DisplayPayload::text(format!("❌ {reason}")),
                        });
                    }
                    let actions = floor_actions(&floor);
                    Ok(StepResult::Continue {
                        state: floor,
                        actions,
                    })
                }
                "explore_barter" => {
                    let encounter = client.trader_encounter(&user_id).await?;
                    if !encounter.spawn {
                        return Ok(StepResult::Terminal {
                            outcome: DisplayPayload::text(
                                "😕 No wandering trader showed up this floor.",
                            ),
                        });
                    }
                    // Hand the message over to the barter session.
                    let delegate =
                        barter::trader_session(client.clone(), owner, encounter.items).boxed();
                    Ok(StepResult::Chain { delegate })
                }
                _ => {
                    let actions = floor_actions(&state);
                    Ok(StepResult::Continue { state, actions })
                }
            }
        }
    })
    .actions(actions)
    .ttl(EXPLORE_TTL)
    .expired_notice("⌛ The echoes in the dungeon grow silent…")
}

fn floor_actions(floor: &DungeonFloor) -> Vec<ActionSpec> {
    let mut actions = vec![ActionSpec::new("explore_next", "⬇️ Descend Further")];
    if floor.spawn_barterer {
        actions.push(
            ActionSpec::new("explore_barter", "🛒 Barter with Trader").kind(ActionKind::Success),
        );
    }
    actions
}

fn render_floor(floor: &DungeonFloor, actions: &[ActionSpec]) -> DisplayPayload {
    let mut payload = DisplayPayload::text(floor.description.clone())
        .with_title(format!("🗺️ Dungeon Floor {}", floor.floor))
        .with_color(COLOR_FLOOR);

    if let Some(ref url) = floor.map_image_url {
        payload = payload.with_image(url.clone());
    }

    payload.actions = action_rows(actions);
    payload
}
