//! `/story` — advance the campaign narrative.
//!
//! Each beat may offer branch choices; picking one fetches the next beat.
//! The session continues while the service keeps offering choices and ends
//! on the first beat without any.

use std::sync::Arc;
use std::time::Duration;

use descent_gateway_protocol::{ActionSpec, DisplayPayload};

use crate::client::{GameClient, StoryBeat};
use crate::session::{SessionSpec, StepResult};

use super::{CommandContext, action_rows};

const STORY_TTL: Duration = Duration::from_secs(120);
const COLOR_STORY: u32 = 0x8A2BE2;

const CHOICE_PREFIX: &str = "story_choice_";

pub async fn run(ctx: &CommandContext) -> anyhow::Result<()> {
    let beat = ctx.client.progress_story(ctx.user_id(), None).await?;

    if !beat.success {
        let reason = if beat.narrative.is_empty() {
            "Could not advance the story.".to_string()
        } else {
            beat.narrative
        };
        ctx.reply(DisplayPayload::text(format!("❌ {reason}"))).await?;
        return Ok(());
    }

    if beat.options.is_empty() {
        // Nothing to choose; no session needed.
        ctx.reply(render_beat(&beat, &[])).await?;
        return Ok(());
    }

    let spec = session(ctx.client.clone(), ctx.user_id().to_string(), beat);
    ctx.start_session(spec.boxed()).await?;
    Ok(())
}

fn session(client: Arc<GameClient>, owner: String, first: StoryBeat) -> SessionSpec<StoryBeat> {
    let user_id = owner.clone();
    let actions = beat_actions(&first);

    SessionSpec::new(owner, first, render_beat, move |state, choice| {
        let client = client.clone();
        let user_id = user_id.clone();
        async move {
            let Some(option_id) = choice.choice_id.strip_prefix(CHOICE_PREFIX) else {
                let actions = beat_actions(&state);
                return Ok(StepResult::Continue { state, actions });
            };

            let beat = client.progress_story(&user_id, Some(option_id)).await?;
            if !beat.success {
                let reason = if beat.narrative.is_empty() {
                    "Could not advance the story.".to_string()
                } else {
                    beat.narrative
                };
                return Ok(StepResult::Terminal {
                    outcome: DisplayPayload::text(format!("❌ {reason}")),
                });
            }

            if beat.options.is_empty() {
                return Ok(StepResult::Terminal {
                    outcome: render_beat(&beat, &[]),
                });
            }

            let actions = beat_actions(&beat);
            Ok(StepResult::Continue {
                state: beat,
                actions,
            })
        }
    })
    .actions(actions)
    .ttl(STORY_TTL)
    .expired_notice("⌛ The storyteller's voice fades. Run /story to pick up the thread.")
}

fn beat_actions(beat: &StoryBeat) -> Vec<ActionSpec> {
    beat.options
        .iter()
        .map(|option| {
            ActionSpec::new(format!("{CHOICE_PREFIX}{}", option.id), option.label.clone())
        })
        .collect()
}

fn render_beat(beat: &StoryBeat, actions: &[ActionSpec]) -> DisplayPayload {
    let mut payload = DisplayPayload::text(beat.narrative.clone())
        .with_title("📖 Campaign Narrative")
        .with_color(COLOR_STORY);
    payload.actions = action_rows(actions);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StoryOption;

    fn beat(options: &[(&str, &str)]) -> StoryBeat {
        StoryBeat {
            success: true,
            narrative: "The corridor forks before you.".to_string(),
            options: options
                .iter()
                .map(|(id, label)| StoryOption {
                    id: id.to_string(),
                    label: label.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn one_button_per_choice() {
        let actions = beat_actions(&beat(&[("left", "Take the left fork"), ("right", "Go right")]));
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].id, "story_choice_left");
        assert_eq!(actions[0].label, "Take the left fork");
    }

    #[test]
    fn render_carries_the_narrative() {
        let b = beat(&[("left", "Left")]);
        let payload = render_beat(&b, &beat_actions(&b));

        assert_eq!(payload.title.as_deref(), Some("📖 Campaign Narrative"));
        assert_eq!(payload.body, "The corridor forks before you.");
        assert!(payload.has_live_actions());
    }

    #[test]
    fn final_beat_renders_without_actions() {
        let payload = render_beat(&beat(&[]), &[]);
        assert!(payload.actions.is_empty());
    }
}
