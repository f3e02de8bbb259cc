//! `/trade` — player-to-player trading.
//!
//! `propose` renders the offer with Accept/Cancel buttons owned by the
//! **target** player; `accept` and `cancel` also work directly by trade id
//! for offers whose buttons have expired.

use std::sync::Arc;
use std::time::Duration;

use descent_gateway_protocol::{ActionKind, ActionSpec, DisplayPayload};

use crate::client::{GameClient, TradeTerms};
use crate::session::{SessionSpec, StepResult};

use super::{CommandContext, action_rows};

const TRADE_TTL: Duration = Duration::from_secs(120);
const COLOR_PROPOSAL: u32 = 0x00CCFF;
const COLOR_ACCEPTED: u32 = 0x00FF00;
const COLOR_CANCELLED: u32 = 0xFF5555;

/// A proposed trade awaiting the target's decision.
struct Proposal {
    trade_id: i64,
    from_user: String,
    to_user: String,
    offer: TradeTerms,
    request: TradeTerms,
}

pub async fn run(ctx: &CommandContext) -> anyhow::Result<()> {
    match ctx.data.subcommand.as_deref() {
        Some("propose") => propose(ctx).await,
        Some("accept") => resolve(ctx, true).await,
        Some("cancel") => resolve(ctx, false).await,
        other => {
            anyhow::bail!("unknown trade subcommand: {other:?}");
        }
    }
}

async fn propose(ctx: &CommandContext) -> anyhow::Result<()> {
    let to_user = ctx.required_option("target")?.to_string();
    let offer = TradeTerms {
        item_id: ctx.required_option("item_id")?.to_string(),
        quantity: ctx.int_option("quantity")?.try_into()?,
    };
    let request = TradeTerms {
        item_id: ctx.required_option("request_item_id")?.to_string(),
        quantity: ctx.int_option("request_quantity")?.try_into()?,
    };

    let initiated = ctx
        .client
        .initiate_trade(ctx.user_id(), &to_user, &offer, &request)
        .await?;

    let (true, Some(trade_id)) = (initiated.success, initiated.trade_id) else {
        let reason = initiated
            .error
            .unwrap_or_else(|| "the trade could not be created".to_string());
        ctx.reply(DisplayPayload::text(format!(
            "❌ Could not initiate trade: {reason}"
        )))
        .await?;
        return Ok(());
    };

    let proposal = Proposal {
        trade_id,
        from_user: ctx.user_id().to_string(),
        to_user: to_user.clone(),
        offer,
        request,
    };

    // The target, not the proposer, owns this session: only they may
    // accept or decline.
    let spec = session(ctx.client.clone(), to_user, proposal);
    ctx.start_session(spec.boxed()).await?;
    Ok(())
}

async fn resolve(ctx: &CommandContext, accept: bool) -> anyhow::Result<()> {
    let trade_id = ctx.int_option("trade_id")?;
    let resolution = ctx
        .client
        .resolve_trade(ctx.user_id(), trade_id, accept)
        .await?;

    let payload = if !resolution.success {
        DisplayPayload::text(format!(
            "❌ {}",
            resolution
                .error
                .unwrap_or_else(|| "the trade could not be resolved".to_string())
        ))
    } else if accept {
        DisplayPayload::text(format!("✅ You have accepted trade **{trade_id}**."))
    } else {
        DisplayPayload::text(format!("❌ You have cancelled trade **{trade_id}**."))
    };
    ctx.reply(payload).await?;
    Ok(())
}

fn session(client: Arc<GameClient>, owner: String, proposal: Proposal) -> SessionSpec<Proposal> {
    let accept_id = format!("trade_accept_{}", proposal.trade_id);
    let cancel_id = format!("trade_cancel_{}", proposal.trade_id);
    let actions = proposal_actions(&proposal);

    SessionSpec::new(owner, proposal, render_proposal, move |state, choice| {
        let client = client.clone();
        let accept_id = accept_id.clone();
        let cancel_id = cancel_id.clone();
        async move {
            let accept = if choice.choice_id == accept_id {
                true
            } else if choice.choice_id == cancel_id {
                false
            } else {
                let actions = proposal_actions(&state);
                return Ok(StepResult::Continue { state, actions });
            };

            let resolution = client
                .resolve_trade(&choice.actor_id, state.trade_id, accept)
                .await?;

            let outcome = if !resolution.success {
                DisplayPayload::text(format!(
                    "❌ {}",
                    resolution
                        .error
                        .unwrap_or_else(|| "the trade could not be resolved".to_string())
                ))
            } else {
                render_resolution(state.trade_id, accept)
            };
            Ok(StepResult::Terminal { outcome })
        }
    })
    .actions(actions)
    .ttl(TRADE_TTL)
    .expired_notice("⌛ The trade offer has expired.")
}

fn proposal_actions(proposal: &Proposal) -> Vec<ActionSpec> {
    vec![
        ActionSpec::new(format!("trade_accept_{}", proposal.trade_id), "Accept")
            .kind(ActionKind::Success),
        ActionSpec::new(format!("trade_cancel_{}", proposal.trade_id), "Cancel")
            .kind(ActionKind::Danger),
    ]
}

fn render_proposal(proposal: &Proposal, actions: &[ActionSpec]) -> DisplayPayload {
    let body = format!(
        "Trade ID **{}**\n<@{}> offers **{}× {}**\nin exchange for **{}× {}** from <@{}>",
        proposal.trade_id,
        proposal.from_user,
        proposal.offer.quantity,
        proposal.offer.item_id,
        proposal.request.quantity,
        proposal.request.item_id,
        proposal.to_user,
    );

    let mut payload = DisplayPayload::text(body)
        .with_title("🤝 Trade Proposal Sent")
        .with_color(COLOR_PROPOSAL);
    payload.actions = action_rows(actions);
    payload
}

fn render_resolution(trade_id: i64, accepted: bool) -> DisplayPayload {
    if accepted {
        DisplayPayload::text(format!("Trade ID **{trade_id}** has been accepted."))
            .with_title("✅ Trade Completed")
            .with_color(COLOR_ACCEPTED)
    } else {
        DisplayPayload::text(format!("Trade ID **{trade_id}** has been cancelled."))
            .with_title("❌ Trade Cancelled")
            .with_color(COLOR_CANCELLED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal() -> Proposal {
        Proposal {
            trade_id: 42,
            from_user: "100".to_string(),
            to_user: "200".to_string(),
            offer: TradeTerms {
                item_id: "fire_sword".to_string(),
                quantity: 1,
            },
            request: TradeTerms {
                item_id: "gold_ore".to_string(),
                quantity: 5,
            },
        }
    }

    #[test]
    fn buttons_carry_the_trade_id() {
        let actions = proposal_actions(&proposal());
        assert_eq!(actions[0].id, "trade_accept_42");
        assert_eq!(actions[0].kind, ActionKind::Success);
        assert_eq!(actions[1].id, "trade_cancel_42");
        assert_eq!(actions[1].kind, ActionKind::Danger);
    }

    #[test]
    fn render_mentions_both_parties_and_terms() {
        let p = proposal();
        let payload = render_proposal(&p, &proposal_actions(&p));

        assert!(payload.body.contains("Trade ID **42**"));
        assert!(payload.body.contains("<@100> offers **1× fire_sword**"));
        assert!(payload.body.contains("**5× gold_ore** from <@200>"));
    }

    #[test]
    fn resolution_titles_follow_the_outcome() {
        assert_eq!(
            render_resolution(42, true).title.as_deref(),
            Some("✅ Trade Completed")
        );
        assert_eq!(
            render_resolution(42, false).title.as_deref(),
            Some("❌ Trade Cancelled")
        );
    }
}
