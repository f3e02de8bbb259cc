//! `/inventory` — paged inventory browser.
//!
//! Ten items per page with Previous/Next buttons; each page turn
//! re-fetches from the game service, which owns the authoritative list.

use std::sync::Arc;
use std::time::Duration;

use descent_gateway_protocol::{ActionKind, ActionSpec, DisplayPayload};

use crate::client::{GameClient, InventoryItem};
use crate::session::{SessionSpec, StepResult};

use super::{CommandContext, action_rows};

const INVENTORY_TTL: Duration = Duration::from_secs(120);
const COLOR_INVENTORY: u32 = 0x00AAFF;
const PAGE_SIZE: u32 = 10;

/// One rendered page of the inventory.
struct PageState {
    username: String,
    page: u32,
    total_pages: u32,
    items: Vec<InventoryItem>,
}

pub async fn run(ctx: &CommandContext) -> anyhow::Result<()> {
    let first = ctx.client.inventory_page(ctx.user_id(), 1, PAGE_SIZE).await?;
    let state = PageState {
        username: ctx.username().to_string(),
        page: 1,
        total_pages: total_pages(first.total_items),
        items: first.items,
    };

    let spec = session(ctx.client.clone(), ctx.user_id().to_string(), state);
    ctx.start_session(spec.boxed()).await?;
    Ok(())
}

fn session(client: Arc<GameClient>, owner: String, first: PageState) -> SessionSpec<PageState> {
    let user_id = owner.clone();
    let actions = page_actions(&first);

    SessionSpec::new(owner, first, render_page, move |state, choice| {
        let client = client.clone();
        let user_id = user_id.clone();
        async move {
            let page = match choice.choice_id.as_str() {
                "inv_prev" => state.page.saturating_sub(1).max(1),
                "inv_next" => (state.page + 1).min(state.total_pages),
                _ => state.page,
            };

            let fetched = client.inventory_page(&user_id, page, PAGE_SIZE).await?;
            let state = PageState {
                username: state.username,
                page,
                total_pages: total_pages(fetched.total_items),
                items: fetched.items,
            };
            let actions = page_actions(&state);
            Ok(StepResult::Continue { state, actions })
        }
    })
    .actions(actions)
    .ttl(INVENTORY_TTL)
    .expired_notice("The pack is stowed away.")
}

fn total_pages(total_items: u64) -> u32 {
    (total_items.div_ceil(PAGE_SIZE as u64) as u32).max(1)
}

fn page_actions(state: &PageState) -> Vec<ActionSpec> {
    let mut actions = Vec::new();
    if state.page > 1 {
        actions.push(ActionSpec::new("inv_prev", "◀️ Previous").kind(ActionKind::Secondary));
    }
    if state.page < state.total_pages {
        actions.push(ActionSpec::new("inv_next", "Next ▶️").kind(ActionKind::Secondary));
    }
    actions
}

fn render_page(state: &PageState, actions: &[ActionSpec]) -> DisplayPayload {
    let body = if state.items.is_empty() {
        "_Your inventory is empty._".to_string()
    } else {
        state
            .items
            .iter()
            .map(|item| {
                let equipped = if item.is_equipped { " (Equipped)" } else { "" };
                format!("• **{}** x{}{}", item.name, item.quantity, equipped)
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut payload = DisplayPayload::text(body)
        .with_title(format!("{}'s Inventory", state.username))
        .with_color(COLOR_INVENTORY)
        .with_footer(format!("Page {} of {}", state.page, state.total_pages));
    payload.actions = action_rows(actions);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, quantity: u32, equipped: bool) -> InventoryItem {
        InventoryItem {
            name: name.to_string(),
            quantity,
            is_equipped: equipped,
        }
    }

    fn state(page: u32, total_pages: u32, items: Vec<InventoryItem>) -> PageState {
        PageState {
            username: "alice".to_string(),
            page,
            total_pages,
            items,
        }
    }

    #[test]
    fn total_pages_rounds_up_and_never_hits_zero() {
        assert_eq!(total_pages(0), 1);
        assert_eq!(total_pages(10), 1);
        assert_eq!(total_pages(11), 2);
        assert_eq!(total_pages(95), 10);
    }

    #[test]
    fn first_page_has_no_previous() {
        let actions = page_actions(&state(1, 3, vec![]));
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].id, "inv_next");
    }

    #[test]
    fn last_page_has_no_next() {
        let actions = page_actions(&state(3, 3, vec![]));
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].id, "inv_prev");
    }

    #[test]
    fn middle_page_has_both() {
        let actions = page_actions(&state(2, 3, vec![]));
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn single_page_has_no_buttons() {
        let actions = page_actions(&state(1, 1, vec![]));
        assert!(actions.is_empty());
    }

    #[test]
    fn render_marks_equipped_items_and_pages() {
        let s = state(
            2,
            5,
            vec![item("Rust Sword", 1, true), item("Torch", 4, false)],
        );
        let payload = render_page(&s, &[]);

        assert_eq!(payload.title.as_deref(), Some("alice's Inventory"));
        assert!(payload.body.contains("**Rust Sword** x1 (Equipped)"));
        assert!(payload.body.contains("**Torch** x4"));
        assert_eq!(payload.footer.as_deref(), Some("Page 2 of 5"));
    }

    #[test]
    fn render_empty_inventory() {
        let payload = render_page(&state(1, 1, vec![]), &[]);
        assert_eq!(payload.body, "_Your inventory is empty._");
    }
}
