//! Session programs: caller-supplied state, step and render logic.
//!
//! A command handler describes an interactive exchange as a [`SessionSpec`]:
//! an owner, an opaque state value, the actions currently on offer, a render
//! function and a step function. The spec is type-erased into a [`Program`]
//! so the controller and `StepResult::Chain` can hold sessions with
//! different state types.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;

use descent_gateway_protocol::{ActionSpec, DisplayPayload};

/// Default time a session waits for a response before expiring.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Default notice appended to the rendered message when a session expires.
pub const DEFAULT_EXPIRED_NOTICE: &str = "This session has expired.";

// ============================================================================
// Step Types
// ============================================================================

/// A response accepted into a session: who pressed which action.
#[derive(Debug, Clone)]
pub struct ChoiceEvent {
    pub actor_id: String,
    pub choice_id: String,
}

/// What a step function returns.
pub enum StepResult<S> {
    /// End the session. The outcome payload is rendered as the final
    /// message; any actions on it are stripped.
    Terminal { outcome: DisplayPayload },

    /// Re-render with new state and choices and rearm the wait with a
    /// fresh deadline.
    Continue {
        state: S,
        actions: Vec<ActionSpec>,
    },

    /// Retire this session and hand the message binding to a delegate
    /// session (e.g. explore handing off to barter).
    Chain { delegate: BoxedProgram },
}

// ============================================================================
// Program (type-erased)
// ============================================================================

/// A type-erased session program driven by the controller.
///
/// Implemented by [`SessionSpec`]; command handlers never implement this
/// directly.
#[async_trait]
pub trait Program: Send {
    /// Identity of the only actor whose responses are accepted.
    fn owner_id(&self) -> &str;

    /// How long each armed wait lasts.
    fn ttl(&self) -> Duration;

    /// Notice appended to the message when the session expires.
    fn expired_notice(&self) -> &str;

    /// Render the current state and actions.
    fn render(&self) -> DisplayPayload;

    /// Apply one accepted response to the current state.
    async fn advance(&mut self, choice: ChoiceEvent) -> anyhow::Result<Advance>;
}

pub type BoxedProgram = Box<dyn Program>;

/// Outcome of one [`Program::advance`] call.
pub enum Advance {
    /// The session finished; render this payload as final.
    Finished(DisplayPayload),
    /// State and actions were replaced; re-render and rearm.
    Rearmed,
    /// Hand the message binding to a delegate program.
    Chained(BoxedProgram),
}

// ============================================================================
// Session Spec
// ============================================================================

type RenderFn<S> = Box<dyn Fn(&S, &[ActionSpec]) -> DisplayPayload + Send>;
type StepFn<S> =
    Box<dyn FnMut(S, ChoiceEvent) -> BoxFuture<'static, anyhow::Result<StepResult<S>>> + Send>;

/// Builder-style description of one interactive session.
///
/// ```ignore
/// let spec = SessionSpec::new(owner, state, render_page, move |state, choice| {
///     let client = client.clone();
///     async move { /* call the game service, return a StepResult */ }
/// })
/// .actions(page_actions(&first))
/// .ttl(Duration::from_secs(120))
/// .expired_notice("The ledger closes.");
/// ```
pub struct SessionSpec<S> {
    owner_id: String,
    ttl: Duration,
    expired_notice: String,
    state: Option<S>,
    actions: Vec<ActionSpec>,
    render: RenderFn<S>,
    step: StepFn<S>,
}

impl<S: Send + 'static> SessionSpec<S> {
    /// Describe a session owned by `owner_id`, starting from `state`.
    ///
    /// `render` turns the current state and actions into a display payload;
    /// `step` maps `(state, response)` to the next [`StepResult`] and may
    /// call the game service.
    pub fn new<R, F, Fut>(owner_id: impl Into<String>, state: S, render: R, mut step: F) -> Self
    where
        R: Fn(&S, &[ActionSpec]) -> DisplayPayload + Send + 'static,
        F: FnMut(S, ChoiceEvent) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<StepResult<S>>> + Send + 'static,
    {
        Self {
            owner_id: owner_id.into(),
            ttl: DEFAULT_TTL,
            expired_notice: DEFAULT_EXPIRED_NOTICE.to_string(),
            state: Some(state),
            actions: Vec::new(),
            render: Box::new(render),
            step: Box::new(move |state, choice| {
                let fut: BoxFuture<'static, anyhow::Result<StepResult<S>>> =
                    Box::pin(step(state, choice));
                fut
            }),
        }
    }

    /// Set the initial actions presented with the first render.
    pub fn actions(mut self, actions: Vec<ActionSpec>) -> Self {
        self.actions = actions;
        self
    }

    /// Override the wait deadline (default 60 s).
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Override the expiry notice text.
    pub fn expired_notice(mut self, notice: impl Into<String>) -> Self {
        self.expired_notice = notice.into();
        self
    }

    /// Erase the state type so the spec can be registered or chained.
    pub fn boxed(self) -> BoxedProgram {
        Box::new(self)
    }
}

#[async_trait]
impl<S: Send + 'static> Program for SessionSpec<S> {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }

    fn expired_notice(&self) -> &str {
        &self.expired_notice
    }

    fn render(&self) -> DisplayPayload {
        match &self.state {
            Some(state) => (self.render)(state, &self.actions),
            // Only reachable if render is called after a failed step; the
            // controller retires the session instead of re-rendering then.
            None => DisplayPayload::default(),
        }
    }

    async fn advance(&mut self, choice: ChoiceEvent) -> anyhow::Result<Advance> {
        let Some(state) = self.state.take() else {
            anyhow::bail!("session state already consumed");
        };

        match (self.step)(state, choice).await? {
            StepResult::Terminal { mut outcome } => {
                outcome.actions.clear();
                Ok(Advance::Finished(outcome))
            }
            StepResult::Continue { state, actions } => {
                self.state = Some(state);
                self.actions = actions;
                Ok(Advance::Rearmed)
            }
            StepResult::Chain { delegate } => Ok(Advance::Chained(delegate)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_count(state: &u32, actions: &[ActionSpec]) -> DisplayPayload {
        let mut payload = DisplayPayload::text(format!("count {state}"));
        payload.actions = vec![actions.to_vec()];
        payload
    }

    fn choice(id: &str) -> ChoiceEvent {
        ChoiceEvent {
            actor_id: "owner".to_string(),
            choice_id: id.to_string(),
        }
    }

    #[tokio::test]
    async fn continue_replaces_state_and_actions() {
        let mut program = SessionSpec::new("owner", 0u32, render_count, |state, _choice| async move {
            Ok(StepResult::Continue {
                state: state + 1,
                actions: vec![ActionSpec::new("again", "Again")],
            })
        })
        .actions(vec![ActionSpec::new("start", "Start")])
        .boxed();

        assert_eq!(program.render().body, "count 0");

        let advance = program.advance(choice("start")).await.unwrap();
        assert!(matches!(advance, Advance::Rearmed));

        let payload = program.render();
        assert_eq!(payload.body, "count 1");
        assert_eq!(payload.actions[0][0].id, "again");
    }

    #[tokio::test]
    async fn terminal_strips_actions_from_outcome() {
        let mut program = SessionSpec::new("owner", 0u32, render_count, |_state, _choice| async {
            Ok(StepResult::Terminal {
                outcome: DisplayPayload::text("done")
                    .with_actions(vec![ActionSpec::new("leftover", "Leftover")]),
            })
        })
        .boxed();

        match program.advance(choice("x")).await.unwrap() {
            Advance::Finished(payload) => {
                assert_eq!(payload.body, "done");
                assert!(payload.actions.is_empty());
            }
            _ => panic!("expected Finished"),
        }
    }

    #[tokio::test]
    async fn chain_yields_delegate_program() {
        let mut program = SessionSpec::new("owner", 0u32, render_count, |_state, _choice| async {
            let delegate =
                SessionSpec::new("owner", 9u32, render_count, |_state, _choice| async {
                    Ok(StepResult::Terminal {
                        outcome: DisplayPayload::text("delegate done"),
                    })
                })
                .boxed();
            Ok(StepResult::Chain { delegate })
        })
        .boxed();

        match program.advance(choice("x")).await.unwrap() {
            Advance::Chained(delegate) => assert_eq!(delegate.render().body, "count 9"),
            _ => panic!("expected Chained"),
        }
    }

    #[tokio::test]
    async fn spec_defaults_apply() {
        let program = SessionSpec::new("owner", 0u32, render_count, |_s, _c| async {
            Ok(StepResult::Terminal {
                outcome: DisplayPayload::text("done"),
            })
        })
        .boxed();

        assert_eq!(program.ttl(), DEFAULT_TTL);
        assert_eq!(program.expired_notice(), DEFAULT_EXPIRED_NOTICE);
        assert_eq!(program.owner_id(), "owner");
    }
}
