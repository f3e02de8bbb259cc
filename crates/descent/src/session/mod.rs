//! Interaction session engine.
//!
//! A session is a time-boxed, single-owner interactive exchange bound to
//! one rendered message: combat rounds, trader offers, inventory pages,
//! narrative choices. The engine is generic; each command supplies state,
//! a step function and a render function through [`SessionSpec`].
//!
//! # Architecture
//!
//! ```text
//!  ┌───────────────────┐ lookup  ┌─────────────────┐
//!  │ InteractionBroker │────────▶│ SessionRegistry │  (message id → handle)
//!  └─────────┬─────────┘         └────────┬────────┘
//!            │ offer (try_send)           │ register / retire
//!            ▼                            │
//!  ┌───────────────────┐                  │
//!  │   SessionHandle   │──mpsc──▶┌────────┴──────────┐
//!  └───────────────────┘         │ SessionController │ (one tokio task per
//!                                │ owns the Program, │  session; serializes
//!                                │ arms the deadline │  responses)
//!                                └────────┬──────────┘
//!                                         │ post / edit
//!                                         ▼
//!                                  ┌────────────┐
//!                                  │  ChatPort  │
//!                                  └────────────┘
//! ```
//!
//! - **SessionController** — renders, waits for exactly one qualifying
//!   response per armed deadline, applies the step function, rearms or
//!   retires. Owns all mutable session state.
//! - **SessionRegistry** — the only process-wide table; guarantees at most
//!   one active session per message id.
//! - **InteractionBroker** — translates callback queries into
//!   `(session, actor, choice)` and offers them without blocking the
//!   platform's event-delivery path.
//! - **SessionSpec / Program** — caller-supplied step and render logic,
//!   type-erased so `StepResult::Chain` can delegate across state types.

mod broker;
mod controller;
mod handle;
mod program;
mod registry;

pub use broker::InteractionBroker;
pub use controller::{SessionController, SessionStatus, failure_payload};
pub use handle::{Offer, SessionHandle};
pub use program::{
    Advance, BoxedProgram, ChoiceEvent, DEFAULT_EXPIRED_NOTICE, DEFAULT_TTL, Program, SessionSpec,
    StepResult,
};
pub use registry::{SessionError, SessionRegistry};
