//! Login handoff and route guarding.

mod guard;
mod handoff;

pub use guard::{GuardDecision, GuardState, RouteGuard};
pub use handoff::{
    HANDOFF_KEY, HandoffArtifact, HandoffLatch, HandoffOutcome, HandoffResolver,
    is_handoff_fragment,
};
