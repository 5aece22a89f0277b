// Bid status workflow: the transition graph, the confirm/commit session and
// the detail view that drives it.

pub mod detail;
pub mod engine;
pub mod session;
pub mod status;

pub use detail::{BidDetailView, CommitOutcome};
pub use engine::{
    can_transition, initial_status, is_terminal, next_states, next_states_str, request_transition,
    workflow_steps, WorkflowError,
};
pub use session::{session_phase, SessionEvent, SessionPhase, TransitionSession};
pub use status::{BidStatus, UnknownStatus, WorkflowStep, WORKFLOW_STEPS};
