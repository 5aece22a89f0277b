// Transition session for a bid detail view.
//
// Models the confirm -> commit flow. The displayed status only moves on a
// committed result or a newer server push, never optimistically.

use statig::prelude::*;

use super::engine::can_transition;
use super::status::BidStatus;
use crate::model::EntityId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// User picked a target status; opens the confirmation step
    Propose(BidStatus),
    Confirm,
    Cancel,
    /// The commit resolved with the server's status for the bid
    Committed(BidStatus),
    CommitRejected(String),
    /// A push event or refetch carried a newer status
    RemoteUpdate(BidStatus),
    Unmount,
}

#[derive(Debug)]
pub struct TransitionSession {
    pub bid_id: EntityId,
    pub displayed: BidStatus,
    pub pending: Option<BidStatus>,
    pub last_error: Option<String>,
}

impl TransitionSession {
    pub fn new(bid_id: EntityId, displayed: BidStatus) -> Self {
        Self {
            bid_id,
            displayed,
            pending: None,
            last_error: None,
        }
    }

    pub fn displayed(&self) -> BidStatus {
        self.displayed
    }

    pub fn pending(&self) -> Option<BidStatus> {
        self.pending
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn apply_remote(&mut self, status: BidStatus) {
        if self.displayed != status {
            tracing::info!(
                bid_id = %self.bid_id,
                from = %self.displayed,
                to = %status,
                "Displayed status replaced by newer server value"
            );
        }
        self.displayed = status;
    }
}

#[state_machine(initial = "State::idle()", state(derive(Debug, Clone, PartialEq, Eq)))]
impl TransitionSession {
    #[state]
    fn idle(&mut self, event: &SessionEvent) -> Outcome<State> {
        match event {
            SessionEvent::Propose(target) => {
                if !can_transition(self.displayed, *target) {
                    tracing::warn!(
                        bid_id = %self.bid_id,
                        from = %self.displayed,
                        to = %target,
                        "Ignoring proposal for a forbidden transition"
                    );
                    self.last_error = Some(format!(
                        "transition from {} to {} is not allowed",
                        self.displayed, target
                    ));
                    return Handled;
                }
                self.pending = Some(*target);
                self.last_error = None;
                Transition(State::confirming())
            }
            SessionEvent::RemoteUpdate(status) => {
                self.apply_remote(*status);
                Handled
            }
            SessionEvent::Unmount => Transition(State::unmounted()),
            _ => Handled,
        }
    }

    #[state]
    fn confirming(&mut self, event: &SessionEvent) -> Outcome<State> {
        match event {
            SessionEvent::Confirm => {
                tracing::debug!(bid_id = %self.bid_id, to = ?self.pending, "Transition confirmed");
                Transition(State::committing())
            }
            SessionEvent::Cancel => {
                self.pending = None;
                Transition(State::idle())
            }
            SessionEvent::RemoteUpdate(status) => {
                self.apply_remote(*status);
                match self.pending {
                    Some(target) if can_transition(self.displayed, target) => Handled,
                    _ => {
                        tracing::info!(
                            bid_id = %self.bid_id,
                            pending = ?self.pending,
                            "Pending transition no longer valid after server update"
                        );
                        self.pending = None;
                        Transition(State::idle())
                    }
                }
            }
            SessionEvent::Unmount => Transition(State::unmounted()),
            _ => Handled,
        }
    }

    #[state]
    fn committing(&mut self, event: &SessionEvent) -> Outcome<State> {
        match event {
            SessionEvent::Committed(status) => {
                self.displayed = *status;
                self.pending = None;
                self.last_error = None;
                Transition(State::idle())
            }
            SessionEvent::CommitRejected(reason) => {
                tracing::warn!(
                    bid_id = %self.bid_id,
                    status = %self.displayed,
                    reason = %reason,
                    "Commit rejected; keeping displayed status"
                );
                self.pending = None;
                self.last_error = Some(reason.clone());
                Transition(State::idle())
            }
            SessionEvent::RemoteUpdate(status) => {
                self.apply_remote(*status);
                Handled
            }
            SessionEvent::Unmount => Transition(State::unmounted()),
            _ => Handled,
        }
    }

    /// Torn down: nothing is applied any more.
    #[state]
    fn unmounted(&mut self, event: &SessionEvent) -> Outcome<State> {
        tracing::debug!(bid_id = %self.bid_id, event = ?event, "Dropping event for unmounted view");
        Handled
    }
}

/// Coarse phase of a running session, for callers outside this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Confirming,
    Committing,
    Unmounted,
}

pub fn session_phase(sm: &StateMachine<TransitionSession>) -> SessionPhase {
    match sm.state() {
        State::Idle { .. } => SessionPhase::Idle,
        State::Confirming { .. } => SessionPhase::Confirming,
        State::Committing { .. } => SessionPhase::Committing,
        State::Unmounted { .. } => SessionPhase::Unmounted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(status: BidStatus) -> StateMachine<TransitionSession> {
        TransitionSession::new(EntityId::from("bid-1"), status).state_machine()
    }

    #[test]
    fn test_confirmed_commit_moves_displayed_status() {
        let mut sm = session(BidStatus::Draft);

        sm.handle(&SessionEvent::Propose(BidStatus::Submitted));
        assert!(matches!(sm.state(), State::Confirming { .. }));
        assert_eq!(sm.inner().displayed(), BidStatus::Draft);

        sm.handle(&SessionEvent::Confirm);
        assert!(matches!(sm.state(), State::Committing { .. }));
        assert_eq!(sm.inner().displayed(), BidStatus::Draft);

        sm.handle(&SessionEvent::Committed(BidStatus::Submitted));
        assert!(matches!(sm.state(), State::Idle { .. }));
        assert_eq!(sm.inner().displayed(), BidStatus::Submitted);
        assert_eq!(sm.inner().pending(), None);
    }

    #[test]
    fn test_rejected_commit_keeps_displayed_status() {
        let mut sm = session(BidStatus::Approved);

        sm.handle(&SessionEvent::Propose(BidStatus::Won));
        sm.handle(&SessionEvent::Confirm);
        sm.handle(&SessionEvent::CommitRejected("server unavailable".to_string()));

        assert!(matches!(sm.state(), State::Idle { .. }));
        assert_eq!(sm.inner().displayed(), BidStatus::Approved);
        assert_eq!(sm.inner().last_error(), Some("server unavailable"));
    }

    #[test]
    fn test_forbidden_proposal_stays_idle() {
        let mut sm = session(BidStatus::Draft);

        sm.handle(&SessionEvent::Propose(BidStatus::Won));

        assert!(matches!(sm.state(), State::Idle { .. }));
        assert_eq!(sm.inner().pending(), None);
        assert!(sm.inner().last_error().is_some());
    }

    #[test]
    fn test_cancel_returns_to_idle() {
        let mut sm = session(BidStatus::Rejected);

        sm.handle(&SessionEvent::Propose(BidStatus::Draft));
        sm.handle(&SessionEvent::Cancel);

        assert!(matches!(sm.state(), State::Idle { .. }));
        assert_eq!(sm.inner().pending(), None);
        assert_eq!(sm.inner().displayed(), BidStatus::Rejected);
    }

    #[test]
    fn test_remote_update_invalidates_pending_choice() {
        let mut sm = session(BidStatus::Submitted);

        sm.handle(&SessionEvent::Propose(BidStatus::UnderReview));
        // someone else already moved it on
        sm.handle(&SessionEvent::RemoteUpdate(BidStatus::Cancelled));

        assert!(matches!(sm.state(), State::Idle { .. }));
        assert_eq!(sm.inner().displayed(), BidStatus::Cancelled);
        assert_eq!(sm.inner().pending(), None);
    }

    #[test]
    fn test_unmounted_session_ignores_results() {
        let mut sm = session(BidStatus::Draft);

        sm.handle(&SessionEvent::Propose(BidStatus::Submitted));
        sm.handle(&SessionEvent::Confirm);
        sm.handle(&SessionEvent::Unmount);
        sm.handle(&SessionEvent::Committed(BidStatus::Submitted));

        assert!(matches!(sm.state(), State::Unmounted { .. }));
        assert_eq!(sm.inner().displayed(), BidStatus::Draft);
    }
}
