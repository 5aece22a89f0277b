//! Detail view driver: one bid, one status change at a time.
//!
//! Wraps a [`TransitionSession`] with the remote commit. The displayed
//! status moves only when the server accepts the change (or a newer push
//! arrives), and nothing is applied once the view is gone.

use statig::prelude::*;
use tracing::{debug, Instrument};

use super::engine::{next_states, request_transition, WorkflowError};
use super::session::{session_phase, SessionEvent, SessionPhase, TransitionSession};
use super::status::BidStatus;
use crate::api::{ApiError, BidApi};
use crate::model::{Bid, EntityId};
use crate::realtime::{Change, Liveness, StoreEvent, SyncHandle};
use crate::telemetry::create_transition_span;

/// Result of confirming a pending transition.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// The server stored the change; carries the bid it returned
    Committed(Bid),
    /// The view went away while the request was in flight
    Discarded,
    /// Nothing was pending
    NothingToCommit,
}

pub struct BidDetailView<A> {
    machine: StateMachine<TransitionSession>,
    api: A,
    liveness: Liveness,
    sync: Option<SyncHandle>,
}

impl<A: BidApi> BidDetailView<A> {
    pub fn new(bid: &Bid, api: A) -> Self {
        Self {
            machine: TransitionSession::new(bid.id.clone(), bid.status).state_machine(),
            api,
            liveness: Liveness::new(),
            sync: None,
        }
    }

    /// Forward committed results into a running realtime store.
    pub fn with_sync(mut self, handle: SyncHandle) -> Self {
        self.sync = Some(handle);
        self
    }

    /// Shared lifetime flag; killing it has the same effect as [`Self::unmount`]
    /// on any commit still in flight.
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    pub fn bid_id(&self) -> &EntityId {
        &self.machine.inner().bid_id
    }

    pub fn displayed(&self) -> BidStatus {
        self.machine.inner().displayed()
    }

    pub fn pending(&self) -> Option<BidStatus> {
        self.machine.inner().pending()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.machine.inner().last_error()
    }

    pub fn phase(&self) -> SessionPhase {
        session_phase(&self.machine)
    }

    /// Choices to offer for the displayed status.
    pub fn next_states(&self) -> &'static [BidStatus] {
        next_states(self.displayed())
    }

    /// Open the confirmation step for `to`. Forbidden targets are refused
    /// up front and never reach the server.
    pub fn propose(&mut self, to: BidStatus) -> Result<(), WorkflowError<ApiError>> {
        let from = self.displayed();
        self.machine.handle(&SessionEvent::Propose(to));
        if self.phase() == SessionPhase::Confirming {
            Ok(())
        } else {
            Err(WorkflowError::ForbiddenTransition { from, to })
        }
    }

    pub fn cancel(&mut self) {
        self.machine.handle(&SessionEvent::Cancel);
    }

    /// A newer copy of this bid arrived from the feed or a refetch.
    pub fn remote_update(&mut self, bid: &Bid) {
        if &bid.id == self.bid_id() {
            self.machine.handle(&SessionEvent::RemoteUpdate(bid.status));
        }
    }

    /// Commit the pending transition.
    ///
    /// On failure the displayed status is left as it was and the error is
    /// both returned and kept as [`Self::last_error`].
    pub async fn confirm(&mut self) -> Result<CommitOutcome, WorkflowError<ApiError>> {
        let Some(to) = self.pending() else {
            return Ok(CommitOutcome::NothingToCommit);
        };
        if self.phase() != SessionPhase::Confirming {
            return Ok(CommitOutcome::NothingToCommit);
        }

        let from = self.displayed();
        let id = self.bid_id().clone();
        self.machine.handle(&SessionEvent::Confirm);

        let span = create_transition_span(id.as_str(), from.as_str(), to.as_str());
        let api = &self.api;
        let result = request_transition(from, to, |target| async move {
            api.update_bid_status(&id, target).await
        })
        .instrument(span)
        .await;

        if !self.liveness.is_alive() {
            debug!(bid_id = %self.bid_id(), "Discarding commit result for closed view");
            self.machine.handle(&SessionEvent::Unmount);
            return Ok(CommitOutcome::Discarded);
        }

        match result {
            Ok(bid) => {
                self.machine.handle(&SessionEvent::Committed(bid.status));
                if let Some(sync) = &self.sync {
                    sync.apply(StoreEvent::Bid(Change::Updated(bid.clone())));
                }
                Ok(CommitOutcome::Committed(bid))
            }
            Err(err) => {
                self.machine
                    .handle(&SessionEvent::CommitRejected(err.to_string()));
                Err(err)
            }
        }
    }

    /// Tear the view down. Later results are ignored.
    pub fn unmount(&mut self) {
        self.liveness.kill();
        self.machine.handle(&SessionEvent::Unmount);
    }
}
