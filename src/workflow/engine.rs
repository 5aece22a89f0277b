//! Bid transition evaluation.
//!
//! Everything here is pure except [`request_transition`], whose only side
//! effect is the caller-supplied commit future.

use std::future::Future;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::status::{BidStatus, WorkflowStep, WORKFLOW_STEPS};

#[derive(Debug, Error)]
pub enum WorkflowError<E> {
    #[error("transition from {from} to {to} is not allowed")]
    ForbiddenTransition { from: BidStatus, to: BidStatus },

    #[error("commit failed: {0}")]
    CommitFailed(#[source] E),
}

impl<E> WorkflowError<E> {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, WorkflowError::ForbiddenTransition { .. })
    }

    /// The commit error, if the transition got as far as committing.
    pub fn into_commit_error(self) -> Option<E> {
        match self {
            WorkflowError::CommitFailed(err) => Some(err),
            WorkflowError::ForbiddenTransition { .. } => None,
        }
    }
}

/// Status assigned to a freshly created bid.
pub fn initial_status() -> BidStatus {
    BidStatus::Draft
}

/// Statuses reachable from `current` in one step. Empty for terminal states.
pub fn next_states(current: BidStatus) -> &'static [BidStatus] {
    current.step().next
}

/// Like [`next_states`] but for raw wire text. Unknown input yields nothing,
/// so a view never offers a transition it cannot justify.
pub fn next_states_str(current: &str) -> &'static [BidStatus] {
    match current.parse::<BidStatus>() {
        Ok(status) => next_states(status),
        Err(_) => {
            debug!(status = current, "No transitions for unknown status");
            &[]
        }
    }
}

pub fn can_transition(from: BidStatus, to: BidStatus) -> bool {
    next_states(from).contains(&to)
}

pub fn is_terminal(status: BidStatus) -> bool {
    next_states(status).is_empty()
}

pub fn workflow_steps() -> &'static [WorkflowStep] {
    WORKFLOW_STEPS
}

/// Validate `from -> to` and, only if legal, run `commit(to)`.
///
/// A forbidden request resolves to [`WorkflowError::ForbiddenTransition`]
/// without touching `commit`. Otherwise the commit's own result is passed
/// through: its value on success, its error wrapped in
/// [`WorkflowError::CommitFailed`] on failure.
pub async fn request_transition<F, Fut, T, E>(
    from: BidStatus,
    to: BidStatus,
    commit: F,
) -> Result<T, WorkflowError<E>>
where
    F: FnOnce(BidStatus) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if !can_transition(from, to) {
        warn!(from = %from, to = %to, "Rejected forbidden bid transition");
        return Err(WorkflowError::ForbiddenTransition { from, to });
    }

    debug!(from = %from, to = %to, "Committing bid transition");
    match commit(to).await {
        Ok(value) => {
            info!(from = %from, to = %to, "Bid transition committed");
            Ok(value)
        }
        Err(err) => {
            warn!(from = %from, to = %to, "Bid transition commit failed");
            Err(WorkflowError::CommitFailed(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_next_states_table() {
        use BidStatus::*;
        assert_eq!(next_states(Draft), &[Submitted, Cancelled]);
        assert_eq!(next_states(Submitted), &[UnderReview, TechnicalReview, Cancelled]);
        assert_eq!(next_states(UnderReview), &[TechnicalReview, CommercialReview, Rejected]);
        assert_eq!(next_states(TechnicalReview), &[CommercialReview, Approved, Rejected]);
        assert_eq!(next_states(CommercialReview), &[Approved, Rejected]);
        assert_eq!(next_states(Approved), &[Won, Lost]);
        assert_eq!(next_states(Rejected), &[Draft, Cancelled]);
        assert!(next_states(Won).is_empty());
        assert!(next_states(Lost).is_empty());
        assert_eq!(next_states(Cancelled), &[Draft]);
    }

    #[test]
    fn test_no_skip_ahead() {
        assert!(!can_transition(BidStatus::Draft, BidStatus::Won));
        assert!(can_transition(BidStatus::Draft, BidStatus::Submitted));
        assert!(!can_transition(BidStatus::Cancelled, BidStatus::Submitted));
        assert!(!can_transition(BidStatus::Draft, BidStatus::Draft));
    }

    #[test]
    fn test_terminal_states() {
        assert!(is_terminal(BidStatus::Won));
        assert!(is_terminal(BidStatus::Lost));
        assert!(!is_terminal(BidStatus::Cancelled));
        assert!(!is_terminal(BidStatus::Rejected));
        assert_eq!(initial_status(), BidStatus::Draft);
    }

    #[test]
    fn test_unknown_status_text_has_no_successors() {
        assert!(next_states_str("archived").is_empty());
        assert!(next_states_str("").is_empty());
        assert_eq!(next_states_str("approved"), &[BidStatus::Won, BidStatus::Lost]);
    }

    #[tokio::test]
    async fn test_request_transition_commits_target() {
        let calls = Cell::new(0);
        let result: Result<BidStatus, WorkflowError<String>> =
            request_transition(BidStatus::Draft, BidStatus::Submitted, |to| {
                calls.set(calls.get() + 1);
                async move { Ok(to) }
            })
            .await;

        assert_eq!(result.ok(), Some(BidStatus::Submitted));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_forbidden_transition_never_commits() {
        let calls = Cell::new(0);
        let result: Result<(), WorkflowError<String>> =
            request_transition(BidStatus::Won, BidStatus::Lost, |_| {
                calls.set(calls.get() + 1);
                async { Ok(()) }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_forbidden());
        assert_eq!(calls.get(), 0);
    }

    #[tokio::test]
    async fn test_commit_error_is_passed_through() {
        let result: Result<(), WorkflowError<String>> =
            request_transition(BidStatus::Approved, BidStatus::Won, |_| async {
                Err("502 bad gateway".to_string())
            })
            .await;

        assert_eq!(
            result.unwrap_err().into_commit_error(),
            Some("502 bad gateway".to_string())
        );
    }
}
