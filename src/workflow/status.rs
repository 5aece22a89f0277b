use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle status of a bid.
///
/// The wire representation is the snake_case name (`under_review`,
/// `technical_review`, ...). Anything else fails to parse, so a `Bid` can
/// never hold a status outside this enumeration.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    #[default]
    Draft,
    Submitted,
    UnderReview,
    TechnicalReview,
    CommercialReview,
    Approved,
    Rejected,
    Won,
    Lost,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown bid status: {0}")]
pub struct UnknownStatus(pub String);

/// Static configuration for one status: its label and where it may go next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowStep {
    pub status: BidStatus,
    pub display_name: &'static str,
    pub next: &'static [BidStatus],
}

/// The transition table, one entry per status, in lifecycle order.
pub const WORKFLOW_STEPS: &[WorkflowStep] = &[
    WorkflowStep {
        status: BidStatus::Draft,
        display_name: "Draft",
        next: &[BidStatus::Submitted, BidStatus::Cancelled],
    },
    WorkflowStep {
        status: BidStatus::Submitted,
        display_name: "Submitted for Review",
        next: &[
            BidStatus::UnderReview,
            BidStatus::TechnicalReview,
            BidStatus::Cancelled,
        ],
    },
    WorkflowStep {
        status: BidStatus::UnderReview,
        display_name: "Under Review",
        next: &[
            BidStatus::TechnicalReview,
            BidStatus::CommercialReview,
            BidStatus::Rejected,
        ],
    },
    WorkflowStep {
        status: BidStatus::TechnicalReview,
        display_name: "Technical Review",
        next: &[
            BidStatus::CommercialReview,
            BidStatus::Approved,
            BidStatus::Rejected,
        ],
    },
    WorkflowStep {
        status: BidStatus::CommercialReview,
        display_name: "Commercial Review",
        next: &[BidStatus::Approved, BidStatus::Rejected],
    },
    WorkflowStep {
        status: BidStatus::Approved,
        display_name: "Approved",
        next: &[BidStatus::Won, BidStatus::Lost],
    },
    WorkflowStep {
        status: BidStatus::Rejected,
        display_name: "Rejected",
        next: &[BidStatus::Draft, BidStatus::Cancelled],
    },
    WorkflowStep {
        status: BidStatus::Won,
        display_name: "Won",
        next: &[],
    },
    WorkflowStep {
        status: BidStatus::Lost,
        display_name: "Lost",
        next: &[],
    },
    WorkflowStep {
        status: BidStatus::Cancelled,
        display_name: "Cancelled",
        next: &[BidStatus::Draft],
    },
];

impl BidStatus {
    pub const ALL: [BidStatus; 10] = [
        BidStatus::Draft,
        BidStatus::Submitted,
        BidStatus::UnderReview,
        BidStatus::TechnicalReview,
        BidStatus::CommercialReview,
        BidStatus::Approved,
        BidStatus::Rejected,
        BidStatus::Won,
        BidStatus::Lost,
        BidStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BidStatus::Draft => "draft",
            BidStatus::Submitted => "submitted",
            BidStatus::UnderReview => "under_review",
            BidStatus::TechnicalReview => "technical_review",
            BidStatus::CommercialReview => "commercial_review",
            BidStatus::Approved => "approved",
            BidStatus::Rejected => "rejected",
            BidStatus::Won => "won",
            BidStatus::Lost => "lost",
            BidStatus::Cancelled => "cancelled",
        }
    }

    /// The table entry for this status.
    pub fn step(&self) -> &'static WorkflowStep {
        // WORKFLOW_STEPS is laid out in declaration order
        &WORKFLOW_STEPS[*self as usize]
    }

    pub fn display_name(&self) -> &'static str {
        self.step().display_name
    }

    /// Closed bids no longer count towards the active pipeline.
    pub fn is_active(&self) -> bool {
        !matches!(self, BidStatus::Won | BidStatus::Lost | BidStatus::Cancelled)
    }
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BidStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BidStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}
