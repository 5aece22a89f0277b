use clap::{Parser, Subcommand};

use crate::workflow::BidStatus;

pub mod commands;

#[derive(Parser)]
#[command(name = "bidflow")]
#[command(about = "Bid workflow and realtime dashboard core")]
#[command(long_about = "bidflow checks and applies bid status transitions against the bids API \
                       and mirrors bids and customers live from the notification feed. \
                       Start with 'bidflow transitions draft' to see the workflow.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the statuses a bid can move to from the given status
    Transitions {
        /// Current status, e.g. draft or under_review
        status: String,
    },
    /// Check whether a transition is allowed (exits non-zero when it is not)
    Check {
        from: BidStatus,
        to: BidStatus,
    },
    /// List bids from the API with a status summary
    List {
        /// Only bids in this status
        #[arg(long, help = "Filter by status, e.g. submitted")]
        status: Option<BidStatus>,
        /// Free-text search
        #[arg(long, help = "Search bid code, title and description")]
        search: Option<String>,
        /// Records per request (max 100)
        #[arg(long, help = "Page size used while fetching (1-100)")]
        page_size: Option<u32>,
    },
    /// Show one bid and its legal next statuses
    Show {
        id: String,
    },
    /// Move a bid to a new status
    Transition {
        id: String,
        to: BidStatus,
        /// Apply without stopping at the confirmation step
        #[arg(short = 'y', long, help = "Confirm and commit the transition")]
        yes: bool,
    },
    /// Mirror bids and customers from the notification feed
    Watch {
        /// Stop after this many seconds (runs until Ctrl-C otherwise)
        #[arg(long, help = "Seconds to watch before exiting")]
        duration: Option<u64>,
    },
    /// Write a default configuration file
    ConfigInit {
        #[arg(long, default_value = "bidflow.toml", help = "Where to write the configuration")]
        path: String,
        /// Overwrite an existing file
        #[arg(long, help = "Overwrite the file if it already exists")]
        force: bool,
    },
}
