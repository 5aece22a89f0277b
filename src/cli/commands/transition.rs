use anyhow::{Context, Result};

use crate::api::BidApi;
use crate::cli::commands::with_api_client;
use crate::model::EntityId;
use crate::workflow::{BidDetailView, BidStatus, CommitOutcome};

pub struct TransitionCommand {
    pub id: EntityId,
    pub to: BidStatus,
    pub yes: bool,
}

impl TransitionCommand {
    pub fn new(id: String, to: BidStatus, yes: bool) -> Self {
        Self {
            id: EntityId::new(id),
            to,
            yes,
        }
    }

    pub async fn execute(&self) -> Result<()> {
        let id = self.id.clone();
        let to = self.to;
        let yes = self.yes;

        with_api_client(|client| async move {
            let bid = client
                .get_bid(&id)
                .await
                .with_context(|| format!("Failed to fetch bid {id}"))?;
            let mut view = BidDetailView::new(&bid, client);

            if let Err(e) = view.propose(to) {
                println!("❌ {e}");
                let options: Vec<&str> = view.next_states().iter().map(|s| s.as_str()).collect();
                if !options.is_empty() {
                    println!("   💡 Allowed from {}: {}", bid.status, options.join(", "));
                }
                return Err(e.into());
            }

            println!("🔀 {}: {} → {}", bid.label(), bid.status.display_name(), to.display_name());
            if !yes {
                println!("   ⏸️  Not applied. Re-run with --yes to confirm.");
                view.cancel();
                return Ok(());
            }

            match view.confirm().await? {
                CommitOutcome::Committed(updated) => {
                    println!("✅ Bid {} is now {}", updated.id, updated.status);
                }
                CommitOutcome::Discarded | CommitOutcome::NothingToCommit => {
                    println!("⚠️  Nothing was applied");
                }
            }
            Ok(())
        })
        .await
    }
}
