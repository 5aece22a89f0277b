use anyhow::Result;

use crate::api::BidApi;
use crate::cli::commands::with_api_client;
use crate::model::EntityId;
use crate::workflow::next_states;

pub struct ShowCommand {
    pub id: EntityId,
}

impl ShowCommand {
    pub fn new(id: String) -> Self {
        Self { id: EntityId::new(id) }
    }

    pub async fn execute(&self) -> Result<()> {
        let id = self.id.clone();
        with_api_client(|client| async move {
            let bid = match client.get_bid(&id).await {
                Ok(bid) => bid,
                Err(e) if e.is_not_found() => {
                    println!("❓ Bid {id} not found");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };

            println!("📄 {}", bid.label());
            println!("   🏷️  Status: {} ({})", bid.status.display_name(), bid.status);
            if let Some(priority) = bid.priority() {
                println!("   ⚡ Priority: {priority}");
            }
            if let Some(updated_at) = bid.updated_at {
                let by = bid.updated_by.as_deref().unwrap_or("unknown");
                println!("   🕒 Updated {} by {}", updated_at.format("%Y-%m-%d %H:%M UTC"), by);
            }

            let options = next_states(bid.status);
            if options.is_empty() {
                println!("   🏁 No further transitions");
            } else {
                println!("   🔀 Can move to:");
                for next in options {
                    println!("      → {} ({})", next.display_name(), next);
                }
            }
            Ok(())
        })
        .await
    }
}
