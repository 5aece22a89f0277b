use anyhow::Result;

use crate::api::{fetch_all_bids, BidQuery};
use crate::cli::commands::with_api_client;
use crate::config::config;
use crate::realtime::{RealtimeStore, Snapshot};
use crate::workflow::BidStatus;

pub struct ListCommand {
    pub status: Option<BidStatus>,
    pub search: Option<String>,
    pub page_size: Option<u32>,
}

impl ListCommand {
    pub fn new(status: Option<BidStatus>, search: Option<String>, page_size: Option<u32>) -> Self {
        Self {
            status,
            search,
            page_size,
        }
    }

    fn query(&self, default_page_size: u32) -> BidQuery {
        let mut query = BidQuery::new().with_page_size(self.page_size.unwrap_or(default_page_size));
        if let Some(status) = self.status {
            query = query.with_status(status);
        }
        if let Some(search) = &self.search {
            query = query.with_search(search.clone());
        }
        query
    }

    pub async fn execute(&self) -> Result<()> {
        let query = self.query(config()?.api.page_size);

        with_api_client(|client| async move {
            let bids = fetch_all_bids(&client, query).await?;
            if bids.is_empty() {
                println!("📋 No bids found");
                return Ok(());
            }

            let mut store = RealtimeStore::new();
            for bid in &bids {
                let urgent = if bid.is_urgent() { " 🔥" } else { "" };
                println!("   📄 [{}] {} ({}){}", bid.id, bid.label(), bid.status, urgent);
            }
            store.apply_snapshot(Snapshot::Bids(bids));

            println!();
            println!("📊 {} bids, {} active", store.bids().len(), store.active_bid_count());
            for (status, count) in store.status_distribution() {
                println!("   {:<20} {}", status.display_name(), count);
            }
            Ok(())
        })
        .await
    }
}
