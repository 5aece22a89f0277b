use anyhow::Result;
use std::time::Duration;
use tracing::info;

use crate::cli::commands::with_api_client;
use crate::config::config;
use crate::realtime::{
    Liveness, RealtimeStore, RealtimeSync, StoreReader, TransportSettings, WebSocketTransport,
};

pub struct WatchCommand {
    pub duration: Option<Duration>,
}

impl WatchCommand {
    pub fn new(duration_secs: Option<u64>) -> Self {
        Self {
            duration: duration_secs.map(Duration::from_secs),
        }
    }

    pub async fn execute(&self) -> Result<()> {
        let settings = config()?;
        let transport_settings =
            TransportSettings::from_config(&settings.realtime, settings.api.token.clone());
        let page_size = settings.api.page_size;
        let duration = self.duration;

        with_api_client(|client| async move {
            println!("📡 Watching {}", transport_settings.url);
            let liveness = Liveness::new();
            let transport = WebSocketTransport::new(transport_settings);
            let (sync, reader, _handle) = RealtimeSync::new(client, transport, liveness.clone());
            let task = tokio::spawn(sync.with_page_size(page_size).run());

            let deadline = async {
                match duration {
                    Some(duration) => tokio::time::sleep(duration).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = print_changes(reader) => {}
                _ = deadline => info!("Watch duration elapsed"),
                _ = tokio::signal::ctrl_c() => println!("\n👋 Stopping"),
            }

            liveness.kill();
            let exit = task.await?;
            println!("🛑 Sync stopped ({exit:?})");
            Ok(())
        })
        .await
    }
}

async fn print_changes(mut reader: StoreReader) {
    let mut last_summary = String::new();
    loop {
        let summary = summarize(&reader.current());
        if summary != last_summary {
            println!("{summary}");
            last_summary = summary;
        }
        if !reader.changed().await {
            return;
        }
    }
}

fn summarize(store: &RealtimeStore) -> String {
    let distribution: Vec<String> = store
        .status_distribution()
        .into_iter()
        .map(|(status, count)| format!("{status}={count}"))
        .collect();
    format!(
        "🔌 {} | 📄 {} bids ({} active) | 👥 {} customers | {}",
        store.connection_status(),
        store.bids().len(),
        store.active_bid_count(),
        store.customers().len(),
        distribution.join(" ")
    )
}
