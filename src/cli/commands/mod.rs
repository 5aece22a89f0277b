use anyhow::{Context, Result};

use crate::api::BidApiClient;
use crate::config::config;

pub mod check;
pub mod config_init;
pub mod list;
pub mod show;
pub mod transition;
pub mod transitions;
pub mod watch;

pub async fn with_api_client<F, Fut, R>(f: F) -> Result<R>
where
    F: FnOnce(BidApiClient) -> Fut + Send,
    Fut: std::future::Future<Output = Result<R>> + Send,
    R: Send,
{
    print!("🔄 Connecting to the bids API... ");
    std::io::Write::flush(&mut std::io::stdout())?;

    let settings = config()?;
    match BidApiClient::new(&settings.api) {
        Ok(client) => {
            println!("✅");
            f(client).await
        }
        Err(e) => {
            println!("❌");
            Err(e).context("Failed to initialize the API client")
        }
    }
}

pub async fn show_how_to_get_started() -> Result<()> {
    println!("📋 bidflow - bid workflow and realtime dashboard core");
    println!();
    println!("Workflow:");
    println!("  🔀 bidflow transitions draft        # Legal next statuses");
    println!("  ✔️  bidflow check draft submitted    # Validate one transition");
    println!();
    println!("Bids API:");
    println!("  📄 bidflow list --status submitted  # Fetch bids");
    println!("  🔎 bidflow show <id>                # One bid and its options");
    println!("  🚀 bidflow transition <id> <status> --yes");
    println!("  📡 bidflow watch                    # Mirror the live feed");
    println!();
    println!("💡 Run 'bidflow config-init' to write a bidflow.toml to edit.");
    Ok(())
}
