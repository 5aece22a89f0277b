use anyhow::Result;
use clap::Parser;

use bidflow::cli::commands::{
    check::CheckCommand, config_init::ConfigInitCommand, list::ListCommand, show::ShowCommand,
    show_how_to_get_started, transition::TransitionCommand, transitions::TransitionsCommand,
    watch::WatchCommand,
};
use bidflow::cli::{Cli, Commands};
use bidflow::config::{config, init_config, BidflowConfig};
use bidflow::telemetry::{init_telemetry, shutdown_telemetry};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // A broken config file must not hide the command's own error message
    let observability = config()
        .map(|c| c.observability.clone())
        .unwrap_or_else(|_| BidflowConfig::default().observability);
    init_telemetry(&observability)?;
    if let Err(err) = init_config() {
        tracing::warn!(error = %err, "Configuration could not be loaded");
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async {
        match cli.command {
            // Default behavior: no subcommand - explain what is available
            None => show_how_to_get_started().await,
            Some(Commands::Transitions { status }) => TransitionsCommand::new(status).execute().await,
            Some(Commands::Check { from, to }) => CheckCommand::new(from, to).execute().await,
            Some(Commands::List {
                status,
                search,
                page_size,
            }) => ListCommand::new(status, search, page_size).execute().await,
            Some(Commands::Show { id }) => ShowCommand::new(id).execute().await,
            Some(Commands::Transition { id, to, yes }) => {
                TransitionCommand::new(id, to, yes).execute().await
            }
            Some(Commands::Watch { duration }) => WatchCommand::new(duration).execute().await,
            Some(Commands::ConfigInit { path, force }) => {
                ConfigInitCommand::new(path, force).execute().await
            }
        }
    });

    shutdown_telemetry();
    result
}
