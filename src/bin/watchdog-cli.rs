use clap::{Parser, Subcommand};
use serde_json::Value;

use watchdog_sdk::WatchdogClient;

#[derive(Parser)]
#[command(name = "watchdog-cli")]
#[command(about = "Management CLI for the bridge watchdog", long_about = None)]
struct Cli {
    #[arg(short, long, env = "WATCHDOG_ADMIN_URL", default_value = "http://127.0.0.1:8081")]
    url: String,

    #[arg(short, long, env = "WATCHDOG_ADMIN_API_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current watchdog state
    Status,
    /// Run a health check now
    ForceSync,
    /// Trigger a recovery, ignoring the failure counter
    ForceHeal {
        #[arg(short, long)]
        reason: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut client = WatchdogClient::new(&cli.url);
    if let Some(key) = cli.key {
        client = client.with_api_key(key);
    }

    let response: Value = match cli.command {
        Commands::Status => client.status_raw().await?,
        Commands::ForceSync => client.force_sync_raw().await?,
        Commands::ForceHeal { reason } => client.force_heal_raw(reason.as_deref()).await?,
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
