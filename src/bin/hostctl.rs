use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "hostctl")]
#[command(about = "Inspect a running dispatch-host in debug mode", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the full diagnostic snapshot
    Requestinfo,
    /// Print registry counts
    Stats,
    /// Print the last dispatched request
    LastRequest,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/requestinfo", cli.url.trim_end_matches('/')))
        .send()
        .await?;

    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: host returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        eprintln!("Is the host running with debug mode enabled?");
        return Ok(());
    }

    let snapshot: Value = res.json().await?;
    let selected = match cli.command {
        Commands::Requestinfo => &snapshot,
        Commands::Stats => &snapshot["Stats"],
        Commands::LastRequest => &snapshot["LastRequestInfo"],
    };
    println!("{}", serde_json::to_string_pretty(selected)?);
    Ok(())
}
