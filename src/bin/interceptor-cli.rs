use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "interceptor-cli")]
#[command(about = "Inspect a running markdown interceptor", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List in-flight loaders
    Loaders,
    /// Show lifetime loader counters
    Stats,
    /// Show the active interceptor order
    Interceptors,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/_interceptor/loaders", cli.url.trim_end_matches('/')))
        .send()
        .await?;

    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: interceptor returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    let section = match cli.command {
        Commands::Loaders => &json["loaders"],
        Commands::Stats => &json["stats"],
        Commands::Interceptors => &json["interceptors"],
    };
    println!("{}", serde_json::to_string_pretty(section)?);
    Ok(())
}
