//! Print settings-store statistics.
//!
//! Usage:
//!   zenload-stats [--json] [--database <path>]

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use zenload::db::{get_settings_stats, Database};

#[derive(Parser)]
#[command(name = "zenload-stats")]
#[command(about = "Print statistics from the zenload settings store", long_about = None)]
struct Cli {
    /// Print the statistics as JSON
    #[arg(long)]
    json: bool,

    /// SQLite settings store
    #[arg(long, env = "DATABASE_PATH", default_value = "./zenload.sqlite")]
    database: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let db = Database::open_existing(&cli.database).await?;
    let stats = get_settings_stats(db.pool()).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Database statistics");
    println!("Total users:   {}", stats.total_users);
    println!("Total groups:  {}", stats.total_groups);
    println!("Premium users: {}", stats.premium_users);

    println!("\nLanguage distribution:");
    for (language, users) in &stats.languages {
        println!("- {language}: {users} users");
    }

    println!("\nRecently active users:");
    for (user_id, updated_at) in &stats.recent_users {
        println!("User ID: {user_id}, last updated: {updated_at}");
    }

    Ok(())
}
