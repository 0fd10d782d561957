use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use importer::{LegacyScoreImporter, ReplicationMonitor};
use sqlx::postgres::PgPoolOptions;
use storage::models::RulesetId;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "import")]
#[command(about = "Legacy high-score importer", long_about = None)]
#[command(version)]
struct Cli {
    /// Ruleset to import (0-3).
    #[arg(long)]
    ruleset: i16,

    /// Number of concurrent insertion workers.
    #[arg(long, default_value_t = 4)]
    workers: usize,

    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Read replica to sample lag from. Without it the importer never slows
    /// down.
    #[arg(long, env = "REPLICA_DATABASE_URL")]
    replica_database_url: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let ruleset = RulesetId::try_from(cli.ruleset)
        .map_err(|_| format!("unsupported ruleset id {}", cli.ruleset))?;

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("import={},importer={}", log_level, log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = PgPoolOptions::new()
        .max_connections(cli.workers as u32 + 2)
        .connect(&cli.database_url)
        .await?;

    let replica = match &cli.replica_database_url {
        Some(url) => Some(PgPoolOptions::new().max_connections(1).connect(url).await?),
        None => None,
    };

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("cancellation requested, stopping after current batch");
                cancel.store(true, Ordering::SeqCst);
            }
        });
    }

    let mut importer = LegacyScoreImporter::new(
        pool,
        ReplicationMonitor::new(replica),
        ruleset.as_i16(),
        cli.workers,
    );

    let summary = importer.run(cancel).await?;
    tracing::info!(
        "imported {} scores in {} batches (watermark {})",
        summary.inserted,
        summary.batches,
        summary.last_legacy_id
    );

    Ok(())
}
