use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use processor::maintenance;
use sqlx::postgres::PgPoolOptions;
use storage::models::RulesetId;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "score-statistics")]
#[command(about = "Score statistics maintenance tooling", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations.
    Migrate,
    /// Recompute every user's rating for one ruleset from their score set.
    RecomputeRatings {
        #[arg(long)]
        ruleset: i16,

        #[arg(long, default_value_t = 4)]
        workers: usize,

        #[arg(long, default_value_t = 50)]
        batch_size: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("processor={},storage={}", log_level, log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&cli.database_url)
        .await?;

    match cli.command {
        Commands::Migrate => {
            storage::migrate(&pool).await?;
            tracing::info!("migrations applied");
        }
        Commands::RecomputeRatings {
            ruleset,
            workers,
            batch_size,
        } => {
            let ruleset = RulesetId::try_from(ruleset)
                .map_err(|_| format!("unsupported ruleset id {ruleset}"))?;

            let cancel = Arc::new(AtomicBool::new(false));
            spawn_ctrl_c_handler(Arc::clone(&cancel));

            let processed = maintenance::recompute_all_ratings(
                &pool,
                ruleset.as_i16(),
                workers,
                batch_size,
                cancel,
            )
            .await?;
            tracing::info!("recomputed {} users", processed);
        }
    }

    Ok(())
}

fn spawn_ctrl_c_handler(cancel: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("cancellation requested, finishing in-flight batches");
            cancel.store(true, Ordering::SeqCst);
        }
    });
}
