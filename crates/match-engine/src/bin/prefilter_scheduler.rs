use std::env;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use database::Database;
use match_engine::config::sqlite_url_from_path;
use match_engine::{CandidatePrefilter, EngineSettings, PrefilterOutcome};

#[derive(Debug, Parser)]
#[command(name = "prefilter-scheduler")]
#[command(about = "Rebuild every single client's candidate cache on a fixed cadence")]
struct Args {
    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    /// Hours between passes
    #[arg(long, default_value_t = 24)]
    interval_hours: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let path = env::var("SQLITE_PATH").unwrap_or_else(|_| "sqlite:matchdesk.db?mode=rwc".to_string());
    let db = Database::connect(&sqlite_url_from_path(&path)).await?;
    db.migrate().await?;

    let settings = EngineSettings::from_env();
    let prefilter = CandidatePrefilter::new(db.clone(), settings.prefilter);

    if args.once {
        run_pass(&prefilter).await;
        db.close().await;
        return Ok(());
    }

    let period = Duration::from_secs(args.interval_hours.max(1) * 60 * 60);
    info!(
        lock = prefilter.lock_key(),
        "Scheduling candidate pre-filter every {}h",
        period.as_secs() / 3600
    );

    let mut ticker = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = ticker.tick() => run_pass(&prefilter).await,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    db.close().await;
    Ok(())
}

async fn run_pass(prefilter: &CandidatePrefilter) {
    match prefilter.run().await {
        Ok(PrefilterOutcome::Completed(report)) => {
            info!(
                seen = report.clients_seen,
                cached = report.cached,
                failed = report.failed,
                "Pass finished"
            );
        }
        Ok(PrefilterOutcome::Skipped) => info!("Pass skipped, lease held elsewhere"),
        Err(err) => error!("Pre-filter pass failed: {}", err),
    }
}
