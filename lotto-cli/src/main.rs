mod commands;
mod config;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use config::{CliConfig, ORACLE_ACCOUNT};
use lotto_core::{AccountId, Clock, ManualClock, RecordingRail, SystemClock};
use lotto_engine::{LotteryError, LotteryService, MockOracle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lotto")]
#[command(about = "Operate a 6-of-90 numbers lottery")]
#[command(version)]
struct Cli {
    /// Data directory for the lottery database
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Lottery rules (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Pretend the current time is this RFC 3339 timestamp
    #[arg(long, global = true)]
    now: Option<DateTime<Utc>>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "lotto={},lotto_engine={},lotto_core={}",
            log_level, log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut cli_config = CliConfig::default();
    if let Some(data_dir) = cli.data_dir {
        cli_config.data_dir = data_dir;
    }
    tokio::fs::create_dir_all(&cli_config.data_dir).await?;
    tracing::debug!("Using data directory {}", cli_config.data_dir.display());

    let lottery_config = cli_config.lottery_config(cli.config.as_deref())?;
    let clock: Arc<dyn Clock> = match cli.now {
        Some(now) => Arc::new(ManualClock::new(now)),
        None => Arc::new(SystemClock),
    };
    let oracle = Arc::new(MockOracle::new(AccountId::from(ORACLE_ACCOUNT)));
    let rail = Arc::new(RecordingRail::new());

    let service = LotteryService::open(
        &cli_config.data_dir,
        lottery_config,
        clock,
        oracle.clone(),
        rail.clone(),
    )
    .await?;
    if let Some(last) = service.read(|engine| engine.last_request_id()) {
        oracle.resume_after(last);
    }

    let result = commands::run(cli.command, &service, &oracle).await;

    for transfer in rail.transfers() {
        println!("Paid out {} to {}", transfer.amount, transfer.to);
    }

    if let Err(e) = result {
        match e.downcast_ref::<LotteryError>() {
            Some(LotteryError::DrawWindowClosed) => {
                eprintln!("Error: the drawing window is closed");
                eprintln!(
                    "Next draw: {}",
                    service.read(|engine| engine.next_draw_time())
                );
            }
            Some(LotteryError::InsufficientPayment { need, available }) => {
                eprintln!("Error: insufficient payment");
                eprintln!("Need: {}, Paid: {}", need, available);
            }
            _ => {
                eprintln!("Error: {:#}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
