use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fightledger_common::{DataLayout, FileConfig, RunMode};
use fightledger_scout::input::load_names;
use fightledger_scout::ledger::Ledger;
use fightledger_scout::Scout;

#[derive(Parser)]
#[command(name = "fightledger", about = "Incremental ESPN MMA fighter statistics ledger")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch, extract and merge fighter statistics
    Run {
        /// incremental or full
        #[arg(long, env = "FIGHTLEDGER_MODE", default_value = "incremental")]
        mode: RunMode,

        /// CSV or plain list of fighter names
        #[arg(long, env = "FIGHTLEDGER_INPUT")]
        input: Option<PathBuf>,

        /// Fighter name, repeatable
        #[arg(long = "fighter")]
        fighters: Vec<String>,

        #[arg(long, env = "FIGHTLEDGER_DATA_DIR", default_value = ".")]
        data_dir: PathBuf,

        /// Path to config TOML file
        #[arg(long, env = "FIGHTLEDGER_CONFIG")]
        config: Option<PathBuf>,

        /// Fetch and extract without writing datasets
        #[arg(long)]
        dry_run: bool,
    },
    /// Row counts of the living datasets
    Summary {
        #[arg(long, env = "FIGHTLEDGER_DATA_DIR", default_value = ".")]
        data_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fightledger=info,fightledger_scout=info,espn_client=info,fightledger_archive=info"));
    if cli.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    match cli.command {
        Command::Run {
            mode,
            input,
            fighters,
            data_dir,
            config,
            dry_run,
        } => run(mode, input, fighters, data_dir, config, dry_run).await,
        Command::Summary { data_dir } => summary(data_dir),
    }
}

async fn run(
    mode: RunMode,
    input: Option<PathBuf>,
    mut names: Vec<String>,
    data_dir: PathBuf,
    config: Option<PathBuf>,
    dry_run: bool,
) -> Result<()> {
    info!("Fightledger starting...");

    let file_config = FileConfig::load(config.as_deref()).context("Failed to load config")?;
    file_config.log_summary();

    if let Some(path) = &input {
        let listed = load_names(path).context("Failed to load fighter list")?;
        info!(path = %path.display(), names = listed.len(), "Loaded fighter list");
        names.extend(listed);
    }
    if names.is_empty() {
        bail!("No fighters given. Pass --input <file> or --fighter <name>");
    }

    let layout = DataLayout::new(&data_dir);
    layout
        .ensure()
        .with_context(|| format!("Data directory unusable: {}", data_dir.display()))?;

    let scout = Scout::new(&file_config, &layout, dry_run).context("Failed to build scout")?;

    let cancel = scout.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current chunk");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let summary = scout.run(&names, mode).await;
    info!("{summary}");
    Ok(())
}

fn summary(data_dir: PathBuf) -> Result<()> {
    let ledger = Ledger::new(DataLayout::new(&data_dir));
    println!("Datasets in {}:", data_dir.display());
    for (kind, count) in ledger.row_counts() {
        match count {
            Ok(Some(rows)) => println!("  {:<26} {rows} rows", kind.file_name()),
            Ok(None) => println!("  {:<26} missing", kind.file_name()),
            Err(e) => println!("  {:<26} unreadable: {e}", kind.file_name()),
        }
    }
    Ok(())
}
