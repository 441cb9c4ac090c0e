//! `inventory` - builds the `Inventories` table of a simulation output database
//! in place.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use contracts::{RunReport, WalkConfig, DEFAULT_FLUSH_EVERY, DEFAULT_HISTORY_CAPACITY};
use inventory_store::{history, InventoryStore};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Reconstructs which agent held every resource over time and writes the
/// result to the `Inventories` table of the same database.
#[derive(Debug, Parser)]
#[command(name = "inventory", version, about, long_about = None)]
struct Cli {
    /// Simulation output database, updated in place.
    db: PathBuf,

    /// Also write every inserted row as an SQL statement to this file.
    #[arg(long, value_name = "PATH")]
    history: Option<PathBuf>,

    /// Resources walked between two committed batches.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_FLUSH_EVERY)]
    flush_every: u64,

    /// Statements buffered towards the history file before the walk waits.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_HISTORY_CAPACITY)]
    history_capacity: usize,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn walk_config(&self) -> WalkConfig {
        WalkConfig {
            flush_every: self.flush_every,
            history_capacity: self.history_capacity,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        error!("{err:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let store = InventoryStore::open(&cli.db, cli.walk_config())
        .with_context(|| format!("cannot open {}", cli.db.display()))?;

    let report = match &cli.history {
        Some(path) => build_with_history(&store, path)?,
        None => store.build_all(None)?,
    };

    info!(
        simulations = report.simulations.len(),
        intervals = report.total_intervals(),
        skipped_indices = report.skipped_indices.len(),
        "inventories complete"
    );

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

/// Runs the whole build with a consumer thread draining the history channel
/// into `path`. The sender is dropped only after the last walk returns.
fn build_with_history(store: &InventoryStore, path: &Path) -> Result<RunReport> {
    let file = File::create(path)
        .with_context(|| format!("cannot create history file {}", path.display()))?;
    let (tx, rx) = history::channel(store.config().history_capacity);
    let consumer = thread::spawn(move || rx.drain_into(BufWriter::new(file)));

    let built = store.build_all(Some(&tx));
    drop(tx);

    let drained = consumer
        .join()
        .map_err(|_| anyhow::anyhow!("history writer thread panicked"))?;
    // A writer failure shows up in the walk as `HistoryClosed`; report the
    // write error instead.
    let statements = drained.with_context(|| format!("cannot write {}", path.display()))?;
    let report = built?;
    info!(statements, path = %path.display(), "history written");
    Ok(report)
}
