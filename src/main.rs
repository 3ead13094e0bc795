use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use price_reconcile::{
    export_csv, write_report, AprDataFile, Config, ReconciliationEngine, SnapshotCache,
};

/// Compare a token's daily price from the APR dataset against the
/// per-day assets snapshots. With no arguments the default paths are used.
#[derive(Parser)]
#[command(name = "price-reconcile", version)]
struct Cli {
    /// TOML config file (missing keys keep their defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// APR dataset JSON (overrides config)
    #[arg(long)]
    primary: Option<PathBuf>,

    /// Snapshot cache root (overrides config)
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Asset identifier to look up in snapshots (overrides config)
    #[arg(long)]
    asset_id: Option<String>,

    /// Also write the comparison rows as CSV
    #[arg(long)]
    csv: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let result = build_config(&cli).and_then(|config| run(&config, cli.csv.as_deref()));

    if let Err(e) = result {
        error!("❌ Reconciliation aborted: {:#}", e);
        return Err(e);
    }

    Ok(())
}

fn init_tracing() {
    // stdout is reserved for the report
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("price_reconcile=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false).compact())
        .init();
}

fn build_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(primary) = &cli.primary {
        config.primary_path = primary.clone();
    }
    if let Some(dir) = &cli.snapshot_dir {
        config.snapshot_dir = dir.clone();
    }
    if let Some(asset_id) = &cli.asset_id {
        config.asset_id = asset_id.clone();
    }

    config.validate()?;
    Ok(config)
}

fn run(config: &Config, csv_path: Option<&std::path::Path>) -> Result<()> {
    info!(
        primary = %config.primary_path.display(),
        snapshots = %config.snapshot_dir.display(),
        "📂 Reconciling {} prices",
        config.token_symbol
    );

    let primary = AprDataFile::new(&config.primary_path);
    let snapshots = SnapshotCache::new(&config.snapshot_dir);
    let engine = ReconciliationEngine::from_config(config);

    let report = engine
        .reconcile(&primary, &snapshots)
        .context("Failed to load primary price series")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_report(&mut out, &report, &config.token_symbol)?;
    out.flush().context("Failed to flush report")?;

    if let Some(path) = csv_path {
        export_csv(path, &report.rows)?;
        info!(path = %path.display(), rows = report.rows.len(), "✓ CSV written");
    }

    info!("✅ {}", report.summary());
    Ok(())
}
