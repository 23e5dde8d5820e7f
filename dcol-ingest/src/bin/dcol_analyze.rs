//! dcol-analyze - offline collection progress analysis
//!
//! Reads the metadata document without modifying it, prints a progress
//! summary and optionally saves a JSON snapshot report and a CSV export.
//! `--reconcile` also compares the storage directory with the records.
//!
//! Exit status: 0 when the target is reached, 1 when it is not, 2 on error.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dcol_common::config::{load_or_default, RootFolderResolver};
use dcol_ingest::metadata::MetadataStore;
use dcol_ingest::progress::{hourly_breakdown, summarize_records};
use dcol_ingest::reconcile::{reconcile, render_reconciliation};
use dcol_ingest::report::{export_csv, render_changes, render_text_report, save_report};
use dcol_ingest::storage::listing_of;
use dcol_ingest::IngestConfig;

const DEFAULT_CSV_FILE: &str = "conversations_export.csv";

#[derive(Parser, Debug)]
#[command(name = "dcol-analyze")]
#[command(about = "Report collection progress against a target duration")]
#[command(version)]
struct Args {
    /// Target collection goal in hours
    #[arg(short, long)]
    target: f64,

    /// Save a JSON snapshot report to the report directory
    #[arg(long)]
    save: bool,

    /// Export one CSV row per conversation
    #[arg(long)]
    export_csv: bool,

    /// List stored files without a record and records without a file
    #[arg(long)]
    reconcile: bool,

    /// Root folder holding audio, metadata and reports
    #[arg(short, long, env = "DCOL_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Explicit TOML config file
    #[arg(short, long, env = "DCOL_CONFIG")]
    config: Option<PathBuf>,

    /// Metadata document (overrides config)
    #[arg(long)]
    metadata_file: Option<PathBuf>,

    /// Report directory (overrides config)
    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// CSV output path (defaults to the report directory)
    #[arg(long)]
    csv_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dcol_ingest=warn,dcol_common=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Args::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Returns whether the target is reached
async fn run(args: Args) -> Result<bool> {
    if !args.target.is_finite() || args.target < 0.0 {
        anyhow::bail!("--target must be a finite, non-negative number of hours");
    }

    let toml_config = load_or_default(args.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    let root_folder = RootFolderResolver::new("dcol-analyze")
        .with_cli_arg(args.root_folder)
        .resolve(&toml_config);

    let mut config = IngestConfig::from_toml(root_folder, &toml_config);
    if let Some(path) = args.metadata_file {
        config.metadata_file = path;
    }
    if let Some(path) = args.report_dir {
        config.report_dir = path;
    }

    let store = MetadataStore::open_without_create(&config.metadata_file, config.lock_timeout)
        .with_context(|| format!("Failed to load {}", config.metadata_file.display()))?;
    let records = store.all_records().await;

    let report = summarize_records(&records, args.target);
    println!("{}", render_text_report(&report));

    let reconciliation = if args.reconcile {
        let listing = listing_of(&config.storage_dir)
            .with_context(|| format!("Failed to list {}", config.storage_dir.display()))?;
        let reconciliation = reconcile(&listing, &records);
        println!("{}", render_reconciliation(&reconciliation));
        Some(reconciliation)
    } else {
        None
    };

    if args.save {
        let hourly = hourly_breakdown(&records);
        let saved = save_report(&config.report_dir, &report, &hourly, reconciliation.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to save report: {}", e))?;
        println!("{}", render_changes(&saved.changes_since_last));
        println!("Report saved: {}", saved.path.display());
    }

    if args.export_csv {
        let path = args
            .csv_path
            .unwrap_or_else(|| config.report_dir.join(DEFAULT_CSV_FILE));
        export_csv(&records, &path).map_err(|e| anyhow::anyhow!("Failed to export CSV: {}", e))?;
        println!("CSV exported: {}", path.display());
    }

    Ok(report.target_reached)
}
