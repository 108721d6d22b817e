// Entry point and CLI flow.
//
// - `tally` writes the per-technician activity report for a date range.
// - `recurrence` writes the recurring-contracts report for a date range.
// - `lock` / `unlock` / `status` manage the file-backed gate that decides
//   whether new reports may be generated.
//
// After each report a short preview table is printed to the console; the full
// content lives in the report file.
mod config;
mod error;
mod events;
mod filter;
mod gate;
mod loader;
mod output;
mod pipeline;
mod recurrence;
mod reports;
mod types;
mod util;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, Subscriber};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

use config::ReportConfig;
use events::TracingSink;
use gate::{FileLockGate, LockGate, Unlocked};

#[derive(Parser)]
#[command(name = "service-reports")]
#[command(about = "Technician activity and recurring-contract reports from service-order exports")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON file overriding the built-in configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory the report files are written to
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Status file holding the lock state; without it runs are never locked
    #[arg(long, global = true)]
    status_file: Option<PathBuf>,

    /// CSV field delimiter of the export
    #[arg(long, global = true)]
    delimiter: Option<char>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// File every log line is appended to, next to the console output
    #[arg(long, global = true, default_value = ".logs.log")]
    log_file: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Activity tally per technician, helper work included
    Tally(RangeArgs),
    /// Contracts with corrective or clustered repeat visits
    Recurrence(RangeArgs),
    /// Block new report runs
    Lock,
    /// Allow new report runs
    Unlock,
    /// Show the current lock state
    Status,
}

#[derive(Args)]
struct RangeArgs {
    /// Exported sheet, or a directory holding `<sheet name>.csv`
    #[arg(short, long)]
    input: PathBuf,

    /// First day of the range (YYYY-MM-DD)
    #[arg(long)]
    start: NaiveDate,

    /// Last day of the range, inclusive (YYYY-MM-DD)
    #[arg(long)]
    end: NaiveDate,
}

/// Plain-text log layer appending to `path`.
fn file_log_layer<S>(path: &Path) -> io::Result<impl Layer<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file)))
}

fn init_logging(level: &str, log_file: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let file_layer = match file_log_layer(log_file) {
        Ok(layer) => Some(layer),
        Err(e) => {
            eprintln!(
                "Log file {} unavailable ({}), logging to console only",
                log_file.display(),
                e
            );
            None
        }
    };
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<ReportConfig> {
    let config = pipeline::load_config(
        cli.config.as_deref(),
        |config| {
            if let Some(dir) = &cli.output_dir {
                config.output_dir = dir.clone();
            }
            if let Some(delimiter) = cli.delimiter {
                config.delimiter = delimiter;
            }
        },
        &TracingSink,
    )?;
    Ok(config)
}

fn status_gate(cli: &Cli) -> Result<FileLockGate> {
    cli.status_file
        .clone()
        .map(FileLockGate::new)
        .context("--status-file is required to change or show the lock state")
}

fn report_gate(cli: &Cli) -> Box<dyn LockGate> {
    match &cli.status_file {
        Some(path) => Box::new(FileLockGate::new(path)),
        None => Box::new(Unlocked),
    }
}

fn handle_tally(args: &RangeArgs, config: &ReportConfig, gate: &dyn LockGate) -> Result<()> {
    let run = pipeline::run_technician_report(
        &args.input,
        args.start,
        args.end,
        config,
        gate,
        &TracingSink,
    )?;

    println!(
        "Processed {} records after {} metadata rows ({} with unknown dates)",
        util::format_int(run.load.total_rows),
        run.load.header_rows_skipped,
        util::format_int(run.load.unknown_dates)
    );
    println!(
        "Helper services folded into technician totals: {}",
        util::format_int(run.attribution.total_services())
    );
    println!("Activities per technician ({} to {})\n", args.start, args.end);
    output::preview_table_rows(&output::technician_rows(&run.report), 10);
    println!("(Full report exported to {})", run.path.display());
    Ok(())
}

fn handle_recurrence(args: &RangeArgs, config: &ReportConfig, gate: &dyn LockGate) -> Result<()> {
    let run = pipeline::run_recurrence_report(
        &args.input,
        args.start,
        args.end,
        config,
        gate,
        &TracingSink,
    )?;

    println!(
        "Processed {} records, {} recurring contracts",
        util::format_int(run.load.total_rows),
        util::format_int(run.contracts.len())
    );
    println!("Recurring contracts ({} to {})\n", args.start, args.end);
    output::preview_table_rows(&output::contract_rows(&run.contracts), 10);
    println!("(Full report exported to {})", run.path.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_file);

    match &cli.command {
        Command::Tally(args) => {
            let config = load_config(&cli)?;
            handle_tally(args, &config, report_gate(&cli).as_ref())
        }
        Command::Recurrence(args) => {
            let config = load_config(&cli)?;
            handle_recurrence(args, &config, report_gate(&cli).as_ref())
        }
        Command::Lock => {
            let gate = status_gate(&cli)?;
            gate.set_locked(true)?;
            info!(path = %gate.path().display(), "report generation locked");
            println!("Locked.");
            Ok(())
        }
        Command::Unlock => {
            let gate = status_gate(&cli)?;
            gate.set_locked(false)?;
            info!(path = %gate.path().display(), "report generation unlocked");
            println!("Unlocked.");
            Ok(())
        }
        Command::Status => {
            let gate = status_gate(&cli)?;
            let state = if gate.is_locked() { "locked" } else { "unlocked" };
            println!("Report generation is {}.", state);
            Ok(())
        }
    }
}
