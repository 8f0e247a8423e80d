//! pagewal WAL inspector
//!
//! Command-line interface for checking and dumping WAL files.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pagewal::wal::{LogRecord, WalReader, WalRecovery};
use pagewal::OperationKind;
use tracing_subscriber::{fmt, EnvFilter};

/// pagewal inspector
#[derive(Parser, Debug)]
#[command(name = "pagewal-inspect")]
#[command(about = "Inspect pagewal write-ahead log files")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a WAL and report how much of it is valid
    Verify {
        /// Path to the WAL file
        path: PathBuf,
    },

    /// Print one line per WAL entry
    Dump {
        /// Path to the WAL file
        path: PathBuf,

        /// Stop after this many entries
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pagewal=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let outcome = match args.command {
        Commands::Verify { path } => verify(&path),
        Commands::Dump { path, limit } => dump(&path, limit),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn verify(path: &Path) -> pagewal::Result<()> {
    let result = WalRecovery::verify(path)?;

    println!("entries recovered: {}", result.entries_recovered);
    println!("entries corrupted: {}", result.entries_corrupted);
    println!("last lsn:          {}", result.last_lsn);
    println!("valid bytes:       {}", result.valid_bytes);
    println!("needs truncation:  {}", result.was_truncated);
    Ok(())
}

fn dump(path: &Path, limit: Option<usize>) -> pagewal::Result<()> {
    let reader = WalReader::open(path)?;

    for entry in reader.entries().take(limit.unwrap_or(usize::MAX)) {
        let entry = entry?;
        match &entry.record {
            LogRecord::UnitStart { unit_id } => {
                println!("{:>8}  unit-start  {}", entry.lsn, unit_id);
            }
            LogRecord::UnitEnd {
                unit_id,
                rolled_back,
            } => {
                let state = if *rolled_back { "rolled-back" } else { "committed" };
                println!("{:>8}  unit-end    {} {}", entry.lsn, unit_id, state);
            }
            LogRecord::PageOperation(operation) => {
                println!(
                    "{:>8}  {:<21} page={} unit={} {}",
                    entry.lsn,
                    operation.operation_type().to_string(),
                    operation.page_id(),
                    operation.unit_id(),
                    summary(operation.kind())
                );
            }
        }
    }
    Ok(())
}

fn summary(kind: &OperationKind) -> String {
    match kind {
        OperationKind::AddLeafEntry { index, key, .. }
        | OperationKind::RemoveLeafEntry { index, key, .. }
        | OperationKind::AddNonLeafEntry { index, key, .. }
        | OperationKind::RemoveNonLeafEntry { index, key, .. } => {
            format!("index={} key_len={}", index, key.len())
        }
        OperationKind::AddAll {
            prev_size,
            raw_entries,
            key_serializer,
            ..
        } => format!(
            "prev_size={} entries={} serializer={}",
            prev_size,
            raw_entries.len(),
            key_serializer
        ),
        OperationKind::Shrink {
            new_size,
            removed_entries,
            ..
        } => format!("new_size={} removed={}", new_size, removed_entries.len()),
        OperationKind::UpdateValue { index, .. } => format!("index={}", index),
        OperationKind::SetLeftSibling { sibling, .. }
        | OperationKind::SetRightSibling { sibling, .. } => format!("sibling={}", sibling),
    }
}
