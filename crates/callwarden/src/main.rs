// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Callwarden - call rate governor and call-quality tracker.
//!
//! This is the binary entry point: one subcommand per governor operation,
//! plus the dashboard and history report.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod render;

use std::path::PathBuf;

use callwarden_core::CallOutcome;
use callwarden_governor::ReportPeriod;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

/// Callwarden - per-number call limits and relationship quality.
#[derive(Parser, Debug)]
#[command(name = "callwarden", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// The relationship a command applies to.
#[derive(Args, Debug, Clone)]
pub struct KeyArgs {
    /// Business account that owns the relationship.
    #[arg(long)]
    pub owner: String,
    /// Contact phone number.
    #[arg(long)]
    pub phone: String,
}

/// Output format flags.
#[derive(Args, Debug, Clone, Copy)]
pub struct OutputArgs {
    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
    /// Disable colors.
    #[arg(long)]
    pub plain: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check whether a call may be placed now. Counts nothing.
    Check {
        #[command(flatten)]
        key: KeyArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Count a call the provider accepted and open its history entry.
    RecordCall {
        #[command(flatten)]
        key: KeyArgs,
        /// Display name of the contact.
        #[arg(long)]
        contact_name: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Record the terminal outcome of a call.
    Outcome {
        #[command(flatten)]
        key: KeyArgs,
        /// connected, missed, rejected, or failed.
        #[arg(long)]
        outcome: CallOutcome,
        /// Talk time in seconds.
        #[arg(long, default_value_t = 0)]
        duration: u32,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Record that the courtesy warning was delivered.
    MarkWarning {
        #[command(flatten)]
        key: KeyArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Clear the warning flag so the next miss streak warns again.
    ResetWarning {
        #[command(flatten)]
        key: KeyArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Override the call limit of one number.
    SetLimit {
        #[command(flatten)]
        key: KeyArgs,
        /// Calls allowed per 24-hour window.
        #[arg(long)]
        limit: u32,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Start a fresh 24-hour window for one number.
    ResetWindow {
        #[command(flatten)]
        key: KeyArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Show live limits and quality across every number of an owner.
    Dashboard {
        /// Business account to report on.
        #[arg(long)]
        owner: String,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Summarize call history for a period.
    Report {
        /// Business account to report on.
        #[arg(long)]
        owner: String,
        /// today, week, month, or a day count such as 14d.
        #[arg(long, default_value = "week", conflicts_with_all = ["from", "to"])]
        period: ReportPeriod,
        /// First day of an explicit range (UTC, inclusive).
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,
        /// Last day of an explicit range (UTC, inclusive).
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup
    let loaded = match cli.config.as_deref() {
        Some(path) => callwarden_config::load_and_validate_path(path),
        None => callwarden_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            callwarden_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.normalized_level());

    if let Err(e) = commands::run(cli.command, &config).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber on stderr.
///
/// `RUST_LOG` wins over the configured level.
fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

/// Filter used when `RUST_LOG` is unset. `log_level` must already be normalized.
fn default_filter(log_level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::new(format!(
        "callwarden={log_level},callwarden_governor={log_level},callwarden_storage={log_level},warn"
    ))
}
