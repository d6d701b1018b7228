// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subcommand execution.
//!
//! Opens the database from config, wires the services over the system clock,
//! runs one operation, and hands the result to [`render`](crate::render).

use std::sync::Arc;

use callwarden_config::CallwardenConfig;
use callwarden_core::{CallKey, CallwardenError, Clock, SystemClock};
use callwarden_governor::{CallGate, ReportPeriod, Reporter};
use callwarden_storage::Database;
use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::debug;

use crate::render;
use crate::{Commands, KeyArgs};

impl KeyArgs {
    fn to_key(&self) -> Result<CallKey, CallwardenError> {
        CallKey::new(self.owner.as_str(), self.phone.as_str())
    }
}

/// Resolve `--period` or the inclusive `--from`/`--to` day range.
pub fn resolve_period(
    period: ReportPeriod,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> ReportPeriod {
    match (from, to) {
        (Some(from), Some(to)) => ReportPeriod::Range {
            start: from.and_time(NaiveTime::MIN).and_utc(),
            end: to.and_time(NaiveTime::MIN).and_utc() + Duration::days(1),
        },
        _ => period,
    }
}

/// Run one subcommand against the configured database.
pub async fn run(command: Commands, config: &CallwardenConfig) -> Result<(), CallwardenError> {
    let db = Database::from_config(&config.storage).await?;
    let settings = config.governor.resolve();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    debug!(
        database = %config.storage.database_path,
        default_limit = settings.default_limit,
        "services ready"
    );

    let gate = CallGate::new(db.clone(), settings, clock.clone());
    let result = execute(command, &gate, &Reporter::new(db.clone(), settings, clock)).await;
    db.close().await?;
    result
}

async fn execute(
    command: Commands,
    gate: &CallGate,
    reporter: &Reporter,
) -> Result<(), CallwardenError> {
    match command {
        Commands::Check { key, output } => {
            let decision = gate.authorize(&key.to_key()?).await?;
            render::decision(&decision, output)
        }
        Commands::RecordCall {
            key,
            contact_name,
            output,
        } => {
            let placed = gate.placed(&key.to_key()?, contact_name).await?;
            render::placed(&placed, output)
        }
        Commands::Outcome {
            key,
            outcome,
            duration,
            output,
        } => {
            let done = gate.completed(&key.to_key()?, outcome, duration).await?;
            render::completed(&done, output)
        }
        Commands::MarkWarning { key, output } => {
            let record = gate.quality().mark_warning_sent(&key.to_key()?).await?;
            render::quality_record(&record, output)
        }
        Commands::ResetWarning { key, output } => {
            let record = gate.quality().reset_warning(&key.to_key()?).await?;
            render::quality_record(&record, output)
        }
        Commands::SetLimit { key, limit, output } => {
            let record = gate.rate().set_limit(&key.to_key()?, limit).await?;
            render::rate_record(&record, output)
        }
        Commands::ResetWindow { key, output } => {
            let record = gate.rate().reset_window(&key.to_key()?).await?;
            render::rate_record(&record, output)
        }
        Commands::Dashboard { owner, output } => {
            let dashboard = reporter.dashboard(owner.trim()).await?;
            render::dashboard(&dashboard, output)
        }
        Commands::Report {
            owner,
            period,
            from,
            to,
            output,
        } => {
            let summary = reporter
                .summarize(owner.trim(), resolve_period(period, from, to))
                .await?;
            render::summary(&summary, output)
        }
    }
}
