// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal and JSON output for subcommand results.
//!
//! `--json` prints pretty JSON for scripting. Otherwise a short table is
//! printed, colored unless `--plain` is passed or stdout is not a TTY.

use std::io::IsTerminal;

use callwarden_core::{CallwardenError, QualityRecord, QualityStatus, RateLimitRecord};
use callwarden_governor::report::QualityDistribution;
use callwarden_governor::{CallDecision, CallSummary, CompletedCall, Dashboard, PlacedCall};
use colored::Colorize;
use serde::Serialize;

use crate::OutputArgs;

/// Format seconds as a compact duration such as `3h 12m`.
pub fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CallwardenError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CallwardenError::Internal(format!("failed to serialize output: {e}")))?;
    println!("{text}");
    Ok(())
}

fn use_color(output: OutputArgs) -> bool {
    !output.plain && std::io::stdout().is_terminal()
}

fn header(title: &str) {
    println!();
    println!("  callwarden {title}");
    println!("  {}", "-".repeat(40));
}

fn status_label(status: QualityStatus, color: bool) -> String {
    let text = status.to_string();
    if !color {
        return text;
    }
    match status {
        QualityStatus::Excellent | QualityStatus::Good => text.green().to_string(),
        QualityStatus::Fair => text.yellow().to_string(),
        QualityStatus::Poor | QualityStatus::Critical => text.red().to_string(),
    }
}

fn usage_label(usage: u32, color: bool) -> String {
    let text = format!("{usage}%");
    if !color {
        return text;
    }
    match usage {
        0..=69 => text.green().to_string(),
        70..=99 => text.yellow().to_string(),
        _ => text.red().to_string(),
    }
}

fn verdict(ok: bool, ok_text: &str, fail_text: &str, color: bool) -> String {
    match (ok, color) {
        (true, true) => format!("{} {}", "✓".green(), ok_text.green()),
        (false, true) => format!("{} {}", "✗".red(), fail_text.red()),
        (true, false) => format!("[OK] {ok_text}"),
        (false, false) => format!("[FAIL] {fail_text}"),
    }
}

pub fn decision(decision: &CallDecision, output: OutputArgs) -> Result<(), CallwardenError> {
    if output.json {
        return print_json(decision);
    }
    let color = use_color(output);
    header("check");
    println!("    Number:     {}", decision.phone_number);
    println!(
        "    Decision:   {}",
        verdict(decision.allowed, "call allowed", "limit reached", color)
    );
    println!(
        "    Usage:      {}/{} ({})",
        decision.calls_in_window,
        decision.limit,
        usage_label(decision.usage_percentage, color)
    );
    println!("    Remaining:  {}", decision.remaining);
    println!(
        "    Resets in:  {}",
        format_duration(decision.time_until_reset_secs)
    );
    println!();
    Ok(())
}

pub fn placed(placed: &PlacedCall, output: OutputArgs) -> Result<(), CallwardenError> {
    let record = placed.outcome.record();
    if output.json {
        return print_json(&serde_json::json!({
            "counted": placed.outcome.is_recorded(),
            "record": record,
            "event": placed.event,
        }));
    }
    let color = use_color(output);
    header("record-call");
    println!("    Number:     {}", record.phone_number);
    println!(
        "    Counted:    {}",
        verdict(
            placed.outcome.is_recorded(),
            "yes",
            "no, number was already at its limit",
            color
        )
    );
    println!(
        "    Usage:      {}/{} ({})",
        record.calls_in_window,
        record.limit,
        usage_label(record.usage_percentage(), color)
    );
    println!("    Event:      {}", placed.event.id);
    println!();
    Ok(())
}

pub fn completed(done: &CompletedCall, output: OutputArgs) -> Result<(), CallwardenError> {
    if output.json {
        return print_json(&serde_json::json!({
            "quality": done.quality,
            "alert": done.alert,
            "event": done.event,
        }));
    }
    let color = use_color(output);
    header("outcome");
    print_quality_lines(&done.quality, color);
    if done.alert.needs_revocation {
        println!(
            "    Alert:      {}",
            verdict(false, "", "revoke calling permission", color)
        );
    } else if done.alert.needs_warning {
        println!(
            "    Alert:      {}",
            verdict(false, "", "send courtesy warning", color)
        );
    }
    println!();
    Ok(())
}

pub fn quality_record(record: &QualityRecord, output: OutputArgs) -> Result<(), CallwardenError> {
    if output.json {
        return print_json(record);
    }
    header("quality");
    print_quality_lines(record, use_color(output));
    println!();
    Ok(())
}

fn print_quality_lines(record: &QualityRecord, color: bool) {
    println!("    Number:     {}", record.phone_number);
    println!(
        "    Pickup:     {}% ({})",
        record.pickup_rate,
        status_label(record.quality_status(), color)
    );
    println!(
        "    Calls:      {} total, {} connected, {} missed, {} rejected, {} failed",
        record.total_calls,
        record.connected_calls,
        record.missed_calls,
        record.rejected_calls,
        record.failed_calls
    );
    println!("    Miss run:   {}", record.consecutive_missed);
    println!(
        "    Warning:    {}",
        if record.warning_sent { "sent" } else { "not sent" }
    );
}

pub fn rate_record(record: &RateLimitRecord, output: OutputArgs) -> Result<(), CallwardenError> {
    if output.json {
        return print_json(record);
    }
    let color = use_color(output);
    header("limit");
    println!("    Number:     {}", record.phone_number);
    println!(
        "    Usage:      {}/{} ({})",
        record.calls_in_window,
        record.limit,
        usage_label(record.usage_percentage(), color)
    );
    println!(
        "    Limited:    {}",
        if record.is_limited { "yes" } else { "no" }
    );
    if let Some(reset_at) = record.limit_reset_at {
        println!("    Resets at:  {}", reset_at.format("%Y-%m-%d %H:%M UTC"));
    }
    println!();
    Ok(())
}

pub fn dashboard(dashboard: &Dashboard, output: OutputArgs) -> Result<(), CallwardenError> {
    if output.json {
        return print_json(dashboard);
    }
    let color = use_color(output);
    let s = &dashboard.summary;
    header(&format!("dashboard ({})", dashboard.owner_id));
    println!(
        "    Numbers:    {} tracked, {} limited",
        s.tracked_numbers, s.limited_numbers
    );
    println!(
        "    Usage:      {}/{} ({})",
        s.calls_in_window,
        s.total_limit,
        usage_label(s.usage_percentage, color)
    );
    println!("    Pickup:     {}% average", s.average_pickup_rate);
    println!(
        "    Alerts:     {} warning, {} revocation",
        s.numbers_needing_warning, s.numbers_needing_revocation
    );

    if !dashboard.needs_attention.is_empty() {
        println!();
        println!("  Needs attention");
        for entry in &dashboard.needs_attention {
            println!(
                "    {:<18} {:>3}/{:<3} {:>6}  resets in {}",
                entry.phone_number,
                entry.calls_in_window,
                entry.limit,
                usage_label(entry.usage_percentage, color),
                format_duration(entry.time_until_reset_secs)
            );
        }
    }
    if !dashboard.most_active.is_empty() {
        println!();
        println!("  Most active");
        for entry in &dashboard.most_active {
            println!(
                "    {:<18} {:>5} calls  {:>3}% {}",
                entry.phone_number,
                entry.total_calls,
                entry.pickup_rate,
                status_label(entry.quality_status, color)
            );
        }
    }
    println!();
    Ok(())
}

pub fn summary(summary: &CallSummary, output: OutputArgs) -> Result<(), CallwardenError> {
    if output.json {
        return print_json(summary);
    }
    let color = use_color(output);
    header(&format!("report ({})", summary.owner_id));
    println!(
        "    Period:     {} to {}",
        summary.period_start.format("%Y-%m-%d"),
        summary.period_end.format("%Y-%m-%d")
    );
    println!(
        "    Calls:      {} total, {} connected, {} missed, {} rejected",
        summary.total, summary.connected, summary.missed, summary.rejected
    );
    if summary.in_progress > 0 {
        println!("    Open:       {} awaiting outcome", summary.in_progress);
    }
    println!("    Pickup:     {}%", summary.pickup_rate);
    println!(
        "    Avg talk:   {}",
        format_duration(i64::from(summary.avg_duration))
    );
    print_distribution(&summary.quality_distribution, color);

    if !summary.daily_breakdown.is_empty() {
        println!();
        println!("  Daily");
        for day in &summary.daily_breakdown {
            println!(
                "    {}  {:>4} total {:>4} connected {:>4} missed {:>4} rejected",
                day.date, day.total, day.connected, day.missed, day.rejected
            );
        }
    }
    if !summary.top_contacts.is_empty() {
        println!();
        println!("  Top contacts");
        for contact in &summary.top_contacts {
            println!(
                "    {:<18} {:<16} {:>4} calls {:>3}% pickup",
                contact.phone_number,
                contact.contact_name.as_deref().unwrap_or("-"),
                contact.total,
                contact.pickup_rate
            );
        }
    }
    println!();
    Ok(())
}

fn print_distribution(dist: &QualityDistribution, color: bool) {
    println!(
        "    Quality:    {} {}, {} {}, {} {}, {} {}, {} {}",
        dist.excellent,
        status_label(QualityStatus::Excellent, color),
        dist.good,
        status_label(QualityStatus::Good, color),
        dist.fair,
        status_label(QualityStatus::Fair, color),
        dist.poor,
        status_label(QualityStatus::Poor, color),
        dist.critical,
        status_label(QualityStatus::Critical, color),
    );
}
