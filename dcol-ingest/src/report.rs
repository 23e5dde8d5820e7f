//! Snapshot reports, tabular export and console rendering
//!
//! Thin writers over [`ProgressReport`] and metadata snapshots. Files are
//! written atomically so a crashed export never leaves a half-written file.
//! Each saved snapshot carries its delta against the latest earlier snapshot
//! in the same directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use dcol_common::time::{file_stamp, hours_between};
use dcol_common::Result;

use crate::models::conversation::{AGENT_ROLE, CUSTOMER_ROLE};
use crate::models::{ConversationRecord, HourlyBucket, ProgressReport, UnitSummary};
use crate::reconcile::ReconciliationReport;

const PROGRESS_BAR_WIDTH: usize = 40;
const REPORT_PREFIX: &str = "storage_report_";

pub const CSV_HEADER: [&str; 11] = [
    "conversation_id",
    "timestamp",
    "agent_filepath",
    "agent_size_bytes",
    "agent_duration_seconds",
    "customer_filepath",
    "customer_size_bytes",
    "customer_duration_seconds",
    "total_size_bytes",
    "total_duration_seconds",
    "total_duration_hours",
];

/// Movement since the previous snapshot
///
/// With no earlier snapshot the whole collection counts as new and no time
/// has elapsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangesSinceLast {
    pub new_conversations: i64,
    pub new_duration_hours: f64,
    pub new_size_bytes: i64,
    pub hours_since_last_report: f64,
    pub previous_report: Option<PathBuf>,
}

/// Document written by [`save_report`]
#[derive(Debug, Serialize)]
pub struct SnapshotReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub report: &'a ProgressReport,
    pub hourly_breakdown: &'a BTreeMap<String, HourlyBucket>,
    pub changes_since_last: &'a ChangesSinceLast,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<&'a ReconciliationReport>,
}

/// Where [`save_report`] wrote and what changed since the snapshot before it
#[derive(Debug, Clone)]
pub struct SavedReport {
    pub path: PathBuf,
    pub changes_since_last: ChangesSinceLast,
}

/// Fields read back from an earlier snapshot
#[derive(Debug, Deserialize)]
struct PreviousSnapshot {
    generated_at: DateTime<Utc>,
    report: PreviousTotals,
}

#[derive(Debug, Deserialize)]
struct PreviousTotals {
    total_conversations: u64,
    total_duration_hours: f64,
    total_size_bytes: u64,
}

/// Write `storage_report_{YYYYMMDD_HHMMSS}.json` under `dir`
pub fn save_report(
    dir: &Path,
    report: &ProgressReport,
    hourly_breakdown: &BTreeMap<String, HourlyBucket>,
    reconciliation: Option<&ReconciliationReport>,
) -> Result<SavedReport> {
    let generated_at = dcol_common::time::now();
    let previous = latest_snapshot(dir);
    let changes_since_last = changes_since(report, previous.as_ref(), &generated_at);

    let snapshot = SnapshotReport {
        generated_at,
        report,
        hourly_breakdown,
        changes_since_last: &changes_since_last,
        reconciliation,
    };

    let bytes = serde_json::to_vec_pretty(&snapshot)
        .map_err(|e| dcol_common::Error::Internal(format!("Serialize report failed: {}", e)))?;

    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}{}.json", REPORT_PREFIX, file_stamp(&generated_at)));
    write_atomic(&path, &bytes)?;

    info!(
        new_conversations = changes_since_last.new_conversations,
        "Report saved: {}",
        path.display()
    );
    Ok(SavedReport {
        path,
        changes_since_last,
    })
}

fn changes_since(
    report: &ProgressReport,
    previous: Option<&(PathBuf, PreviousSnapshot)>,
    now: &DateTime<Utc>,
) -> ChangesSinceLast {
    let current_conversations = report.total_conversations as i64;
    let current_size = report.total_size_bytes as i64;

    match previous {
        Some((path, snapshot)) => ChangesSinceLast {
            new_conversations: current_conversations - snapshot.report.total_conversations as i64,
            new_duration_hours: report.total_duration_hours
                - snapshot.report.total_duration_hours,
            new_size_bytes: current_size - snapshot.report.total_size_bytes as i64,
            hours_since_last_report: hours_between(&snapshot.generated_at, now),
            previous_report: Some(path.clone()),
        },
        None => ChangesSinceLast {
            new_conversations: current_conversations,
            new_duration_hours: report.total_duration_hours,
            new_size_bytes: current_size,
            hours_since_last_report: 0.0,
            previous_report: None,
        },
    }
}

/// Latest `storage_report_*.json` under `dir` by name
///
/// Names sort chronologically. An unreadable latest snapshot counts as none.
fn latest_snapshot(dir: &Path) -> Option<(PathBuf, PreviousSnapshot)> {
    if !dir.is_dir() {
        return None;
    }

    let path = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy())
                .is_some_and(|name| name.starts_with(REPORT_PREFIX) && name.ends_with(".json"))
        })
        .max()?;

    let parsed = std::fs::read(&path)
        .map_err(|e| e.to_string())
        .and_then(|bytes| serde_json::from_slice::<PreviousSnapshot>(&bytes).map_err(|e| e.to_string()));

    match parsed {
        Ok(snapshot) => Some((path, snapshot)),
        Err(e) => {
            warn!("Ignoring previous report {}: {}", path.display(), e);
            None
        }
    }
}

/// Console lines for [`ChangesSinceLast`]
pub fn render_changes(changes: &ChangesSinceLast) -> String {
    match &changes.previous_report {
        Some(previous) => format!(
            "Since {} ({:.1} hours ago): {:+} conversations, {:+.2} hours, {:+.2} MB",
            previous.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
            changes.hours_since_last_report,
            changes.new_conversations,
            changes.new_duration_hours,
            changes.new_size_bytes as f64 / (1024.0 * 1024.0)
        ),
        None => format!(
            "First report: {} conversations, {:.2} hours, {:.2} MB",
            changes.new_conversations,
            changes.new_duration_hours,
            changes.new_size_bytes as f64 / (1024.0 * 1024.0)
        ),
    }
}

/// Write one CSV row per conversation
pub fn export_csv(records: &[ConversationRecord], path: &Path) -> Result<()> {
    let mut out = String::new();
    push_row(&mut out, CSV_HEADER.iter().map(|s| s.to_string()));

    for record in records {
        let mut row = vec![record.conversation_id.clone(), record.timestamp.to_rfc3339()];
        row.extend(unit_columns(record.unit(AGENT_ROLE)));
        row.extend(unit_columns(record.unit(CUSTOMER_ROLE)));
        row.push(record.totals.size_bytes.to_string());
        row.push(record.totals.duration_seconds.to_string());
        row.push(format!("{:.4}", record.totals.duration_hours()));
        push_row(&mut out, row);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_atomic(path, out.as_bytes())?;

    info!(rows = records.len(), "CSV exported: {}", path.display());
    Ok(())
}

fn unit_columns(unit: Option<&UnitSummary>) -> [String; 3] {
    match unit {
        Some(unit) => [
            unit.file_path.display().to_string(),
            unit.size_bytes.to_string(),
            unit.duration_seconds.to_string(),
        ],
        None => [String::new(), String::new(), String::new()],
    }
}

fn push_row(out: &mut String, fields: impl IntoIterator<Item = String>) {
    let line: Vec<String> = fields.into_iter().map(|f| csv_field(&f)).collect();
    out.push_str(&line.join(","));
    out.push_str("\r\n");
}

/// Quote a field when it contains a delimiter, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| dcol_common::Error::Io(e.error))?;
    Ok(())
}

/// `[████░░░░]` with [`PROGRESS_BAR_WIDTH`] cells
pub fn progress_bar(percentage: f64) -> String {
    let clamped = if percentage.is_finite() {
        percentage.clamp(0.0, 100.0)
    } else {
        0.0
    };
    let filled = ((clamped / 100.0) * PROGRESS_BAR_WIDTH as f64).round() as usize;
    format!(
        "[{}{}]",
        "█".repeat(filled),
        "░".repeat(PROGRESS_BAR_WIDTH - filled)
    )
}

/// Console summary printed by `dcol-analyze`
pub fn render_text_report(report: &ProgressReport) -> String {
    let rule = "=".repeat(60);
    let mut lines = vec![
        rule.clone(),
        "DIARIZATION AUDIO COLLECTION PROGRESS".to_string(),
        rule.clone(),
        format!("Target:              {:.2} hours", report.target_hours),
        format!(
            "Collected:           {:.2} hours ({:.0} s)",
            report.total_duration_hours, report.total_duration_seconds
        ),
        format!("Conversations:       {}", report.total_conversations),
        format!("Storage:             {:.2} MB", report.total_size_mb()),
        format!(
            "Average duration:    {:.1} min per conversation",
            report.average_duration_per_conversation / 60.0
        ),
        format!(
            "Remaining:           {:.2} hours (~{} conversations)",
            report.remaining_hours, report.estimated_conversations_needed
        ),
        format!(
            "Collection rate:     {:.2} conversations/hour, {:.2} audio hours/hour",
            report.collection_rate, report.audio_collection_rate
        ),
    ];

    if let (Some(first), Some(last)) = (report.first_timestamp, report.last_timestamp) {
        lines.push(format!(
            "Period:              {} to {}",
            first.format("%Y-%m-%d %H:%M:%S"),
            last.format("%Y-%m-%d %H:%M:%S")
        ));
    }

    if !report.by_role.is_empty() {
        lines.push(String::new());
        lines.push("By speaker:".to_string());
        for (role, breakdown) in &report.by_role {
            lines.push(format!(
                "  {:<12} {:>6} files {:>10.2} hours {:>10.2} MB",
                role,
                breakdown.units,
                breakdown.duration_seconds / 3600.0,
                breakdown.size_bytes as f64 / (1024.0 * 1024.0)
            ));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Progress: {} {:.1}%",
        progress_bar(report.progress_percentage),
        report.progress_percentage
    ));
    lines.push(if report.target_reached {
        "Status: TARGET REACHED".to_string()
    } else {
        "Status: in progress".to_string()
    });
    lines.push(rule);

    lines.join("\n")
}
