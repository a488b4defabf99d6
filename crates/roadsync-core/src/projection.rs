//! Progress projection: the read-side view derived from the status ledger
//!
//! Pure and I/O-free. Recomputed on every read path that exposes incident
//! status — never cached, since the ledger can be appended concurrently
//! with no invalidation signal.

use serde::{Deserialize, Serialize};

use crate::models::{Incident, Status, StatusEntry};

const MS_PER_DAY: i64 = 86_400_000;
const MS_PER_HOUR: i64 = 3_600_000;

/// Elapsed time between creation and completion, split for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionDuration {
    /// Whole days elapsed
    pub days: i64,
    /// Remaining whole hours
    pub hours: i64,
}

impl CompletionDuration {
    fn from_ms(elapsed_ms: i64) -> Self {
        let elapsed_ms = elapsed_ms.max(0);
        Self {
            days: elapsed_ms / MS_PER_DAY,
            hours: (elapsed_ms % MS_PER_DAY) / MS_PER_HOUR,
        }
    }
}

/// API-facing progress representation of an incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressView {
    /// Current status code
    pub status: Status,
    /// Display label for the status
    pub label: String,
    /// Derived progress percentage (0, 50 or 100)
    pub percentage: u8,
    /// Creation timestamp (Unix ms), if known
    pub started_at: Option<i64>,
    /// Timestamp of the most recent activity (latest entry, else creation)
    pub last_update: Option<i64>,
    /// Completion timestamp; set only when the current status is `termine`
    pub completed_at: Option<i64>,
    /// Elapsed creation-to-completion time; requires both timestamps
    pub duration: Option<CompletionDuration>,
}

/// Compute the progress view for an incident and its latest ledger entry.
///
/// With no entry the incident is in the implicit `nouveau` state at 0%.
/// `completed_at` is the latest entry's timestamp iff that entry is
/// `termine`; `duration` additionally requires a creation timestamp and is
/// never negative.
#[must_use]
pub fn project(incident: &Incident, latest_entry: Option<&StatusEntry>) -> ProgressView {
    let status = latest_entry.map_or(Status::Nouveau, |entry| entry.status);

    let completed_at = match latest_entry {
        Some(entry) if entry.status == Status::Termine => Some(entry.recorded_at),
        _ => None,
    };

    let duration = match (incident.created_at, completed_at) {
        (Some(created_at), Some(completed_at)) => {
            Some(CompletionDuration::from_ms(completed_at - created_at))
        }
        _ => None,
    };

    ProgressView {
        status,
        label: status.label().to_string(),
        percentage: status.percentage(),
        started_at: incident.created_at,
        last_update: latest_entry
            .map(|entry| entry.recorded_at)
            .or(incident.created_at),
        completed_at,
        duration,
    }
}
