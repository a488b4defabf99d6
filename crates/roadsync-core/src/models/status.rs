//! Status enumeration and ledger entry model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::models::IncidentId;

/// Remediation status of an incident.
///
/// The enumeration is closed: every status code persisted anywhere in the
/// system is one of these three values. Progress percentages are derived
/// from the status, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Reported, no work started (0%)
    Nouveau,
    /// Remediation underway (50%)
    EnCours,
    /// Remediation finished (100%)
    Termine,
}

impl Status {
    /// All members, in lifecycle order.
    pub const ALL: [Self; 3] = [Self::Nouveau, Self::EnCours, Self::Termine];

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Nouveau => "nouveau",
            Self::EnCours => "en_cours",
            Self::Termine => "termine",
        }
    }

    /// Human-readable display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Nouveau => "Nouveau",
            Self::EnCours => "En cours",
            Self::Termine => "Terminé",
        }
    }

    /// Progress percentage for this status.
    #[must_use]
    pub const fn percentage(self) -> u8 {
        match self {
            Self::Nouveau => 0,
            Self::EnCours => 50,
            Self::Termine => 100,
        }
    }

    /// Map a percentage back to a status.
    ///
    /// Total over all real inputs: `p <= 0` is [`Status::Nouveau`],
    /// `p >= 100` is [`Status::Termine`], anything in between is
    /// [`Status::EnCours`]. Not an exact inverse of [`Status::percentage`]
    /// at the boundaries: every value in (0, 100) maps to `EnCours`, while
    /// `EnCours` maps to exactly 50.
    #[must_use]
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage <= 0.0 {
            Self::Nouveau
        } else if percentage >= 100.0 {
            Self::Termine
        } else {
            Self::EnCours
        }
    }

    /// Comma-separated list of valid codes, for error messages.
    #[must_use]
    pub fn valid_codes() -> String {
        Self::ALL
            .iter()
            .map(|status| status.code())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nouveau" => Ok(Self::Nouveau),
            "en_cours" => Ok(Self::EnCours),
            "termine" => Ok(Self::Termine),
            other => Err(Error::InvalidStatus {
                code: other.to_string(),
                valid: Self::valid_codes(),
            }),
        }
    }
}

/// Immutable status-transition record.
///
/// Rows are append-only: status changes are recorded by insertion, never by
/// mutation of prior rows, preserving the full history for duration
/// analytics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    /// Ledger row identifier (monotonic, used as timestamp tie-break)
    pub id: i64,
    /// Incident this transition belongs to
    pub incident_id: IncidentId,
    /// Status recorded by this transition
    pub status: Status,
    /// Transition timestamp (Unix ms)
    pub recorded_at: i64,
}
