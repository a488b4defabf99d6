//! Incident model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::matcher::coordinate_key;
use crate::models::{CompanyId, UserId};

/// Relational-store identifier for an incident (auto-increment)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncidentId(pub i64);

impl IncidentId {
    /// Get the raw integer value
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IncidentId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// A reported road defect.
///
/// Identity is dual: the relational integer id plus an optional
/// document-store string id (`doc_id`, the cross-store link). A single
/// logical incident has at most one representation in each store; the sync
/// engine keeps linked representations converged on
/// surface/budget/status/company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Relational identifier
    pub id: IncidentId,
    /// Document-store counterpart id, when linked
    pub doc_id: Option<String>,
    /// Damaged surface area in square meters (>= 0)
    pub surface: f64,
    /// Estimated remediation budget (>= 0)
    pub budget: f64,
    /// Latitude of the defect (duplicate-detection key)
    pub latitude: f64,
    /// Longitude of the defect (duplicate-detection key)
    pub longitude: f64,
    /// Assigned remediation company, if any
    pub company_id: Option<CompanyId>,
    /// Reporting user, if known
    pub user_id: Option<UserId>,
    /// Creation timestamp (Unix ms); absent for records synced from
    /// documents that carry no timestamp
    pub created_at: Option<i64>,
}

impl Incident {
    /// Normalized coordinate key used for duplicate detection.
    ///
    /// `None` when the position is unset (zero or non-finite coordinates);
    /// such records are never matched by position.
    #[must_use]
    pub fn coordinate_key(&self) -> Option<String> {
        coordinate_key(self.latitude, self.longitude)
    }
}

/// Fields for an incident not yet persisted to the relational store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IncidentDraft {
    /// Document-store counterpart id, when the draft comes from a sync pass
    pub doc_id: Option<String>,
    /// Damaged surface area in square meters
    pub surface: f64,
    /// Estimated remediation budget
    pub budget: f64,
    /// Latitude of the defect
    pub latitude: f64,
    /// Longitude of the defect
    pub longitude: f64,
    /// Assigned remediation company, if any
    pub company_id: Option<CompanyId>,
    /// Reporting user, if known
    pub user_id: Option<UserId>,
    /// Creation timestamp (Unix ms), if known
    pub created_at: Option<i64>,
}

impl IncidentDraft {
    /// Validate draft invariants before insertion.
    pub fn validate(&self) -> Result<()> {
        if self.surface < 0.0 || !self.surface.is_finite() {
            return Err(Error::InvalidInput(format!(
                "surface must be a non-negative number, got {}",
                self.surface
            )));
        }
        if self.budget < 0.0 || !self.budget.is_finite() {
            return Err(Error::InvalidInput(format!(
                "budget must be a non-negative number, got {}",
                self.budget
            )));
        }
        Ok(())
    }
}
