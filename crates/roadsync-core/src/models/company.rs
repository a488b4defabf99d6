//! Company reference model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Relational identifier for a remediation company
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyId(pub i64);

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A remediation company assignable to incidents.
///
/// Created on demand by the sync engine when a document record carries a
/// company name with no existing match (case-insensitive on name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Relational identifier
    pub id: CompanyId,
    /// Company display name (unique, case-insensitive)
    pub name: String,
}
