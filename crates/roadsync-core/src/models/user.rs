//! User reference model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Relational identifier for a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role attached to an authenticated session.
///
/// Supplied by the auth collaborator; the core trusts it as already
/// verified and only uses it to gate sync-triggering operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Can trigger sync passes and manage incidents
    Manager,
    /// Ordinary reporting user
    Citizen,
}

/// A reporting or managing user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Relational identifier
    pub id: UserId,
    /// Login email (unique, used to match document-store reporter refs)
    pub email: String,
    /// Display name
    pub name: String,
    /// Session role
    pub role: Role,
}
