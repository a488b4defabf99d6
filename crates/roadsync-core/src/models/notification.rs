//! Notification model

use serde::{Deserialize, Serialize};

use crate::models::{IncidentId, Status, UserId};

/// A user-facing message recorded when a status change is observed.
///
/// Owned by the recipient; mutated only via the read flag, never updated
/// otherwise. Delivery is best-effort: a failed write is logged and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification row identifier
    pub id: i64,
    /// Incident whose status changed
    pub incident_id: IncidentId,
    /// Recipient user
    pub user_id: UserId,
    /// Status before the transition
    pub old_status: Status,
    /// Status after the transition
    pub new_status: Status,
    /// Generated human-readable message
    pub message: String,
    /// Read flag (default false)
    pub is_read: bool,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

/// A notification not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    /// Incident whose status changed
    pub incident_id: IncidentId,
    /// Recipient user
    pub user_id: UserId,
    /// Status before the transition
    pub old_status: Status,
    /// Status after the transition
    pub new_status: Status,
    /// Generated human-readable message
    pub message: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}
