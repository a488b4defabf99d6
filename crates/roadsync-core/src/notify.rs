//! Notification side effect for observed status changes
//!
//! A best-effort, at-most-once side channel: when a status update is
//! observed, a user-facing message is recorded for the reporter. The write
//! runs as a detached task with its own error boundary — a delivery failure
//! is logged and dropped, never surfaced to the caller of the primary
//! status update. No retry, no durability beyond the store write.

use libsql::Connection;
use tokio::task::JoinHandle;

use crate::db::{LibSqlNotificationRepository, NotificationRepository};
use crate::error::Result;
use crate::models::{IncidentId, Notification, NotificationDraft, Status, UserId};
use crate::util::unix_timestamp_ms_now;

/// Render the user-facing message for a status change.
#[must_use]
pub fn render_message(incident_id: IncidentId, old: Status, new: Status) -> String {
    format!(
        "Le signalement n°{incident_id} est passé de « {} » à « {} »",
        old.label(),
        new.label()
    )
}

/// Write one notification row.
///
/// Split out from [`on_status_observed`] so the write path stays testable
/// without a spawned task.
pub async fn deliver(conn: &Connection, draft: &NotificationDraft) -> Result<Notification> {
    LibSqlNotificationRepository::new(conn).insert(draft).await
}

/// React to an observed status transition.
///
/// Returns `None` without doing anything when the transition is a no-op
/// (`old == new`). Otherwise dispatches a detached delivery task and
/// returns its handle; the caller is free to drop it. The task logs
/// failures and never panics the caller.
pub fn on_status_observed(
    conn: Connection,
    incident_id: IncidentId,
    recipient: UserId,
    old: Status,
    new: Status,
) -> Option<JoinHandle<()>> {
    if old == new {
        return None;
    }

    let draft = NotificationDraft {
        incident_id,
        user_id: recipient,
        old_status: old,
        new_status: new,
        message: render_message(incident_id, old, new),
        created_at: unix_timestamp_ms_now(),
    };

    Some(tokio::spawn(async move {
        if let Err(error) = deliver(&conn, &draft).await {
            tracing::warn!(
                incident = %incident_id,
                recipient = %recipient,
                %error,
                "notification delivery failed; dropping"
            );
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup() -> (Database, IncidentId, UserId) {
        use crate::db::{
            IncidentRepository, LibSqlIncidentRepository, LibSqlUserRepository, UserRepository,
        };
        use crate::models::{IncidentDraft, Role};

        let db = Database::open_in_memory().await.unwrap();
        let user = LibSqlUserRepository::new(db.connection())
            .create("rakoto@example.mg", "Rakoto", Role::Citizen)
            .await
            .unwrap();
        let incident = LibSqlIncidentRepository::new(db.connection())
            .create(&IncidentDraft {
                surface: 10.0,
                budget: 1_000.0,
                latitude: -18.8792,
                longitude: 47.5079,
                user_id: Some(user.id),
                created_at: Some(1_700_000_000_000),
                ..IncidentDraft::default()
            })
            .await
            .unwrap();
        (db, incident.id, user.id)
    }

    #[test]
    fn test_render_message_uses_labels() {
        let message = render_message(IncidentId(7), Status::Nouveau, Status::EnCours);
        assert_eq!(
            message,
            "Le signalement n°7 est passé de « Nouveau » à « En cours »"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_no_op_transition_is_skipped() {
        let (db, incident_id, user_id) = setup().await;
        let handle = on_status_observed(
            db.connection().clone(),
            incident_id,
            user_id,
            Status::EnCours,
            Status::EnCours,
        );
        assert!(handle.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dispatch_records_notification() {
        let (db, incident_id, user_id) = setup().await;

        let handle = on_status_observed(
            db.connection().clone(),
            incident_id,
            user_id,
            Status::Nouveau,
            Status::EnCours,
        )
        .unwrap();
        handle.await.unwrap();

        let notifications = LibSqlNotificationRepository::new(db.connection())
            .list_for_user(user_id)
            .await
            .unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].new_status, Status::EnCours);
        assert!(!notifications[0].is_read);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delivery_failure_is_contained() {
        let (db, incident_id, user_id) = setup().await;

        // Force the write to fail.
        db.connection()
            .execute("DROP TABLE notifications", ())
            .await
            .unwrap();

        let handle = on_status_observed(
            db.connection().clone(),
            incident_id,
            user_id,
            Status::Nouveau,
            Status::Termine,
        )
        .unwrap();
        // The task swallows the error; awaiting it must not panic.
        handle.await.unwrap();
    }
}
