//! Notification repository implementation

use std::str::FromStr;

use libsql::{Connection, Row};

use crate::error::{Error, Result};
use crate::models::{IncidentId, Notification, NotificationDraft, Status, UserId};

/// Trait for notification storage operations (async)
///
/// Notifications are written once and mutated only via the read flag.
#[allow(async_fn_in_trait)]
pub trait NotificationRepository {
    /// Insert a new notification
    async fn insert(&self, draft: &NotificationDraft) -> Result<Notification>;

    /// List a user's notifications, newest first
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Notification>>;

    /// Mark a notification as read
    async fn mark_read(&self, id: i64) -> Result<()>;
}

/// libSQL implementation of `NotificationRepository`
pub struct LibSqlNotificationRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlNotificationRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_notification(row: &Row) -> Result<Notification> {
        let old_status: String = row.get(3)?;
        let new_status: String = row.get(4)?;
        Ok(Notification {
            id: row.get(0)?,
            incident_id: IncidentId(row.get(1)?),
            user_id: UserId(row.get(2)?),
            old_status: Status::from_str(&old_status)?,
            new_status: Status::from_str(&new_status)?,
            message: row.get(5)?,
            is_read: row.get::<i32>(6)? != 0,
            created_at: row.get(7)?,
        })
    }
}

impl NotificationRepository for LibSqlNotificationRepository<'_> {
    async fn insert(&self, draft: &NotificationDraft) -> Result<Notification> {
        self.conn
            .execute(
                "INSERT INTO notifications
                    (incident_id, user_id, old_status, new_status, message, is_read, created_at)
                 VALUES (?, ?, ?, ?, ?, 0, ?)",
                (
                    draft.incident_id.as_i64(),
                    draft.user_id.0,
                    draft.old_status.code(),
                    draft.new_status.code(),
                    draft.message.as_str(),
                    draft.created_at,
                ),
            )
            .await?;

        Ok(Notification {
            id: self.conn.last_insert_rowid(),
            incident_id: draft.incident_id,
            user_id: draft.user_id,
            old_status: draft.old_status,
            new_status: draft.new_status,
            message: draft.message.clone(),
            is_read: false,
            created_at: draft.created_at,
        })
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Notification>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, incident_id, user_id, old_status, new_status,
                        message, is_read, created_at
                 FROM notifications
                 WHERE user_id = ?
                 ORDER BY created_at DESC, id DESC",
                [user_id.0],
            )
            .await?;

        let mut notifications = Vec::new();
        while let Some(row) = rows.next().await? {
            notifications.push(Self::parse_notification(&row)?);
        }
        Ok(notifications)
    }

    async fn mark_read(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("UPDATE notifications SET is_read = 1 WHERE id = ?", [id])
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("notification {id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        Database, IncidentRepository, LibSqlIncidentRepository, LibSqlUserRepository,
        UserRepository,
    };
    use crate::models::{IncidentDraft, Role};

    async fn setup() -> (Database, IncidentId, UserId) {
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

    #[tokio::test(flavor = "multi_thread")]
    async fn test_insert_and_list() {
        let (db, incident_id, user_id) = setup().await;
        let repo = LibSqlNotificationRepository::new(db.connection());

        let inserted = repo
            .insert(&NotificationDraft {
                incident_id,
                user_id,
                old_status: Status::Nouveau,
                new_status: Status::EnCours,
                message: "Les travaux ont commencé".to_string(),
                created_at: 1_700_000_100_000,
            })
            .await
            .unwrap();
        assert!(!inserted.is_read);

        let listed = repo.list_for_user(user_id).await.unwrap();
        assert_eq!(listed, vec![inserted]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mark_read() {
        let (db, incident_id, user_id) = setup().await;
        let repo = LibSqlNotificationRepository::new(db.connection());

        let inserted = repo
            .insert(&NotificationDraft {
                incident_id,
                user_id,
                old_status: Status::EnCours,
                new_status: Status::Termine,
                message: "Les travaux sont terminés".to_string(),
                created_at: 1_700_000_200_000,
            })
            .await
            .unwrap();

        repo.mark_read(inserted.id).await.unwrap();
        let listed = repo.list_for_user(user_id).await.unwrap();
        assert!(listed[0].is_read);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mark_read_missing_fails() {
        let (db, _, _) = setup().await;
        let repo = LibSqlNotificationRepository::new(db.connection());

        assert!(matches!(
            repo.mark_read(999).await,
            Err(Error::NotFound(_))
        ));
    }
}
