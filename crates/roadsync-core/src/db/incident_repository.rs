//! Incident repository implementation

use libsql::{Connection, Row, Value};

use crate::error::{Error, Result};
use crate::matcher::coordinate_key;
use crate::models::{CompanyId, Incident, IncidentDraft, IncidentId, UserId};

/// Synced field subset written by the sync engine on matched records.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncedFields {
    /// Damaged surface area
    pub surface: f64,
    /// Estimated remediation budget
    pub budget: f64,
    /// Assigned remediation company, if any
    pub company_id: Option<CompanyId>,
}

/// Trait for incident storage operations (async)
#[allow(async_fn_in_trait)]
pub trait IncidentRepository {
    /// Insert a new incident, returning it with its generated id
    async fn create(&self, draft: &IncidentDraft) -> Result<Incident>;

    /// Get an incident by id
    async fn get(&self, id: IncidentId) -> Result<Option<Incident>>;

    /// List all incidents, newest first
    async fn list(&self) -> Result<Vec<Incident>>;

    /// Overwrite the sync-managed fields of an incident
    async fn update_synced_fields(&self, id: IncidentId, fields: &SyncedFields) -> Result<()>;

    /// Find the incident linked to a document-store id
    async fn find_by_doc_id(&self, doc_id: &str) -> Result<Option<Incident>>;

    /// Find incidents whose normalized coordinate key matches
    async fn find_by_coordinate_key(&self, key: &str) -> Result<Vec<Incident>>;

    /// Record the document-store counterpart id of an incident
    async fn link_doc_id(&self, id: IncidentId, doc_id: &str) -> Result<()>;
}

/// libSQL implementation of `IncidentRepository`
pub struct LibSqlIncidentRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlIncidentRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    const SELECT_COLUMNS: &'static str =
        "id, doc_id, surface, budget, latitude, longitude, company_id, user_id, created_at";

    /// Parse an incident from a database row
    fn parse_incident(row: &Row) -> Result<Incident> {
        Ok(Incident {
            id: IncidentId(row.get(0)?),
            doc_id: opt_text(row, 1)?,
            surface: row.get(2)?,
            budget: row.get(3)?,
            latitude: row.get(4)?,
            longitude: row.get(5)?,
            company_id: opt_i64(row, 6)?.map(CompanyId),
            user_id: opt_i64(row, 7)?.map(UserId),
            created_at: opt_i64(row, 8)?,
        })
    }

    async fn query_incidents(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Incident>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut incidents = Vec::new();
        while let Some(row) = rows.next().await? {
            incidents.push(Self::parse_incident(&row)?);
        }
        Ok(incidents)
    }
}

impl IncidentRepository for LibSqlIncidentRepository<'_> {
    async fn create(&self, draft: &IncidentDraft) -> Result<Incident> {
        draft.validate()?;

        let coord_key = coordinate_key(draft.latitude, draft.longitude);
        self.conn
            .execute(
                "INSERT INTO incidents
                    (doc_id, surface, budget, latitude, longitude, coord_key,
                     company_id, user_id, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    null_or_text(draft.doc_id.as_deref()),
                    draft.surface,
                    draft.budget,
                    draft.latitude,
                    draft.longitude,
                    null_or_text(coord_key.as_deref()),
                    null_or_int(draft.company_id.map(|c| c.0)),
                    null_or_int(draft.user_id.map(|u| u.0)),
                    null_or_int(draft.created_at),
                ),
            )
            .await?;

        let id = IncidentId(self.conn.last_insert_rowid());
        self.get(id)
            .await?
            .ok_or_else(|| Error::Database(format!("inserted incident {id} not readable back")))
    }

    async fn get(&self, id: IncidentId) -> Result<Option<Incident>> {
        let sql = format!(
            "SELECT {} FROM incidents WHERE id = ?",
            Self::SELECT_COLUMNS
        );
        let mut rows = self.conn.query(&sql, [id.as_i64()]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_incident(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Incident>> {
        let sql = format!(
            "SELECT {} FROM incidents ORDER BY created_at DESC, id DESC",
            Self::SELECT_COLUMNS
        );
        self.query_incidents(&sql, ()).await
    }

    async fn update_synced_fields(&self, id: IncidentId, fields: &SyncedFields) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE incidents SET surface = ?, budget = ?, company_id = ? WHERE id = ?",
                (
                    fields.surface,
                    fields.budget,
                    null_or_int(fields.company_id.map(|c| c.0)),
                    id.as_i64(),
                ),
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("incident {id}")));
        }
        Ok(())
    }

    async fn find_by_doc_id(&self, doc_id: &str) -> Result<Option<Incident>> {
        let sql = format!(
            "SELECT {} FROM incidents WHERE doc_id = ?",
            Self::SELECT_COLUMNS
        );
        let mut rows = self.conn.query(&sql, [doc_id]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_incident(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_by_coordinate_key(&self, key: &str) -> Result<Vec<Incident>> {
        let sql = format!(
            "SELECT {} FROM incidents WHERE coord_key = ?",
            Self::SELECT_COLUMNS
        );
        self.query_incidents(&sql, [key]).await
    }

    async fn link_doc_id(&self, id: IncidentId, doc_id: &str) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE incidents SET doc_id = ? WHERE id = ?",
                (doc_id, id.as_i64()),
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("incident {id}")));
        }
        Ok(())
    }
}

/// Read a nullable TEXT column
pub(crate) fn opt_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Text(text) => Ok(Some(text)),
        other => Err(Error::Database(format!(
            "expected text or null at column {idx}, got {other:?}"
        ))),
    }
}

/// Read a nullable INTEGER column
pub(crate) fn opt_i64(row: &Row, idx: i32) -> Result<Option<i64>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Integer(value) => Ok(Some(value)),
        other => Err(Error::Database(format!(
            "expected integer or null at column {idx}, got {other:?}"
        ))),
    }
}

/// Bind an optional text parameter
pub(crate) fn null_or_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

/// Bind an optional integer parameter
pub(crate) fn null_or_int(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn draft(latitude: f64, longitude: f64) -> IncidentDraft {
        IncidentDraft {
            surface: 12.5,
            budget: 30_000.0,
            latitude,
            longitude,
            created_at: Some(1_700_000_000_000),
            ..IncidentDraft::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_and_get() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlIncidentRepository::new(db.connection());

        let incident = repo.create(&draft(-18.8792, 47.5079)).await.unwrap();
        assert!(incident.id.as_i64() > 0);
        assert!(incident.doc_id.is_none());

        let fetched = repo.get(incident.id).await.unwrap().unwrap();
        assert_eq!(fetched, incident);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_missing_returns_none() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlIncidentRepository::new(db.connection());

        assert!(repo.get(IncidentId(999)).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_rejects_negative_surface() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlIncidentRepository::new(db.connection());

        let mut bad = draft(-18.8792, 47.5079);
        bad.surface = -3.0;
        assert!(repo.create(&bad).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_find_by_coordinate_key() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlIncidentRepository::new(db.connection());

        let incident = repo.create(&draft(-18.8792, 47.5079)).await.unwrap();
        let key = incident.coordinate_key().unwrap();

        let found = repo.find_by_coordinate_key(&key).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, incident.id);

        let none = repo.find_by_coordinate_key("0.00000:1.00000").await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_link_and_find_by_doc_id() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlIncidentRepository::new(db.connection());

        let incident = repo.create(&draft(-18.8792, 47.5079)).await.unwrap();
        repo.link_doc_id(incident.id, "fire-abc123").await.unwrap();

        let linked = repo.find_by_doc_id("fire-abc123").await.unwrap().unwrap();
        assert_eq!(linked.id, incident.id);
        assert_eq!(linked.doc_id.as_deref(), Some("fire-abc123"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_synced_fields() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlIncidentRepository::new(db.connection());

        let incident = repo.create(&draft(-18.8792, 47.5079)).await.unwrap();
        repo.update_synced_fields(
            incident.id,
            &SyncedFields {
                surface: 20.0,
                budget: 45_000.0,
                company_id: None,
            },
        )
        .await
        .unwrap();

        let updated = repo.get(incident.id).await.unwrap().unwrap();
        assert_eq!(updated.surface, 20.0);
        assert_eq!(updated.budget, 45_000.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_duplicate_coordinate_key_rejected_by_store() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlIncidentRepository::new(db.connection());

        repo.create(&draft(-18.8792, 47.5079)).await.unwrap();
        // Same normalized position loses the race at the unique index.
        assert!(repo.create(&draft(-18.8792, 47.5079)).await.is_err());
    }
}
