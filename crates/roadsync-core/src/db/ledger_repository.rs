//! Status ledger repository implementation

use std::str::FromStr;

use libsql::{Connection, Row};

use crate::error::{Error, Result};
use crate::models::{IncidentId, Status, StatusEntry};

/// Trait for status ledger storage operations (async)
///
/// The ledger is append-only: entries are inserted, never mutated or
/// deleted.
#[allow(async_fn_in_trait)]
pub trait LedgerRepository {
    /// Append a status transition, returning the inserted entry
    ///
    /// Fails with `NotFound` if the incident does not exist.
    async fn append(
        &self,
        incident_id: IncidentId,
        status: Status,
        recorded_at: i64,
    ) -> Result<StatusEntry>;

    /// Latest entry for an incident (max timestamp, ties broken by max id)
    async fn latest(&self, incident_id: IncidentId) -> Result<Option<StatusEntry>>;

    /// Full history for an incident, oldest first
    async fn entries(&self, incident_id: IncidentId) -> Result<Vec<StatusEntry>>;
}

/// libSQL implementation of `LedgerRepository`
pub struct LibSqlLedgerRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlLedgerRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a ledger entry from a database row
    fn parse_entry(row: &Row) -> Result<StatusEntry> {
        let status: String = row.get(2)?;
        Ok(StatusEntry {
            id: row.get(0)?,
            incident_id: IncidentId(row.get(1)?),
            status: Status::from_str(&status)?,
            recorded_at: row.get(3)?,
        })
    }

    async fn incident_exists(&self, incident_id: IncidentId) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT EXISTS(SELECT 1 FROM incidents WHERE id = ?)",
                [incident_id.as_i64()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<i32>(0)? != 0),
            None => Ok(false),
        }
    }
}

impl LedgerRepository for LibSqlLedgerRepository<'_> {
    async fn append(
        &self,
        incident_id: IncidentId,
        status: Status,
        recorded_at: i64,
    ) -> Result<StatusEntry> {
        if !self.incident_exists(incident_id).await? {
            return Err(Error::NotFound(format!("incident {incident_id}")));
        }

        self.conn
            .execute(
                "INSERT INTO status_log (incident_id, status, recorded_at) VALUES (?, ?, ?)",
                (incident_id.as_i64(), status.code(), recorded_at),
            )
            .await?;

        Ok(StatusEntry {
            id: self.conn.last_insert_rowid(),
            incident_id,
            status,
            recorded_at,
        })
    }

    async fn latest(&self, incident_id: IncidentId) -> Result<Option<StatusEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, incident_id, status, recorded_at
                 FROM status_log
                 WHERE incident_id = ?
                 ORDER BY recorded_at DESC, id DESC
                 LIMIT 1",
                [incident_id.as_i64()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_entry(&row)?)),
            None => Ok(None),
        }
    }

    async fn entries(&self, incident_id: IncidentId) -> Result<Vec<StatusEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, incident_id, status, recorded_at
                 FROM status_log
                 WHERE incident_id = ?
                 ORDER BY recorded_at ASC, id ASC",
                [incident_id.as_i64()],
            )
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(Self::parse_entry(&row)?);
        }
        Ok(entries)
    }
}
