//! Status ledger: append-only transition history and derived current status
//!
//! The ledger is the single source of truth for incident status. Nothing
//! stores a "current status" field; reads resolve it from the most recent
//! entry (max timestamp, ties broken deterministically by max entry id) and
//! fall back to the implicit `nouveau` state when no entry exists.

use libsql::Connection;

use crate::db::{LedgerRepository, LibSqlLedgerRepository};
use crate::error::Result;
use crate::models::{IncidentId, Status, StatusEntry};
use crate::util::unix_timestamp_ms_now;

/// Ledger service over the relational status log.
pub struct StatusLedger<'a> {
    repo: LibSqlLedgerRepository<'a>,
}

impl<'a> StatusLedger<'a> {
    /// Create a ledger over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self {
            repo: LibSqlLedgerRepository::new(conn),
        }
    }

    /// Append a status transition.
    ///
    /// `recorded_at` defaults to now. No transition graph is enforced: any
    /// status may follow any status, regressions included. Fails with
    /// `NotFound` when the incident does not exist; never mutates or
    /// deletes existing rows.
    pub async fn append_transition(
        &self,
        incident_id: IncidentId,
        status: Status,
        recorded_at: Option<i64>,
    ) -> Result<StatusEntry> {
        let recorded_at = recorded_at.unwrap_or_else(unix_timestamp_ms_now);
        let entry = self.repo.append(incident_id, status, recorded_at).await?;
        tracing::debug!(
            incident = %incident_id,
            status = %status,
            recorded_at,
            "status transition appended"
        );
        Ok(entry)
    }

    /// Latest ledger entry for an incident, if any.
    pub async fn latest_entry(&self, incident_id: IncidentId) -> Result<Option<StatusEntry>> {
        self.repo.latest(incident_id).await
    }

    /// Current status of an incident: latest entry, or implicit `nouveau`.
    pub async fn current_status(&self, incident_id: IncidentId) -> Result<Status> {
        Ok(self
            .latest_entry(incident_id)
            .await?
            .map_or(Status::Nouveau, |entry| entry.status))
    }

    /// Full transition history, oldest first.
    pub async fn history(&self, incident_id: IncidentId) -> Result<Vec<StatusEntry>> {
        self.repo.entries(incident_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, IncidentRepository, LibSqlIncidentRepository};
    use crate::error::Error;
    use crate::models::IncidentDraft;

    async fn setup() -> (Database, IncidentId) {
        let db = Database::open_in_memory().await.unwrap();
        let incident = LibSqlIncidentRepository::new(db.connection())
            .create(&IncidentDraft {
                surface: 10.0,
                budget: 1_000.0,
                latitude: -18.8792,
                longitude: 47.5079,
                created_at: Some(1_700_000_000_000),
                ..IncidentDraft::default()
            })
            .await
            .unwrap();
        (db, incident.id)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_implicit_nouveau_without_entries() {
        let (db, incident_id) = setup().await;
        let ledger = StatusLedger::new(db.connection());

        assert_eq!(
            ledger.current_status(incident_id).await.unwrap(),
            Status::Nouveau
        );
        assert!(ledger.latest_entry(incident_id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_last_appended_wins_with_increasing_timestamps() {
        let (db, incident_id) = setup().await;
        let ledger = StatusLedger::new(db.connection());

        // With strictly increasing timestamps the last appended entry wins.
        for (status, at) in [
            (Status::EnCours, 1_000),
            (Status::Termine, 2_000),
            (Status::EnCours, 3_000),
        ] {
            ledger
                .append_transition(incident_id, status, Some(at))
                .await
                .unwrap();
        }

        assert_eq!(
            ledger.current_status(incident_id).await.unwrap(),
            Status::EnCours
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_append_defaults_to_now() {
        let (db, incident_id) = setup().await;
        let ledger = StatusLedger::new(db.connection());

        let before = unix_timestamp_ms_now();
        let entry = ledger
            .append_transition(incident_id, Status::EnCours, None)
            .await
            .unwrap();
        assert!(entry.recorded_at >= before);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_append_unknown_incident() {
        let (db, _) = setup().await;
        let ledger = StatusLedger::new(db.connection());

        let result = ledger
            .append_transition(IncidentId(404), Status::EnCours, None)
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
