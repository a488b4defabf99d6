//! Incident service: the operations exposed to API collaborators
//!
//! Thin orchestration over the two stores. Auth is an external concern —
//! the service trusts the caller-supplied role and only uses it to gate
//! sync triggering.

use serde::Serialize;

use crate::db::stats::{self, CompanyStatistics, Statistics};
use crate::db::{Database, IncidentRepository, LibSqlIncidentRepository};
use crate::docstore::DocumentStore;
use crate::error::{Error, Result};
use crate::ledger::StatusLedger;
use crate::models::{Incident, IncidentDraft, IncidentId, Role, Status};
use crate::notify;
use crate::projection::{project, ProgressView};
use crate::sync::{SyncDirection, SyncEngine, SyncReport};

/// One row of the status-code listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCodeInfo {
    /// Machine-readable code
    pub code: &'static str,
    /// Display label
    pub label: &'static str,
    /// Derived progress percentage
    pub percentage: u8,
}

/// Service over the relational database and a document store.
pub struct IncidentService<'a, D: DocumentStore> {
    db: &'a Database,
    docs: &'a D,
}

impl<'a, D: DocumentStore> IncidentService<'a, D> {
    /// Create a service over the given stores
    pub const fn new(db: &'a Database, docs: &'a D) -> Self {
        Self { db, docs }
    }

    /// Report a new incident.
    ///
    /// The incident starts in the implicit `nouveau` state: no ledger row
    /// is written until the first real transition.
    pub async fn create_incident(&self, draft: &IncidentDraft) -> Result<Incident> {
        LibSqlIncidentRepository::new(self.db.connection())
            .create(draft)
            .await
    }

    /// List all incidents, newest first.
    pub async fn list_incidents(&self) -> Result<Vec<Incident>> {
        LibSqlIncidentRepository::new(self.db.connection())
            .list()
            .await
    }

    /// Run one directional sync pass. Manager-only.
    pub async fn trigger_sync(&self, direction: SyncDirection, role: Role) -> Result<SyncReport> {
        if role != Role::Manager {
            return Err(Error::Forbidden(
                "sync may only be triggered by a manager".to_string(),
            ));
        }
        SyncEngine::new(self.db.connection(), self.docs)
            .sync(direction)
            .await
    }

    /// Record a status change for an incident.
    ///
    /// Fails with `InvalidStatus` before touching the ledger when the code
    /// is outside the enumeration, and with `NotFound` for an unknown
    /// incident. On success the new entry's timestamp is returned and —
    /// when the status actually changed and a reporter is known — a
    /// notification is dispatched as a detached best-effort task whose
    /// failure never affects this operation.
    pub async fn update_incident_status(&self, id: IncidentId, code: &str) -> Result<i64> {
        let status: Status = code.parse()?;

        let incident = LibSqlIncidentRepository::new(self.db.connection())
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("incident {id}")))?;

        let ledger = StatusLedger::new(self.db.connection());
        let old_status = ledger.current_status(id).await?;
        let entry = ledger.append_transition(id, status, None).await?;

        if let Some(recipient) = incident.user_id {
            // Detached: the handle is dropped, delivery is best-effort.
            drop(notify::on_status_observed(
                self.db.connection().clone(),
                id,
                recipient,
                old_status,
                status,
            ));
        }

        Ok(entry.recorded_at)
    }

    /// Progress view of an incident, recomputed from the ledger.
    pub async fn get_incident_progress(&self, id: IncidentId) -> Result<ProgressView> {
        let incident = LibSqlIncidentRepository::new(self.db.connection())
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("incident {id}")))?;

        let latest = StatusLedger::new(self.db.connection())
            .latest_entry(id)
            .await?;
        Ok(project(&incident, latest.as_ref()))
    }

    /// The closed status enumeration with labels and percentages.
    #[must_use]
    pub fn list_status_codes(&self) -> Vec<StatusCodeInfo> {
        Status::ALL
            .iter()
            .map(|status| StatusCodeInfo {
                code: status.code(),
                label: status.label(),
                percentage: status.percentage(),
            })
            .collect()
    }

    /// Global aggregates over the ledger-joined incident set.
    pub async fn get_statistics(&self) -> Result<Statistics> {
        stats::aggregate(self.db.connection()).await
    }

    /// Per-company aggregates.
    pub async fn get_statistics_by_company(&self) -> Result<Vec<CompanyStatistics>> {
        stats::by_company(self.db.connection()).await
    }
}
