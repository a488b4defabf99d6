//! Sync engine: directional reconciliation between the two stores
//!
//! A pass is a full scan of the source store; each record is normalized,
//! matched against the target (cross-store link first, then normalized
//! coordinate key), and inserted or updated-if-changed. Passes are sagas:
//! records are processed independently, a failing record is reported in
//! the pass result and the pass continues, and committed records stay
//! committed. There is no cross-store transaction — bidirectional sync is
//! two independent passes with last-writer-wins field semantics.

pub mod map;

use libsql::Connection;
use serde::{Deserialize, Serialize};

use crate::db::{
    CompanyRepository, IncidentRepository, LibSqlCompanyRepository, LibSqlIncidentRepository,
    LibSqlUserRepository, SyncedFields, UserRepository,
};
use crate::docstore::{DocumentStore, IncidentDocument};
use crate::error::{Error, Result};
use crate::ledger::StatusLedger;
use crate::matcher;
use crate::models::{Incident, IncidentDraft, Status};

/// Direction of a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Document store is the source, relational store the target
    DocumentToRelational,
    /// Relational store is the source, document store the target
    RelationalToDocument,
}

impl std::fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DocumentToRelational => write!(f, "document→relational"),
            Self::RelationalToDocument => write!(f, "relational→document"),
        }
    }
}

/// A record that failed during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecordError {
    /// Source-side identifier of the failed record
    pub record: String,
    /// What went wrong
    pub message: String,
}

/// Outcome of a sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Records inserted into the target store
    pub created: u32,
    /// Records whose target counterpart was changed
    pub updated: u32,
    /// Records matched with nothing to write
    pub skipped: u32,
    /// Per-record failures; the pass continued past each of them
    pub errors: Vec<SyncRecordError>,
}

impl SyncReport {
    /// True when every record synced without error.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }

    fn fail(&mut self, record: impl Into<String>, error: &Error) {
        let record = record.into();
        tracing::warn!(%record, %error, "sync record failed; continuing pass");
        self.errors.push(SyncRecordError {
            record,
            message: error.to_string(),
        });
    }
}

enum Outcome {
    Created,
    Updated,
    Skipped,
}

/// Orchestrates directional passes between the relational connection and a
/// document store.
pub struct SyncEngine<'a, D: DocumentStore> {
    conn: &'a Connection,
    docs: &'a D,
}

impl<'a, D: DocumentStore> SyncEngine<'a, D> {
    /// Create an engine over the two stores
    pub const fn new(conn: &'a Connection, docs: &'a D) -> Self {
        Self { conn, docs }
    }

    /// Run one directional pass.
    ///
    /// A failure to scan the source store fails the whole pass; individual
    /// record failures are collected in the report instead.
    pub async fn sync(&self, direction: SyncDirection) -> Result<SyncReport> {
        tracing::info!(%direction, "sync pass starting");
        let report = match direction {
            SyncDirection::DocumentToRelational => self.sync_document_to_relational().await?,
            SyncDirection::RelationalToDocument => self.sync_relational_to_document().await?,
        };
        tracing::info!(
            %direction,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.errors.len(),
            "sync pass finished"
        );
        Ok(report)
    }

    async fn sync_document_to_relational(&self) -> Result<SyncReport> {
        let documents = self.docs.list().await?;
        let mut report = SyncReport::default();

        for doc in documents {
            let record = doc.id.clone().unwrap_or_else(|| "<unnamed>".to_string());
            match self.import_document(&doc).await {
                Ok(outcome) => report.record(outcome),
                Err(error) => report.fail(record, &error),
            }
        }

        Ok(report)
    }

    /// Reconcile one document into the relational store.
    async fn import_document(&self, doc: &IncidentDocument) -> Result<Outcome> {
        let incidents = LibSqlIncidentRepository::new(self.conn);
        let companies = LibSqlCompanyRepository::new(self.conn);
        let users = LibSqlUserRepository::new(self.conn);
        let ledger = StatusLedger::new(self.conn);

        let doc_id = doc
            .id
            .as_deref()
            .ok_or_else(|| Error::Sync("document record carries no id".to_string()))?;
        let status = map::status_from_document_text(&doc.status)?;

        // Cross-store link wins over positional matching.
        let counterpart = match incidents.find_by_doc_id(doc_id).await? {
            Some(incident) => Some(incident),
            None => self.match_incident_by_position(doc).await?,
        };

        let company_id = match doc.company.as_deref() {
            Some(name) => Some(companies.get_or_create(name).await?.id),
            None => None,
        };
        let user_id = match doc.reporter.as_deref() {
            Some(email) => users.find_by_email(email).await?.map(|user| user.id),
            None => None,
        };

        match counterpart {
            None => {
                let incident = incidents
                    .create(&IncidentDraft {
                        doc_id: Some(doc_id.to_string()),
                        surface: doc.surface,
                        budget: doc.budget,
                        latitude: doc.latitude,
                        longitude: doc.longitude,
                        company_id,
                        user_id,
                        created_at: doc.created_at,
                    })
                    .await?;
                // The implicit default already covers nouveau; only a real
                // transition needs a ledger row.
                if status != Status::Nouveau {
                    ledger.append_transition(incident.id, status, None).await?;
                }
                Ok(Outcome::Created)
            }
            Some(incident) => {
                // A positional match already linked to another document
                // means two source records share this position; merging
                // them would thrash the incident on every pass.
                if incident
                    .doc_id
                    .as_deref()
                    .is_some_and(|linked| linked != doc_id)
                {
                    return Err(Error::DuplicateAmbiguity(
                        2,
                        doc.coordinate_key().unwrap_or_default(),
                    ));
                }

                let newly_linked = incident.doc_id.is_none();
                if newly_linked {
                    incidents.link_doc_id(incident.id, doc_id).await?;
                }

                let current = ledger.current_status(incident.id).await?;
                let fields_changed = incident.surface != doc.surface
                    || incident.budget != doc.budget
                    || incident.company_id != company_id;
                let status_changed = current != status;

                if fields_changed {
                    incidents
                        .update_synced_fields(
                            incident.id,
                            &SyncedFields {
                                surface: doc.surface,
                                budget: doc.budget,
                                company_id,
                            },
                        )
                        .await?;
                }
                if status_changed {
                    ledger.append_transition(incident.id, status, None).await?;
                }

                if fields_changed || status_changed || newly_linked {
                    Ok(Outcome::Updated)
                } else {
                    Ok(Outcome::Skipped)
                }
            }
        }
    }

    /// Positional lookup of a document's relational counterpart.
    ///
    /// Records without a coordinate key are never matched by position. The
    /// unique index makes more than one match impossible in a healthy
    /// store; the check stays for stores that predate it.
    async fn match_incident_by_position(
        &self,
        doc: &IncidentDocument,
    ) -> Result<Option<Incident>> {
        let Some(key) = doc.coordinate_key() else {
            return Ok(None);
        };
        let mut matches = LibSqlIncidentRepository::new(self.conn)
            .find_by_coordinate_key(&key)
            .await?;
        if matches.len() > 1 {
            return Err(Error::DuplicateAmbiguity(matches.len(), key));
        }
        Ok(matches.pop())
    }

    async fn sync_relational_to_document(&self) -> Result<SyncReport> {
        let incidents = LibSqlIncidentRepository::new(self.conn).list().await?;
        let documents = self.docs.list().await?;
        let mut report = SyncReport::default();

        for incident in incidents {
            match self.export_incident(&incident, &documents).await {
                Ok(outcome) => report.record(outcome),
                Err(error) => report.fail(incident.id.to_string(), &error),
            }
        }

        Ok(report)
    }

    /// Reconcile one relational incident into the document store.
    async fn export_incident(
        &self,
        incident: &Incident,
        documents: &[IncidentDocument],
    ) -> Result<Outcome> {
        let incidents = LibSqlIncidentRepository::new(self.conn);
        let companies = LibSqlCompanyRepository::new(self.conn);
        let users = LibSqlUserRepository::new(self.conn);
        let ledger = StatusLedger::new(self.conn);

        let current = ledger.current_status(incident.id).await?;
        let company = match incident.company_id {
            Some(id) => companies.get(id).await?.map(|company| company.name),
            None => None,
        };
        let reporter = match incident.user_id {
            Some(id) => users.get(id).await?.map(|user| user.email),
            None => None,
        };

        let desired = IncidentDocument {
            id: None,
            surface: incident.surface,
            budget: incident.budget,
            latitude: incident.latitude,
            longitude: incident.longitude,
            company,
            reporter,
            status: map::status_to_document_text(current).to_string(),
            created_at: incident.created_at,
        };

        // Cross-store link wins; a linked-but-missing document falls back
        // to positional matching, then reinsertion.
        let counterpart = incident
            .doc_id
            .as_deref()
            .and_then(|doc_id| {
                documents
                    .iter()
                    .find(|doc| doc.id.as_deref() == Some(doc_id))
            });
        let counterpart = match counterpart {
            Some(doc) => Some(doc),
            None => matcher::find_counterpart(
                incident.latitude,
                incident.longitude,
                documents,
                IncidentDocument::coordinate_key,
            )?,
        };

        match counterpart {
            None => {
                let doc_id = self.docs.insert(&desired).await?;
                incidents.link_doc_id(incident.id, &doc_id).await?;
                Ok(Outcome::Created)
            }
            Some(existing) => {
                let existing_id = existing
                    .id
                    .as_deref()
                    .ok_or_else(|| Error::Sync("target document carries no id".to_string()))?;

                let newly_linked = incident.doc_id.as_deref() != Some(existing_id);
                if newly_linked {
                    incidents.link_doc_id(incident.id, existing_id).await?;
                }

                let existing_status = map::status_from_document_text(&existing.status).ok();
                let changed = existing.surface != desired.surface
                    || existing.budget != desired.budget
                    || existing.company != desired.company
                    || existing_status != Some(current)
                    || (desired.created_at.is_some()
                        && existing.created_at != desired.created_at);

                if changed {
                    self.docs.update(existing_id, &desired).await?;
                }

                if changed || newly_linked {
                    Ok(Outcome::Updated)
                } else {
                    Ok(Outcome::Skipped)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, LedgerRepository, LibSqlLedgerRepository};
    use crate::docstore::MemoryDocumentStore;
    use pretty_assertions::assert_eq;

    fn doc(latitude: f64, longitude: f64, status: &str) -> IncidentDocument {
        IncidentDocument {
            id: None,
            surface: 8.0,
            budget: 15_000.0,
            latitude,
            longitude,
            company: Some("Colas".to_string()),
            reporter: None,
            status: status.to_string(),
            created_at: Some(1_700_000_000_000),
        }
    }

    async fn report_incident(db: &Database, latitude: f64, longitude: f64) -> Incident {
        LibSqlIncidentRepository::new(db.connection())
            .create(&IncidentDraft {
                surface: 8.0,
                budget: 15_000.0,
                latitude,
                longitude,
                created_at: Some(1_700_000_000_000),
                ..IncidentDraft::default()
            })
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_import_creates_and_is_idempotent() {
        let db = Database::open_in_memory().await.unwrap();
        let docs = MemoryDocumentStore::new();
        docs.insert(&doc(-18.8792, 47.5079, "en cours")).await.unwrap();

        let engine = SyncEngine::new(db.connection(), &docs);

        let first = engine.sync(SyncDirection::DocumentToRelational).await.unwrap();
        assert_eq!(first.created, 1);
        assert!(first.is_clean());

        // A second pass with no intervening changes is a no-op.
        let second = engine.sync(SyncDirection::DocumentToRelational).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.skipped, 1);

        // The import carried the status and created the company on demand.
        let incidents = LibSqlIncidentRepository::new(db.connection())
            .list()
            .await
            .unwrap();
        assert_eq!(incidents.len(), 1);
        assert!(incidents[0].doc_id.is_some());
        assert!(incidents[0].company_id.is_some());
        let status = StatusLedger::new(db.connection())
            .current_status(incidents[0].id)
            .await
            .unwrap();
        assert_eq!(status, Status::EnCours);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shared_coordinates_link_instead_of_duplicate() {
        // One record in each store at the same position.
        let db = Database::open_in_memory().await.unwrap();
        let docs = MemoryDocumentStore::new();
        let incident = report_incident(&db, -18.8792, 47.5079).await;
        docs.insert(&doc(-18.8792, 47.5079, "nouveau")).await.unwrap();

        let engine = SyncEngine::new(db.connection(), &docs);
        let first = engine.sync(SyncDirection::DocumentToRelational).await.unwrap();
        assert_eq!(first.created, 0);
        assert_eq!(first.updated, 1); // linking counts as a write

        let linked = LibSqlIncidentRepository::new(db.connection())
            .get(incident.id)
            .await
            .unwrap()
            .unwrap();
        assert!(linked.doc_id.is_some());

        let second = engine.sync(SyncDirection::DocumentToRelational).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_import_updates_changed_fields() {
        let db = Database::open_in_memory().await.unwrap();
        let docs = MemoryDocumentStore::new();
        let id = docs.insert(&doc(-18.8792, 47.5079, "nouveau")).await.unwrap();

        let engine = SyncEngine::new(db.connection(), &docs);
        engine.sync(SyncDirection::DocumentToRelational).await.unwrap();

        // Budget revised and work started on the document side.
        let mut revised = doc(-18.8792, 47.5079, "en cours");
        revised.budget = 25_000.0;
        docs.update(&id, &revised).await.unwrap();

        let report = engine.sync(SyncDirection::DocumentToRelational).await.unwrap();
        assert_eq!(report.updated, 1);

        let incidents = LibSqlIncidentRepository::new(db.connection())
            .list()
            .await
            .unwrap();
        assert_eq!(incidents[0].budget, 25_000.0);
        let status = StatusLedger::new(db.connection())
            .current_status(incidents[0].id)
            .await
            .unwrap();
        assert_eq!(status, Status::EnCours);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_document_status_fails_record_not_pass() {
        let db = Database::open_in_memory().await.unwrap();
        let docs = MemoryDocumentStore::new();
        docs.insert(&doc(-18.8792, 47.5079, "invalide")).await.unwrap();
        docs.insert(&doc(-18.9000, 47.5200, "nouveau")).await.unwrap();

        let engine = SyncEngine::new(db.connection(), &docs);
        let report = engine.sync(SyncDirection::DocumentToRelational).await.unwrap();

        // The bad record is reported, the good one still lands.
        assert_eq!(report.created, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("invalide"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_export_creates_and_is_idempotent() {
        let db = Database::open_in_memory().await.unwrap();
        let docs = MemoryDocumentStore::new();
        let incident = report_incident(&db, -18.8792, 47.5079).await;
        LibSqlLedgerRepository::new(db.connection())
            .append(incident.id, Status::EnCours, 1_700_000_100_000)
            .await
            .unwrap();

        let engine = SyncEngine::new(db.connection(), &docs);
        let first = engine.sync(SyncDirection::RelationalToDocument).await.unwrap();
        assert_eq!(first.created, 1);

        let exported = docs.list().await.unwrap();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].status, "en cours");

        let second = engine.sync(SyncDirection::RelationalToDocument).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.skipped, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_export_overwrites_stale_document() {
        let db = Database::open_in_memory().await.unwrap();
        let docs = MemoryDocumentStore::new();
        let incident = report_incident(&db, -18.8792, 47.5079).await;
        // Stale counterpart at the same position with an outdated budget.
        let mut stale = doc(-18.8792, 47.5079, "nouveau");
        stale.budget = 1.0;
        stale.company = None;
        docs.insert(&stale).await.unwrap();

        let engine = SyncEngine::new(db.connection(), &docs);
        let report = engine.sync(SyncDirection::RelationalToDocument).await.unwrap();
        assert_eq!(report.updated, 1);

        let exported = docs.list().await.unwrap();
        assert_eq!(exported[0].budget, 15_000.0);

        let linked = LibSqlIncidentRepository::new(db.connection())
            .get(incident.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(linked.doc_id, exported[0].id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_import_ambiguous_documents_reported() {
        let db = Database::open_in_memory().await.unwrap();
        let docs = MemoryDocumentStore::new();
        // Two source documents share one position but differ in budget.
        let mut first = doc(-18.8792, 47.5079, "nouveau");
        first.budget = 1_000.0;
        let mut second = doc(-18.8792, 47.5079, "nouveau");
        second.budget = 2_000.0;
        docs.insert(&first).await.unwrap();
        docs.insert(&second).await.unwrap();

        let engine = SyncEngine::new(db.connection(), &docs);
        let report = engine.sync(SyncDirection::DocumentToRelational).await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("Ambiguous"));

        // Repeat passes must not thrash the merged incident: the linked
        // document is a clean skip, the other keeps erroring.
        let second_pass = engine.sync(SyncDirection::DocumentToRelational).await.unwrap();
        assert_eq!(second_pass.created, 0);
        assert_eq!(second_pass.updated, 0);
        assert_eq!(second_pass.skipped, 1);
        assert_eq!(second_pass.errors.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_export_ambiguous_documents_reported() {
        let db = Database::open_in_memory().await.unwrap();
        let docs = MemoryDocumentStore::new();
        report_incident(&db, -18.8792, 47.5079).await;
        // Two unlinked documents share the incident's position.
        docs.insert(&doc(-18.8792, 47.5079, "nouveau")).await.unwrap();
        docs.insert(&doc(-18.8792, 47.5079, "en cours")).await.unwrap();

        let engine = SyncEngine::new(db.connection(), &docs);
        let report = engine.sync(SyncDirection::RelationalToDocument).await.unwrap();

        assert_eq!(report.created, 0);
        assert_eq!(report.updated, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("Ambiguous"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_bidirectional_round_trip_converges() {
        let db = Database::open_in_memory().await.unwrap();
        let docs = MemoryDocumentStore::new();
        report_incident(&db, -18.8792, 47.5079).await;
        docs.insert(&doc(-18.9000, 47.5200, "terminé")).await.unwrap();

        let engine = SyncEngine::new(db.connection(), &docs);
        engine.sync(SyncDirection::DocumentToRelational).await.unwrap();
        engine.sync(SyncDirection::RelationalToDocument).await.unwrap();

        // Both stores now hold both incidents, linked one-to-one.
        let incidents = LibSqlIncidentRepository::new(db.connection())
            .list()
            .await
            .unwrap();
        let documents = docs.list().await.unwrap();
        assert_eq!(incidents.len(), 2);
        assert_eq!(documents.len(), 2);
        assert!(incidents.iter().all(|incident| incident.doc_id.is_some()));

        // And a further pass in either direction is a no-op.
        let pull = engine.sync(SyncDirection::DocumentToRelational).await.unwrap();
        let push = engine.sync(SyncDirection::RelationalToDocument).await.unwrap();
        assert_eq!((pull.created, pull.updated), (0, 0));
        assert_eq!((push.created, push.updated), (0, 0));
    }
}
