//! Document store layer for roadsync
//!
//! The document side of the dual-store design: collection-based CRUD with
//! equality-filter semantics and store-generated string identifiers. The
//! production backend is Firestore over REST; an in-memory implementation
//! backs tests and local mode.

mod firestore;
mod memory;

pub use firestore::FirestoreStore;
pub use memory::MemoryDocumentStore;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::matcher::coordinate_key;

/// An incident as represented in the document store.
///
/// The document schema denormalizes reference data: the company and the
/// reporter are carried by name/email, and the status is free text in its
/// document-side spelling (e.g. `"en cours"`). The sync engine owns the
/// mapping to the relational schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentDocument {
    /// Store-generated string identifier; `None` before insertion
    #[serde(default)]
    pub id: Option<String>,
    /// Damaged surface area in square meters
    pub surface: f64,
    /// Estimated remediation budget
    pub budget: f64,
    /// Latitude of the defect
    pub latitude: f64,
    /// Longitude of the defect
    pub longitude: f64,
    /// Assigned company name, if any
    #[serde(default)]
    pub company: Option<String>,
    /// Reporting user's email, if known
    #[serde(default)]
    pub reporter: Option<String>,
    /// Document-side status text
    pub status: String,
    /// Creation timestamp (Unix ms), if the document carries one
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl IncidentDocument {
    /// Normalized coordinate key used for duplicate detection.
    #[must_use]
    pub fn coordinate_key(&self) -> Option<String> {
        coordinate_key(self.latitude, self.longitude)
    }
}

/// Trait for document store operations (async)
#[allow(async_fn_in_trait)]
pub trait DocumentStore {
    /// Insert a document, returning the store-generated id
    async fn insert(&self, doc: &IncidentDocument) -> Result<String>;

    /// Get a document by id
    async fn get(&self, id: &str) -> Result<Option<IncidentDocument>>;

    /// List all documents in the collection
    async fn list(&self) -> Result<Vec<IncidentDocument>>;

    /// Overwrite a document's fields
    async fn update(&self, id: &str, doc: &IncidentDocument) -> Result<()>;
}
