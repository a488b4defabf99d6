//! In-memory document store used by tests and local mode

use std::collections::BTreeMap;
use std::sync::Mutex;

use uuid::Uuid;

use crate::error::{Error, Result};

use super::{DocumentStore, IncidentDocument};

/// In-process `DocumentStore` over a mutex-guarded map.
///
/// Generates time-sortable UUIDv7 string ids, mirroring the production
/// store's generated identifiers.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<BTreeMap<String, IncidentDocument>>,
}

impl MemoryDocumentStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, IncidentDocument>> {
        // Mutex poisoning only happens if a holder panicked; propagating the
        // inner data is still sound for a plain map.
        self.docs.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, doc: &IncidentDocument) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let mut stored = doc.clone();
        stored.id = Some(id.clone());
        self.lock().insert(id.clone(), stored);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<IncidentDocument>> {
        Ok(self.lock().get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<IncidentDocument>> {
        Ok(self.lock().values().cloned().collect())
    }

    async fn update(&self, id: &str, doc: &IncidentDocument) -> Result<()> {
        let mut docs = self.lock();
        let Some(existing) = docs.get_mut(id) else {
            return Err(Error::NotFound(format!("document {id}")));
        };
        *existing = doc.clone();
        existing.id = Some(id.to_string());
        Ok(())
    }
}
