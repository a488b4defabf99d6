//! Runtime configuration for roadsync clients.
//!
//! Covers the relational database location and the optional document-store
//! (Firestore) endpoint settings. Values come from the environment; secret
//! tokens are never logged.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

/// Default Firestore REST endpoint.
const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// Default document collection holding incident records.
const DEFAULT_INCIDENT_COLLECTION: &str = "incidents";

/// Configuration for the Firestore-backed document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirestoreConfig {
    /// REST API base URL (override for emulators/tests)
    pub base_url: String,
    /// Google Cloud project id
    pub project_id: String,
    /// Collection holding incident documents
    pub collection: String,
    /// Bearer token for authenticated access, if required
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
}

impl FirestoreConfig {
    /// Create a configuration for the given project with defaults.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_FIRESTORE_BASE_URL.to_string(),
            project_id: project_id.into(),
            collection: DEFAULT_INCIDENT_COLLECTION.to_string(),
            auth_token: None,
        }
    }

    /// Override the REST base URL (e.g. a local emulator).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Attach a bearer token.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Validate endpoint and project settings.
    pub fn validate(&self) -> Result<()> {
        if !is_http_url(&self.base_url) {
            return Err(Error::InvalidInput(format!(
                "Firestore base URL must include http:// or https://, got '{}'",
                self.base_url
            )));
        }
        if self.project_id.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Firestore project id must not be empty".to_string(),
            ));
        }
        if self.collection.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Firestore collection must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Full URL of the incident collection's documents endpoint.
    #[must_use]
    pub fn collection_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents/{}",
            self.base_url.trim_end_matches('/'),
            self.project_id,
            self.collection
        )
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Path to the local relational database file (None = in-memory)
    pub db_path: Option<PathBuf>,
    /// Document-store settings; sync is unavailable without them
    pub firestore: Option<FirestoreConfig>,
}

impl AppConfig {
    /// Load configuration from the environment.
    ///
    /// Recognized variables: `ROADSYNC_DB_PATH`, `ROADSYNC_FIRESTORE_URL`,
    /// `ROADSYNC_FIRESTORE_PROJECT`, `ROADSYNC_FIRESTORE_COLLECTION`,
    /// `ROADSYNC_FIRESTORE_TOKEN`. The Firestore block is only built when a
    /// project id is present.
    pub fn from_env() -> Result<Self> {
        let db_path = normalize_text_option(std::env::var("ROADSYNC_DB_PATH").ok())
            .map(PathBuf::from);

        let project_id = normalize_text_option(std::env::var("ROADSYNC_FIRESTORE_PROJECT").ok());
        let firestore = match project_id {
            Some(project_id) => {
                let mut config = FirestoreConfig::new(project_id);
                if let Some(url) =
                    normalize_text_option(std::env::var("ROADSYNC_FIRESTORE_URL").ok())
                {
                    config.base_url = url;
                }
                if let Some(collection) =
                    normalize_text_option(std::env::var("ROADSYNC_FIRESTORE_COLLECTION").ok())
                {
                    config.collection = collection;
                }
                config.auth_token =
                    normalize_text_option(std::env::var("ROADSYNC_FIRESTORE_TOKEN").ok());
                config.validate()?;
                Some(config)
            }
            None => None,
        };

        Ok(Self { db_path, firestore })
    }
}
