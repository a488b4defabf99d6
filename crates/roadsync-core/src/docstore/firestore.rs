//! Firestore REST implementation of the document store

use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::FirestoreConfig;
use crate::error::{Error, Result};

use super::{DocumentStore, IncidentDocument};

/// Page size used when scanning the collection.
const LIST_PAGE_SIZE: u32 = 300;

/// `DocumentStore` backed by the Firestore `documents` REST API.
pub struct FirestoreStore {
    config: FirestoreConfig,
    client: reqwest::Client,
}

impl FirestoreStore {
    /// Create a client for the configured project/collection.
    pub fn new(config: FirestoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            client: reqwest::Client::builder().build()?,
        })
    }

    fn document_url(&self, id: &str) -> String {
        format!("{}/{}", self.config.collection_url(), id)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.auth_token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Error::DocumentApi(parse_api_error(status, &body)))
    }
}

impl DocumentStore for FirestoreStore {
    async fn insert(&self, doc: &IncidentDocument) -> Result<String> {
        let response = self
            .authorize(self.client.post(self.config.collection_url()))
            .json(&FireDoc::from_incident(doc))
            .send()
            .await?;

        let created = Self::check(response).await?.json::<FireDoc>().await?;
        created
            .document_id()
            .ok_or_else(|| Error::DocumentApi("insert response carried no document name".into()))
    }

    async fn get(&self, id: &str) -> Result<Option<IncidentDocument>> {
        let response = self
            .authorize(self.client.get(self.document_url(id)))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let doc = Self::check(response).await?.json::<FireDoc>().await?;
        Ok(Some(doc.into_incident()))
    }

    async fn list(&self) -> Result<Vec<IncidentDocument>> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .authorize(self.client.get(self.config.collection_url()))
                .query(&[("pageSize", LIST_PAGE_SIZE.to_string())]);
            if let Some(token) = page_token.as_deref() {
                request = request.query(&[("pageToken", token)]);
            }

            let page = Self::check(request.send().await?)
                .await?
                .json::<ListResponse>()
                .await?;

            documents.extend(page.documents.into_iter().map(FireDoc::into_incident));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(documents)
    }

    async fn update(&self, id: &str, doc: &IncidentDocument) -> Result<()> {
        let response = self
            .authorize(self.client.patch(self.document_url(id)))
            .json(&FireDoc::from_incident(doc))
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wire types: Firestore's typed-value document encoding
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
struct FireDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    fields: FireFields,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FireFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    surface: Option<FireValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    budget: Option<FireValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    latitude: Option<FireValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    longitude: Option<FireValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    company: Option<FireValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reporter: Option<FireValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<FireValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<FireValue>,
}

/// One Firestore typed value. Integers travel as strings on the wire.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FireValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    double_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    string_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    integer_value: Option<String>,
}

impl FireValue {
    fn double(value: f64) -> Self {
        Self {
            double_value: Some(value),
            ..Self::default()
        }
    }

    fn string(value: &str) -> Self {
        Self {
            string_value: Some(value.to_string()),
            ..Self::default()
        }
    }

    fn integer(value: i64) -> Self {
        Self {
            integer_value: Some(value.to_string()),
            ..Self::default()
        }
    }

    fn as_f64(&self) -> Option<f64> {
        self.double_value
            .or_else(|| self.integer_value.as_deref().and_then(|v| v.parse().ok()))
    }

    fn as_i64(&self) -> Option<i64> {
        self.integer_value.as_deref().and_then(|v| v.parse().ok())
    }

    fn as_string(&self) -> Option<String> {
        self.string_value.clone()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<FireDoc>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl FireDoc {
    fn from_incident(doc: &IncidentDocument) -> Self {
        Self {
            name: None,
            fields: FireFields {
                surface: Some(FireValue::double(doc.surface)),
                budget: Some(FireValue::double(doc.budget)),
                latitude: Some(FireValue::double(doc.latitude)),
                longitude: Some(FireValue::double(doc.longitude)),
                company: doc.company.as_deref().map(FireValue::string),
                reporter: doc.reporter.as_deref().map(FireValue::string),
                status: Some(FireValue::string(&doc.status)),
                created_at: doc.created_at.map(FireValue::integer),
            },
        }
    }

    /// The generated document id: last segment of the resource name.
    fn document_id(&self) -> Option<String> {
        self.name
            .as_deref()
            .and_then(|name| name.rsplit('/').next())
            .map(std::string::ToString::to_string)
    }

    fn into_incident(self) -> IncidentDocument {
        let id = self.document_id();
        let fields = self.fields;
        IncidentDocument {
            id,
            surface: fields.surface.as_ref().and_then(FireValue::as_f64).unwrap_or(0.0),
            budget: fields.budget.as_ref().and_then(FireValue::as_f64).unwrap_or(0.0),
            latitude: fields
                .latitude
                .as_ref()
                .and_then(FireValue::as_f64)
                .unwrap_or(0.0),
            longitude: fields
                .longitude
                .as_ref()
                .and_then(FireValue::as_f64)
                .unwrap_or(0.0),
            company: fields.company.as_ref().and_then(FireValue::as_string),
            reporter: fields.reporter.as_ref().and_then(FireValue::as_string),
            status: fields
                .status
                .as_ref()
                .and_then(FireValue::as_string)
                .unwrap_or_default(),
            created_at: fields.created_at.as_ref().and_then(FireValue::as_i64),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Truncate a raw error body to at most 180 characters.
fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.error.and_then(|detail| detail.message) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_doc_json() -> &'static str {
        r#"{
            "name": "projects/road-infra/databases/(default)/documents/incidents/abc123",
            "fields": {
                "surface": {"doubleValue": 8.5},
                "budget": {"integerValue": "15000"},
                "latitude": {"doubleValue": -18.8792},
                "longitude": {"doubleValue": 47.5079},
                "company": {"stringValue": "Colas"},
                "status": {"stringValue": "en cours"},
                "created_at": {"integerValue": "1700000000000"}
            }
        }"#
    }

    #[test]
    fn test_decode_document() {
        let doc: FireDoc = serde_json::from_str(sample_doc_json()).unwrap();
        let incident = doc.into_incident();

        assert_eq!(incident.id.as_deref(), Some("abc123"));
        assert_eq!(incident.surface, 8.5);
        // integerValue decodes into the numeric field.
        assert_eq!(incident.budget, 15_000.0);
        assert_eq!(incident.status, "en cours");
        assert_eq!(incident.created_at, Some(1_700_000_000_000));
        assert!(incident.reporter.is_none());
    }

    #[test]
    fn test_encode_document_skips_absent_fields() {
        let incident = IncidentDocument {
            id: None,
            surface: 8.5,
            budget: 15_000.0,
            latitude: -18.8792,
            longitude: 47.5079,
            company: None,
            reporter: None,
            status: "nouveau".to_string(),
            created_at: None,
        };

        let json = serde_json::to_value(FireDoc::from_incident(&incident)).unwrap();
        let fields = &json["fields"];
        assert!(fields.get("company").is_none());
        assert!(fields.get("created_at").is_none());
        assert_eq!(fields["status"]["stringValue"], "nouveau");
        assert_eq!(fields["surface"]["doubleValue"], 8.5);
    }

    #[test]
    fn test_parse_api_error_structured() {
        let body = r#"{"error": {"code": 403, "message": "Missing or insufficient permissions.", "status": "PERMISSION_DENIED"}}"#;
        let message = parse_api_error(StatusCode::FORBIDDEN, body);
        assert_eq!(message, "Missing or insufficient permissions. (403)");
    }

    #[test]
    fn test_parse_api_error_plain() {
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, ""),
            "HTTP 502"
        );
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, "upstream down"),
            "upstream down (502)"
        );
    }
}
