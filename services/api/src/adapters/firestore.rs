//! services/api/src/adapters/firestore.rs
//!
//! This module contains the Firestore adapter, which is the concrete
//! implementation of the `StoreService` port from the `core` crate. It talks
//! to the Firestore REST API: document reads and writes for the `users` and
//! `profiles` collections, and `:runQuery` for per-user `breathingSessions`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value as Json};
use vital_core::domain::{BreathingSession, Profile};
use vital_core::ports::{PortError, PortResult, StoreService};

use crate::adapters::google_token::TokenProvider;

const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";

const USERS: &str = "users";
const PROFILES: &str = "profiles";
const BREATHING_SESSIONS: &str = "breathingSessions";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A Firestore adapter that implements the `StoreService` port.
pub struct FirestoreAdapter {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    tokens: Arc<dyn TokenProvider>,
}

impl FirestoreAdapter {
    /// Creates a new `FirestoreAdapter`.
    pub fn new(http: reqwest::Client, project_id: String, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            project_id,
            tokens,
        }
    }

    /// Points the adapter at an emulator or mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn documents_root(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents",
            self.base_url, self.project_id
        )
    }

    async fn bearer(&self) -> PortResult<String> {
        self.tokens.bearer_token().await
    }

    /// GET one document; 404 becomes `PortError::NotFound`.
    async fn get_document(&self, collection: &str, id: &str) -> PortResult<wire::Document> {
        let url = format!("{}/{}/{}", self.documents_root(), collection, id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.bearer().await?)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PortError::NotFound(format!(
                "{}/{} not found",
                collection, id
            )));
        }
        if !response.status().is_success() {
            return Err(PortError::Unexpected(format!(
                "Firestore GET {} returned {}",
                url,
                response.status()
            )));
        }
        response
            .json::<wire::Document>()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    /// PATCH a document. Without a mask this is a full overwrite (`.set`);
    /// with a mask only the named fields are touched (`.update` / merge).
    async fn patch_document(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Json>,
        mask: Option<&[&str]>,
    ) -> PortResult<()> {
        let url = format!("{}/{}/{}", self.documents_root(), collection, id);
        let mut request = self
            .http
            .patch(&url)
            .bearer_auth(self.bearer().await?)
            .json(&json!({ "fields": wire::fields_from_json(fields) }));
        if let Some(paths) = mask {
            let pairs: Vec<(&str, &str)> = paths
                .iter()
                .map(|p| ("updateMask.fieldPaths", *p))
                .collect();
            request = request.query(&pairs);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PortError::NotFound(format!(
                "{}/{} not found",
                collection, id
            )));
        }
        if !response.status().is_success() {
            return Err(PortError::Unexpected(format!(
                "Firestore PATCH {} returned {}",
                url,
                response.status()
            )));
        }
        Ok(())
    }

    fn server_timestamp() -> Json {
        Json::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

//=========================================================================================
// Wire Format: Firestore Values <-> JSON
//=========================================================================================

/// The Firestore REST value model and its conversion to plain JSON. Only the
/// value kinds this app actually stores are covered.
mod wire {
    use serde::{Deserialize, Serialize};
    use serde_json::{Map, Number, Value as Json};
    use std::collections::BTreeMap;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Document {
        pub name: String,
        #[serde(default)]
        pub fields: BTreeMap<String, Value>,
    }

    impl Document {
        /// The document id: the last segment of the resource name.
        pub fn id(&self) -> &str {
            self.name.rsplit('/').next().unwrap_or(&self.name)
        }

        /// Flattens the document into a plain JSON object.
        pub fn to_json(&self) -> Map<String, Json> {
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect()
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Value {
        #[serde(flatten)]
        pub value_type: ValueType,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub enum ValueType {
        StringValue(String),
        // Firestore sends integers as strings
        IntegerValue(String),
        DoubleValue(f64),
        BooleanValue(bool),
        TimestampValue(String),
        ReferenceValue(String),
        NullValue(()),
        ArrayValue(ArrayValue),
        MapValue(MapValue),
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ArrayValue {
        #[serde(default)]
        pub values: Vec<Value>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MapValue {
        #[serde(default)]
        pub fields: BTreeMap<String, Value>,
    }

    impl Value {
        pub fn from_json(v: &Json) -> Value {
            let value_type = match v {
                Json::Null => ValueType::NullValue(()),
                Json::Bool(b) => ValueType::BooleanValue(*b),
                Json::Number(n) => match n.as_i64() {
                    Some(i) => ValueType::IntegerValue(i.to_string()),
                    None => ValueType::DoubleValue(n.as_f64().unwrap_or(0.0)),
                },
                Json::String(s) => ValueType::StringValue(s.clone()),
                Json::Array(items) => ValueType::ArrayValue(ArrayValue {
                    values: items.iter().map(Value::from_json).collect(),
                }),
                Json::Object(map) => ValueType::MapValue(MapValue {
                    fields: map
                        .iter()
                        .map(|(k, v)| (k.clone(), Value::from_json(v)))
                        .collect(),
                }),
            };
            Value { value_type }
        }

        pub fn to_json(&self) -> Json {
            match &self.value_type {
                ValueType::StringValue(s) => Json::String(s.clone()),
                ValueType::IntegerValue(s) => s
                    .parse::<i64>()
                    .map(|i| Json::Number(i.into()))
                    .unwrap_or_else(|_| Json::String(s.clone())),
                ValueType::DoubleValue(f) => Number::from_f64(*f)
                    .map(Json::Number)
                    .unwrap_or(Json::Null),
                ValueType::BooleanValue(b) => Json::Bool(*b),
                ValueType::TimestampValue(s) | ValueType::ReferenceValue(s) => {
                    Json::String(s.clone())
                }
                ValueType::NullValue(()) => Json::Null,
                ValueType::ArrayValue(arr) => {
                    Json::Array(arr.values.iter().map(Value::to_json).collect())
                }
                ValueType::MapValue(map) => Json::Object(
                    map.fields
                        .iter()
                        .map(|(k, v)| (k.clone(), v.to_json()))
                        .collect(),
                ),
            }
        }
    }

    pub fn fields_from_json(map: &Map<String, Json>) -> BTreeMap<String, Value> {
        map.iter()
            .map(|(k, v)| (k.clone(), Value::from_json(v)))
            .collect()
    }

    /// One element of a `:runQuery` response stream. Entries without a
    /// document (read-time markers) are skipped by the caller.
    #[derive(Debug, Deserialize)]
    pub struct QueryResult {
        #[serde(default)]
        pub document: Option<Document>,
    }

    #[derive(Debug, Deserialize)]
    pub struct DocumentList {
        #[serde(default)]
        pub documents: Vec<Document>,
        #[serde(default, rename = "nextPageToken")]
        pub next_page_token: Option<String>,
    }
}

//=========================================================================================
// `StoreService` Trait Implementation
//=========================================================================================

#[async_trait]
impl StoreService for FirestoreAdapter {
    async fn put_user_record(&self, uid: &str, email: &str) -> PortResult<()> {
        let mut fields = Map::new();
        fields.insert("email".to_string(), Json::String(email.to_string()));
        fields.insert("createdAt".to_string(), Self::server_timestamp());
        self.patch_document(USERS, uid, &fields, None).await
    }

    async fn mark_user_verified(&self, uid: &str) -> PortResult<()> {
        let mut fields = Map::new();
        fields.insert("verified".to_string(), Json::Bool(true));
        fields.insert("verifiedAt".to_string(), Self::server_timestamp());
        // Merge semantics: only these two fields are touched.
        self.patch_document(USERS, uid, &fields, Some(&["verified", "verifiedAt"]))
            .await
    }

    async fn set_profile(&self, uid: &str, mut data: Map<String, Json>) -> PortResult<()> {
        data.insert("uid".to_string(), Json::String(uid.to_string()));
        data.insert("createdAt".to_string(), Self::server_timestamp());
        // Full overwrite; the uid is the document id, one profile per user.
        self.patch_document(PROFILES, uid, &data, None).await
    }

    async fn update_profile(&self, uid: &str, mut data: Map<String, Json>) -> PortResult<()> {
        data.insert("updatedAt".to_string(), Self::server_timestamp());
        let paths: Vec<String> = data.keys().cloned().collect();
        let mask: Vec<&str> = paths.iter().map(String::as_str).collect();
        self.patch_document(PROFILES, uid, &data, Some(&mask)).await
    }

    async fn fetch_profile(&self, uid: &str) -> PortResult<Profile> {
        let document = self.get_document(PROFILES, uid).await?;
        let mut map = document.to_json();
        map.insert("uid".to_string(), Json::String(document.id().to_string()));
        serde_json::from_value(Json::Object(map))
            .map_err(|e| PortError::Unexpected(format!("malformed profile {}: {}", uid, e)))
    }

    async fn fetch_all_profiles(&self) -> PortResult<Vec<Profile>> {
        let mut profiles = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let url = format!("{}/{}", self.documents_root(), PROFILES);
            let mut request = self
                .http
                .get(&url)
                .bearer_auth(self.bearer().await?)
                .query(&[("pageSize", "300")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
            if !response.status().is_success() {
                return Err(PortError::Unexpected(format!(
                    "Firestore list {} returned {}",
                    url,
                    response.status()
                )));
            }
            let page: wire::DocumentList = response
                .json()
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;

            for document in &page.documents {
                let mut map = document.to_json();
                map.insert("uid".to_string(), Json::String(document.id().to_string()));
                let profile: Profile = serde_json::from_value(Json::Object(map)).map_err(|e| {
                    PortError::Unexpected(format!("malformed profile {}: {}", document.id(), e))
                })?;
                profiles.push(profile);
            }

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        Ok(profiles)
    }

    async fn save_breathing_session(&self, session: &BreathingSession) -> PortResult<String> {
        let mut fields = Map::new();
        fields.insert("uid".to_string(), Json::String(session.uid.clone()));
        if let Some(duration) = session.duration {
            if let Some(n) = serde_json::Number::from_f64(duration) {
                fields.insert("duration".to_string(), Json::Number(n));
            }
        }
        if let Some(timestamp) = &session.timestamp {
            fields.insert("timestamp".to_string(), Json::String(timestamp.clone()));
        }

        let url = format!("{}/{}", self.documents_root(), BREATHING_SESSIONS);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.bearer().await?)
            .json(&json!({ "fields": wire::fields_from_json(&fields) }))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PortError::Unexpected(format!(
                "Firestore create session returned {}",
                response.status()
            )));
        }
        let document: wire::Document = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(document.id().to_string())
    }

    async fn sessions_for_user(&self, uid: &str) -> PortResult<Vec<BreathingSession>> {
        let url = format!("{}:runQuery", self.documents_root());
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": BREATHING_SESSIONS }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": "uid" },
                        "op": "EQUAL",
                        "value": { "stringValue": uid },
                    }
                },
                "orderBy": [{
                    "field": { "fieldPath": "timestamp" },
                    "direction": "ASCENDING",
                }],
            }
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.bearer().await?)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PortError::Unexpected(format!(
                "Firestore runQuery returned {}",
                response.status()
            )));
        }

        let results: Vec<wire::QueryResult> = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let mut sessions = Vec::new();
        for result in results {
            let Some(document) = result.document else {
                continue;
            };
            let mut map = document.to_json();
            map.insert("id".to_string(), Json::String(document.id().to_string()));
            let session: BreathingSession =
                serde_json::from_value(Json::Object(map)).map_err(|e| {
                    PortError::Unexpected(format!("malformed session {}: {}", document.id(), e))
                })?;
            sessions.push(session);
        }
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::google_token::TokenProvider;
    use httpmock::prelude::*;

    struct StaticTokens;

    #[async_trait]
    impl TokenProvider for StaticTokens {
        async fn bearer_token(&self) -> PortResult<String> {
            Ok("test-bearer".to_string())
        }
    }

    fn adapter(server: &MockServer) -> FirestoreAdapter {
        FirestoreAdapter::new(
            reqwest::Client::new(),
            "demo-project".to_string(),
            Arc::new(StaticTokens),
        )
        .with_base_url(server.base_url())
    }

    const DOCS: &str = "/projects/demo-project/databases/(default)/documents";

    #[tokio::test]
    async fn fetch_profile_flattens_firestore_values() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(format!("{}/profiles/uid-1", DOCS));
            then.status(200).json_body(serde_json::json!({
                "name": "projects/demo-project/databases/(default)/documents/profiles/uid-1",
                "fields": {
                    "name": { "stringValue": "Asha" },
                    "age": { "integerValue": "42" },
                    "tobaccoTypes": { "arrayValue": { "values": [
                        { "stringValue": "Cigarettes" },
                        { "stringValue": "Other" },
                    ]}},
                },
            }));
        });

        let profile = adapter(&server).fetch_profile("uid-1").await.unwrap();
        assert_eq!(profile.uid, "uid-1");
        assert_eq!(profile.name.as_deref(), Some("Asha"));
        assert_eq!(profile.age.as_deref(), Some("42"));
        assert_eq!(profile.tobacco_types, vec!["Cigarettes", "Other"]);
    }

    #[tokio::test]
    async fn fetch_profile_maps_missing_document_to_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(format!("{}/profiles/ghost", DOCS));
            then.status(404).json_body(serde_json::json!({"error": {"code": 404}}));
        });

        let err = adapter(&server).fetch_profile("ghost").await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[tokio::test]
    async fn sessions_query_filters_by_uid_and_parses_documents() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(format!("{}:runQuery", DOCS))
                .body_contains("\"stringValue\":\"uid-1\"");
            then.status(200).json_body(serde_json::json!([
                { "document": {
                    "name": "projects/p/databases/(default)/documents/breathingSessions/s1",
                    "fields": {
                        "uid": { "stringValue": "uid-1" },
                        "duration": { "integerValue": "30" },
                        "timestamp": { "stringValue": "2024-01-01T00:00:00Z" },
                    },
                }},
                { "readTime": "2024-01-02T00:00:00Z" },
            ]));
        });

        let sessions = adapter(&server).sessions_for_user("uid-1").await.unwrap();
        mock.assert();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id.as_deref(), Some("s1"));
        assert_eq!(sessions[0].duration, Some(30.0));
    }

    #[tokio::test]
    async fn update_profile_sends_a_field_mask() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::PATCH)
                .path(format!("{}/profiles/uid-1", DOCS))
                .query_param("updateMask.fieldPaths", "phone");
            then.status(200).json_body(serde_json::json!({
                "name": "projects/p/databases/(default)/documents/profiles/uid-1",
                "fields": {},
            }));
        });

        let mut data = Map::new();
        data.insert("phone".to_string(), Json::String("12345".to_string()));
        adapter(&server).update_profile("uid-1", data).await.unwrap();
        mock.assert();
    }
}
