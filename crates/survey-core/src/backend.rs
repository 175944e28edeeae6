//! Storage backend client: the external collaborator persisting entities.
//!
//! The engine only needs four generic operations over the six entity kinds,
//! so the seam is a small async trait. [`HttpBackend`] implements it over
//! the REST API; [`InMemoryBackend`] keeps records in process memory for
//! tests and local development (`backend_mode = "mock"`).
//!
//! Contract notes:
//! - `list` takes filter parameters so lookups by natural key are targeted
//!   queries, never a full-table fetch filtered client-side.
//! - a `name` filter is matched case-insensitively by the backend.
//! - a duplicate-key create surfaces as a 409 status, which callers treat
//!   as "the row already exists".

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::BackendError;

/// Entity kinds the survey conversation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Enterprise,
    Respondent,
    Survey,
    Question,
    SurveyAnswer,
    SoftwareCategory,
}

impl EntityKind {
    /// REST collection path for this kind.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Enterprise => "/enterprises",
            Self::Respondent => "/respondents",
            Self::Survey => "/surveys",
            Self::Question => "/questions",
            Self::SurveyAnswer => "/survey-answers",
            Self::SoftwareCategory => "/software-categories",
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Enterprise => "enterprise",
            Self::Respondent => "respondent",
            Self::Survey => "survey",
            Self::Question => "question",
            Self::SurveyAnswer => "survey_answer",
            Self::SoftwareCategory => "software_category",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Async seam to the storage backend.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn create(&self, kind: EntityKind, payload: Value) -> Result<Value, BackendError>;

    async fn get(&self, kind: EntityKind, id: i64) -> Result<Value, BackendError>;

    /// Lists records of `kind` matching all `filter` key/value pairs.
    async fn list(
        &self,
        kind: EntityKind,
        filter: &[(&str, String)],
    ) -> Result<Vec<Value>, BackendError>;

    async fn update(
        &self,
        kind: EntityKind,
        id: i64,
        payload: Value,
    ) -> Result<Value, BackendError>;
}

/// Extracts the surrogate id from a backend record.
pub fn record_id(kind: EntityKind, record: &Value) -> Result<i64, BackendError> {
    record
        .get("id")
        .and_then(Value::as_i64)
        .ok_or(BackendError::MalformedRecord { kind, field: "id" })
}

/// Backend client over the REST API.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, kind: EntityKind) -> String {
        format!("{}{}", self.base_url, kind.path())
    }

    async fn read_ok(
        kind: EntityKind,
        response: reqwest::Response,
    ) -> Result<Value, BackendError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%kind, status = status.as_u16(), %body, "backend call failed");
            return Err(BackendError::Status {
                kind,
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn create(&self, kind: EntityKind, payload: Value) -> Result<Value, BackendError> {
        let response = self.client.post(self.url(kind)).json(&payload).send().await?;
        Self::read_ok(kind, response).await
    }

    async fn get(&self, kind: EntityKind, id: i64) -> Result<Value, BackendError> {
        let response = self
            .client
            .get(format!("{}/{}", self.url(kind), id))
            .send()
            .await?;
        Self::read_ok(kind, response).await
    }

    async fn list(
        &self,
        kind: EntityKind,
        filter: &[(&str, String)],
    ) -> Result<Vec<Value>, BackendError> {
        let response = self
            .client
            .get(self.url(kind))
            .query(filter)
            .send()
            .await?;
        let value = Self::read_ok(kind, response).await?;
        match value {
            Value::Array(items) => Ok(items),
            // Single-record endpoints answer with an object.
            other => Ok(vec![other]),
        }
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: i64,
        payload: Value,
    ) -> Result<Value, BackendError> {
        let response = self
            .client
            .put(format!("{}/{}", self.url(kind), id))
            .json(&payload)
            .send()
            .await?;
        Self::read_ok(kind, response).await
    }
}

/// In-memory backend with sequential ids and the same natural-key behavior
/// the real API enforces: `question.number` is unique (duplicate create
/// answers 409) and `name` filters match case-insensitively.
#[derive(Default)]
pub struct InMemoryBackend {
    inner: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    records: HashMap<EntityKind, Vec<Value>>,
    next_id: i64,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records of `kind`, for assertions in tests.
    pub fn records(&self, kind: EntityKind) -> Vec<Value> {
        self.inner
            .lock()
            .expect("backend mutex")
            .records
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    fn field_matches(record: &Value, key: &str, expected: &str) -> bool {
        match record.get(key) {
            Some(Value::String(s)) if key == "name" => s.to_lowercase() == expected.to_lowercase(),
            Some(Value::String(s)) => s == expected,
            Some(other) => other.to_string() == expected,
            None => false,
        }
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn create(&self, kind: EntityKind, payload: Value) -> Result<Value, BackendError> {
        let mut state = self.inner.lock().expect("backend mutex");
        if kind == EntityKind::Question {
            let number = payload.get("number").cloned().unwrap_or(Value::Null);
            let exists = state
                .records
                .get(&kind)
                .map(|rows| rows.iter().any(|r| r.get("number") == Some(&number)))
                .unwrap_or(false);
            if exists {
                return Err(BackendError::Status {
                    kind,
                    status: 409,
                    body: format!("question number {number} already exists"),
                });
            }
        }
        state.next_id += 1;
        let id = state.next_id;
        let mut record = payload;
        record["id"] = Value::from(id);
        state.records.entry(kind).or_default().push(record.clone());
        Ok(record)
    }

    async fn get(&self, kind: EntityKind, id: i64) -> Result<Value, BackendError> {
        let state = self.inner.lock().expect("backend mutex");
        state
            .records
            .get(&kind)
            .and_then(|rows| {
                rows.iter()
                    .find(|r| r.get("id").and_then(Value::as_i64) == Some(id))
            })
            .cloned()
            .ok_or(BackendError::Status {
                kind,
                status: 404,
                body: format!("{kind} {id} not found"),
            })
    }

    async fn list(
        &self,
        kind: EntityKind,
        filter: &[(&str, String)],
    ) -> Result<Vec<Value>, BackendError> {
        let state = self.inner.lock().expect("backend mutex");
        Ok(state
            .records
            .get(&kind)
            .map(|rows| {
                rows.iter()
                    .filter(|r| filter.iter().all(|(k, v)| Self::field_matches(r, k, v)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: i64,
        payload: Value,
    ) -> Result<Value, BackendError> {
        let mut state = self.inner.lock().expect("backend mutex");
        let rows = state.records.entry(kind).or_default();
        let record = rows
            .iter_mut()
            .find(|r| r.get("id").and_then(Value::as_i64) == Some(id))
            .ok_or(BackendError::Status {
                kind,
                status: 404,
                body: format!("{kind} {id} not found"),
            })?;
        if let (Value::Object(target), Value::Object(fields)) = (&mut *record, payload) {
            for (k, v) in fields {
                target.insert(k, v);
            }
        }
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_assigns_ids_and_list_filters() {
        let backend = InMemoryBackend::new();
        let a = backend
            .create(EntityKind::Question, json!({"text": "q1", "number": 1}))
            .await
            .unwrap();
        let b = backend
            .create(EntityKind::Question, json!({"text": "q2", "number": 2}))
            .await
            .unwrap();
        assert_ne!(a["id"], b["id"]);

        let found = backend
            .list(EntityKind::Question, &[("number", "2".to_string())])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["text"], "q2");
    }

    #[tokio::test]
    async fn duplicate_question_number_conflicts() {
        let backend = InMemoryBackend::new();
        backend
            .create(EntityKind::Question, json!({"text": "q", "number": 3}))
            .await
            .unwrap();
        let err = backend
            .create(EntityKind::Question, json!({"text": "q again", "number": 3}))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn name_filter_is_case_insensitive() {
        let backend = InMemoryBackend::new();
        backend
            .create(EntityKind::SoftwareCategory, json!({"name": "ERP-системы"}))
            .await
            .unwrap();
        let found = backend
            .list(
                EntityKind::SoftwareCategory,
                &[("name", "erp-системы".to_string())],
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let backend = InMemoryBackend::new();
        let record = backend
            .create(EntityKind::Enterprise, json!({"name": "Acme", "inn": ""}))
            .await
            .unwrap();
        let id = record_id(EntityKind::Enterprise, &record).unwrap();
        let updated = backend
            .update(
                EntityKind::Enterprise,
                id,
                json!({"inn": "1234567890"}),
            )
            .await
            .unwrap();
        assert_eq!(updated["name"], "Acme");
        assert_eq!(updated["inn"], "1234567890");
    }
}
