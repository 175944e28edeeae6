//! Idempotent entity resolution against the storage backend.
//!
//! Questions, enterprises and software categories all have natural keys
//! (question number, tax id or name, category name). Resolution is
//! lookup-first: a targeted filtered query, then create only on a miss.
//! A create that loses a race surfaces as a 409 conflict and is settled by
//! re-reading, so two concurrent turns converge on the same row and
//! re-running a survey never duplicates reference data.

use serde_json::json;
use std::sync::Arc;

use crate::backend::{record_id, Backend, EntityKind};
use crate::dialogue::QuestionDef;
use crate::error::BackendError;

/// Resolves natural-keyed entities to backend ids.
pub struct EntityResolver {
    backend: Arc<dyn Backend>,
}

impl EntityResolver {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Resolves a canonical question by its number, creating it on first
    /// use. A create conflict means another turn created it first; the
    /// winner's row is re-read and returned.
    pub async fn resolve_question(&self, question: &QuestionDef) -> Result<i64, BackendError> {
        let number = question.number.to_string();
        if let Some(id) = self.find_question(&number).await? {
            return Ok(id);
        }
        let payload = json!({
            "text": question.text,
            "number": question.number,
            "answer_type": "string",
        });
        match self.backend.create(EntityKind::Question, payload).await {
            Ok(record) => record_id(EntityKind::Question, &record),
            Err(err) if err.is_conflict() => {
                self.find_question(&number)
                    .await?
                    .ok_or(BackendError::MalformedRecord {
                        kind: EntityKind::Question,
                        field: "id",
                    })
            }
            Err(err) => Err(err),
        }
    }

    async fn find_question(&self, number: &str) -> Result<Option<i64>, BackendError> {
        let hits = self
            .backend
            .list(EntityKind::Question, &[("number", number.to_string())])
            .await?;
        hits.first()
            .map(|record| record_id(EntityKind::Question, record))
            .transpose()
    }

    /// Resolves an enterprise by tax id when one was given, by name
    /// otherwise. An existing row found by name gains the tax id if it was
    /// missing; a miss creates the row.
    pub async fn resolve_enterprise(&self, name: &str, inn: &str) -> Result<i64, BackendError> {
        if !inn.is_empty() {
            let hits = self
                .backend
                .list(EntityKind::Enterprise, &[("inn", inn.to_string())])
                .await?;
            if let Some(record) = hits.first() {
                return record_id(EntityKind::Enterprise, record);
            }
        }
        let hits = self
            .backend
            .list(EntityKind::Enterprise, &[("name", name.to_string())])
            .await?;
        if let Some(record) = hits.first() {
            let id = record_id(EntityKind::Enterprise, record)?;
            let stored_inn = record.get("inn").and_then(|v| v.as_str()).unwrap_or("");
            if !inn.is_empty() && stored_inn.is_empty() {
                self.backend
                    .update(EntityKind::Enterprise, id, json!({ "inn": inn }))
                    .await?;
            }
            return Ok(id);
        }
        let record = self
            .backend
            .create(
                EntityKind::Enterprise,
                json!({ "name": name, "inn": inn, "short_name": "none" }),
            )
            .await?;
        record_id(EntityKind::Enterprise, &record)
    }

    /// Resolves a software category by case-insensitive name, creating it
    /// on a miss.
    pub async fn resolve_software_category(&self, name: &str) -> Result<i64, BackendError> {
        let hits = self
            .backend
            .list(EntityKind::SoftwareCategory, &[("name", name.to_string())])
            .await?;
        if let Some(record) = hits.first() {
            return record_id(EntityKind::SoftwareCategory, record);
        }
        let record = self
            .backend
            .create(EntityKind::SoftwareCategory, json!({ "name": name }))
            .await?;
        record_id(EntityKind::SoftwareCategory, &record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::dialogue::QuestionDef;

    const QUESTION: QuestionDef = QuestionDef {
        number: 3,
        text: "3. Что является главным барьером для перехода на отечественное ПО?",
    };

    fn resolver_with_backend() -> (EntityResolver, Arc<InMemoryBackend>) {
        let backend = Arc::new(InMemoryBackend::new());
        (EntityResolver::new(backend.clone()), backend)
    }

    #[tokio::test]
    async fn question_resolution_is_idempotent() {
        let (resolver, backend) = resolver_with_backend();
        let first = resolver.resolve_question(&QUESTION).await.unwrap();
        let second = resolver.resolve_question(&QUESTION).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.records(EntityKind::Question).len(), 1);
    }

    #[tokio::test]
    async fn question_create_conflict_settles_by_reread() {
        let (resolver, backend) = resolver_with_backend();
        // Another turn wins the create race.
        let existing = backend
            .create(
                EntityKind::Question,
                json!({ "text": QUESTION.text, "number": QUESTION.number, "answer_type": "string" }),
            )
            .await
            .unwrap();
        let resolved = resolver.resolve_question(&QUESTION).await.unwrap();
        assert_eq!(resolved, record_id(EntityKind::Question, &existing).unwrap());
    }

    #[tokio::test]
    async fn enterprise_prefers_tax_id_over_name() {
        let (resolver, backend) = resolver_with_backend();
        let by_inn = backend
            .create(
                EntityKind::Enterprise,
                json!({ "name": "Старое имя", "inn": "1234567890", "short_name": "none" }),
            )
            .await
            .unwrap();
        let id = resolver
            .resolve_enterprise("Совсем другое имя", "1234567890")
            .await
            .unwrap();
        assert_eq!(id, record_id(EntityKind::Enterprise, &by_inn).unwrap());
        assert_eq!(backend.records(EntityKind::Enterprise).len(), 1);
    }

    #[tokio::test]
    async fn enterprise_found_by_name_gains_missing_tax_id() {
        let (resolver, backend) = resolver_with_backend();
        backend
            .create(
                EntityKind::Enterprise,
                json!({ "name": "ООО Ромашка", "inn": "", "short_name": "none" }),
            )
            .await
            .unwrap();
        let id = resolver
            .resolve_enterprise("ооо ромашка", "1234567890")
            .await
            .unwrap();
        let records = backend.records(EntityKind::Enterprise);
        assert_eq!(records.len(), 1);
        assert_eq!(record_id(EntityKind::Enterprise, &records[0]).unwrap(), id);
        assert_eq!(records[0]["inn"], "1234567890");
    }

    #[tokio::test]
    async fn enterprise_miss_creates_row() {
        let (resolver, backend) = resolver_with_backend();
        let id = resolver
            .resolve_enterprise("ООО Ромашка", "1234567890")
            .await
            .unwrap();
        let records = backend.records(EntityKind::Enterprise);
        assert_eq!(records.len(), 1);
        assert_eq!(record_id(EntityKind::Enterprise, &records[0]).unwrap(), id);
        assert_eq!(records[0]["short_name"], "none");
    }

    #[tokio::test]
    async fn software_category_matches_case_insensitively() {
        let (resolver, backend) = resolver_with_backend();
        let first = resolver
            .resolve_software_category("ERP-системы")
            .await
            .unwrap();
        let second = resolver
            .resolve_software_category("erp-системы")
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.records(EntityKind::SoftwareCategory).len(), 1);
    }
}
