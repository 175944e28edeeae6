//! Conversation engine: drives one questionnaire turn per inbound event.
//!
//! A turn takes the user's input (a button token, free text, or a command),
//! applies it to that user's session and answers with the next [`Prompt`].
//! Backend side effects run before any session mutation, so a failed turn
//! leaves the session exactly where it was and the user can simply retry.
//! The engine never returns an error to the transport: internal failures
//! are logged and surfaced to the user as a retry message over the current
//! prompt.

use serde_json::json;
use std::sync::Arc;

use crate::backend::{record_id, Backend, EntityKind};
use crate::crypto::PiiCipher;
use crate::dialogue::{
    DialogueGraph, Prompt, QuestionDef, StateId, TOKEN_BACK, TOKEN_CHOOSE, TOKEN_NEXT, TOKEN_OTHER,
    TOKEN_PREV,
};
use crate::error::EngineError;
use crate::resolver::EntityResolver;
use crate::session::{Session, SessionStore};
use crate::validate::Field;

const HINT_START: &str = "Для начала опроса отправьте команду /start.";
const HINT_BUTTONS: &str = "Пожалуйста, используйте кнопки для ответа.";
const HINT_NO_BACK: &str = "Возврат невозможен: вы в начале опроса.";
const HINT_RETRY: &str = "Произошла ошибка. Пожалуйста, попробуйте ещё раз.";

pub struct ConversationEngine {
    sessions: SessionStore,
    backend: Arc<dyn Backend>,
    resolver: EntityResolver,
    cipher: PiiCipher,
}

impl ConversationEngine {
    pub fn new(backend: Arc<dyn Backend>, cipher: PiiCipher) -> Self {
        Self {
            sessions: SessionStore::new(),
            resolver: EntityResolver::new(backend.clone()),
            backend,
            cipher,
        }
    }

    /// Number of live sessions, for health reporting.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Processes one inbound event and returns the prompt to show. Turns
    /// for the same user are serialized on the session lock; different
    /// users proceed in parallel.
    pub async fn handle_event(&self, user_id: i64, input: &str) -> Prompt {
        let input = input.trim();

        if input == "/start" {
            self.sessions.reset(user_id);
            tracing::info!(user_id, "survey started");
            return DialogueGraph::render(StateId::Consent, None);
        }
        if input == "/cancel" {
            if self.sessions.contains(user_id) {
                self.sessions.remove(user_id);
                tracing::info!(user_id, "survey cancelled");
                return DialogueGraph::render(StateId::Cancelled, None);
            }
            return Prompt {
                text: HINT_START.to_string(),
                options: Vec::new(),
                allow_back: false,
                finished: false,
            };
        }
        if !self.sessions.contains(user_id) {
            return Prompt {
                text: HINT_START.to_string(),
                options: Vec::new(),
                allow_back: false,
                finished: false,
            };
        }

        let handle = self.sessions.get_or_create(user_id);
        let mut session = handle.lock().await;
        match self.advance(user_id, &mut session, input).await {
            Ok(prompt) => {
                if prompt.finished {
                    drop(session);
                    self.sessions.remove(user_id);
                }
                prompt
            }
            Err(EngineError::InvalidTransition { state, token }) => {
                tracing::warn!(user_id, ?state, token, "input does not fit the current node");
                self.reprompt(&session, HINT_BUTTONS)
            }
            Err(EngineError::EmptyHistory) => self.reprompt(&session, HINT_NO_BACK),
            Err(err) => {
                tracing::error!(user_id, error = %err, "turn aborted, session unchanged");
                self.reprompt(&session, HINT_RETRY)
            }
        }
    }

    async fn advance(
        &self,
        user_id: i64,
        session: &mut Session,
        input: &str,
    ) -> Result<Prompt, EngineError> {
        let state = session.current_state;
        let node = DialogueGraph::node(state);

        if input == TOKEN_BACK {
            let previous = session.pop_history().ok_or(EngineError::EmptyHistory)?;
            session.current_state = previous;
            session.page_cursor = None;
            return Ok(self.render_current(session));
        }

        // Paging never moves the dialogue forward and never touches history.
        if node.paged {
            match input {
                TOKEN_CHOOSE => {
                    session.page_cursor = Some(0);
                    return Ok(self.render_current(session));
                }
                TOKEN_NEXT => {
                    let page = session.page_cursor.unwrap_or(0);
                    session.page_cursor = Some((page + 1).min(DialogueGraph::last_page(node)));
                    return Ok(self.render_current(session));
                }
                TOKEN_PREV => {
                    let page = session.page_cursor.unwrap_or(0);
                    session.page_cursor = Some(page.saturating_sub(1));
                    return Ok(self.render_current(session));
                }
                _ => {}
            }
        }

        if let Some(field) = node.field {
            self.accept_text(user_id, session, field, input).await
        } else {
            self.accept_token(user_id, session, input).await
        }
    }

    /// Free-text input: validate, run side effects, then commit and move on.
    async fn accept_text(
        &self,
        user_id: i64,
        session: &mut Session,
        field: Field,
        input: &str,
    ) -> Result<Prompt, EngineError> {
        let state = session.current_state;
        let node = DialogueGraph::node(state);

        let value = match field.validate(input) {
            Ok(value) => value,
            Err(rejection) => return Ok(self.reprompt(session, &rejection.message)),
        };

        // PII is encrypted at rest in the session.
        let stored = match field {
            Field::Phone | Field::Email => self.cipher.encrypt(&value)?,
            _ => value.clone(),
        };

        let mut enterprise_id = None;
        let mut registration = None;
        match state {
            StateId::CompanyInn => {
                let name = session
                    .answers
                    .get("company_name")
                    .cloned()
                    .unwrap_or_default();
                enterprise_id = Some(self.resolver.resolve_enterprise(&name, &value).await?);
            }
            StateId::Email => {
                registration = Some(self.register_respondent(user_id, session, &value).await?);
            }
            _ => {}
        }

        if let Some(question) = node.question {
            let answer = if node.other_prefix {
                format!("other: {value}")
            } else {
                value.clone()
            };
            self.persist_answer(user_id, session, &question, &answer)
                .await?;
        }

        let mut category_id = None;
        if state == StateId::SoftwareClassesDetails {
            category_id = Some(self.resolver.resolve_software_category(&value).await?);
        }

        if let Some(key) = node.answer_key {
            session.answers.insert(key.to_string(), stored);
        }
        if let Some(id) = enterprise_id {
            session.enterprise_id = Some(id);
        }
        if let Some((respondent_id, survey_id)) = registration {
            session.respondent_id = Some(respondent_id);
            session.survey_id = Some(survey_id);
        }
        if let Some(id) = category_id {
            self.tag_survey_category(session, id).await?;
            session.software_category_id = Some(id);
        }

        let target = node.text_next.ok_or_else(|| EngineError::InvalidTransition {
            state,
            token: input.to_string(),
        })?;
        self.enter(session, state, target);
        Ok(self.render_current(session))
    }

    /// Button token: transition, persist where this node owns the answer.
    async fn accept_token(
        &self,
        user_id: i64,
        session: &mut Session,
        token: &str,
    ) -> Result<Prompt, EngineError> {
        let state = session.current_state;
        let node = DialogueGraph::node(state);
        let target = DialogueGraph::next_state(state, token)?;

        // When the target collects details for the same question, the
        // detail node persists the answer; persisting here too would
        // duplicate the row.
        let question_here = match (node.question, DialogueGraph::node(target).question) {
            (Some(own), Some(detail)) if own.number == detail.number => None,
            (own, _) => own,
        };
        if let Some(question) = question_here {
            self.persist_answer(user_id, session, &question, token)
                .await?;
        }

        let mut category_id = None;
        if state == StateId::SoftwareClasses && token != TOKEN_OTHER {
            if let Some(label) = DialogueGraph::option_label(state, token) {
                category_id = Some(self.resolver.resolve_software_category(label).await?);
            }
        }

        if state == StateId::PainPointsSelection {
            if let Some(label) = DialogueGraph::option_label(state, token) {
                session.pain_points.push(label.to_string());
            }
        }
        if let Some(key) = node.answer_key {
            session.answers.insert(key.to_string(), token.to_string());
        }
        if let Some(id) = category_id {
            self.tag_survey_category(session, id).await?;
            session.software_category_id = Some(id);
        }

        self.enter(session, state, target);
        Ok(self.render_current(session))
    }

    fn enter(&self, session: &mut Session, from: StateId, target: StateId) {
        session.push_history(from);
        session.current_state = target;
        session.page_cursor = None;
    }

    /// Creates the respondent and opens the survey once contact collection
    /// is complete. PII leaves the session decrypted only here.
    async fn register_respondent(
        &self,
        user_id: i64,
        session: &Session,
        email: &str,
    ) -> Result<(i64, i64), EngineError> {
        let phone_cipher = session
            .answers
            .get("phone_number")
            .map(String::as_str)
            .unwrap_or("");
        let phone = self.cipher.decrypt(phone_cipher)?;

        let respondent = self
            .backend
            .create(
                EntityKind::Respondent,
                json!({
                    "full_name": session.answers.get("full_name").map(String::as_str).unwrap_or(""),
                    "position": session.answers.get("position").map(String::as_str).unwrap_or(""),
                    "phone": phone,
                    "email": email,
                    "enterprise_id": session.enterprise_id,
                }),
            )
            .await?;
        let respondent_id = record_id(EntityKind::Respondent, &respondent)?;

        let survey = self
            .backend
            .create(
                EntityKind::Survey,
                json!({
                    "title": format!("Survey for user {user_id}"),
                    "respondent_id": respondent_id,
                    "started_at": chrono::Utc::now().to_rfc3339(),
                    "ip_address": "unknown",
                    "user_agent": "unknown",
                }),
            )
            .await?;
        let survey_id = record_id(EntityKind::Survey, &survey)?;
        tracing::info!(user_id, respondent_id, survey_id, "survey opened");
        Ok((respondent_id, survey_id))
    }

    async fn persist_answer(
        &self,
        user_id: i64,
        session: &mut Session,
        question: &QuestionDef,
        value: &str,
    ) -> Result<(), EngineError> {
        let Some(survey_id) = session.survey_id else {
            // Unreachable through the graph: every question node sits after
            // contact collection.
            tracing::warn!(user_id, state = ?session.current_state, "no open survey, answer dropped");
            return Ok(());
        };
        let question_id = self.resolver.resolve_question(question).await?;
        session.question_id = Some(question_id);
        self.backend
            .create(
                EntityKind::SurveyAnswer,
                json!({
                    "survey_id": survey_id,
                    "question_id": question_id,
                    "answer": { "value": value },
                }),
            )
            .await?;
        Ok(())
    }

    async fn tag_survey_category(
        &self,
        session: &Session,
        category_id: i64,
    ) -> Result<(), EngineError> {
        if let Some(survey_id) = session.survey_id {
            self.backend
                .update(
                    EntityKind::Survey,
                    survey_id,
                    json!({ "software_category_id": category_id }),
                )
                .await?;
        }
        Ok(())
    }

    fn render_current(&self, session: &Session) -> Prompt {
        let mut prompt = DialogueGraph::render(session.current_state, session.page_cursor);
        prompt.allow_back = !prompt.finished && !session.history_is_empty();
        prompt
    }

    fn reprompt(&self, session: &Session, message: &str) -> Prompt {
        let mut prompt = self.render_current(session);
        prompt.text = format!("{message}\n\n{}", prompt.text);
        prompt
    }
}
