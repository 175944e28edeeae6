//! survey-core: conversation engine for the enterprise feedback survey.
//!
//! The static dialogue graph, per-user sessions, free-text validation,
//! idempotent entity resolution against the storage backend, and PII
//! encryption live here; the gateway crate only wires the engine to HTTP.

mod backend;
mod config;
mod crypto;
mod dialogue;
mod engine;
mod error;
mod resolver;
mod session;
mod validate;

pub use backend::{record_id, Backend, EntityKind, HttpBackend, InMemoryBackend};
pub use config::SurveyConfig;
pub use crypto::PiiCipher;
pub use dialogue::{DialogueGraph, Node, Opt, PainPoint, Prompt, QuestionDef, StateId, PAIN_POINTS, PAGE_SIZE};
pub use engine::ConversationEngine;
pub use error::{BackendError, CryptoError, EngineError, ValidationError};
pub use resolver::EntityResolver;
pub use session::{Session, SessionStore};
pub use validate::Field;
