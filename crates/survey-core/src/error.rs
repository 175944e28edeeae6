//! Error taxonomy for the conversation engine.
//!
//! Validation failures are recovered locally (the engine reprompts), so
//! [`ValidationError`] carries the user-facing guidance. Everything else is
//! reported through [`EngineError`]: transition errors mean the inbound token
//! did not fit the current node, backend errors mean an entity lookup/create
//! or answer persist failed, and empty-history errors mean "back" was pressed
//! at the start of the survey.

use thiserror::Error;

use crate::backend::EntityKind;
use crate::dialogue::StateId;

/// Rejection of free-text user input. The message is shown to the user
/// verbatim together with a reprompt; the session is not changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure of a call to the storage backend collaborator.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The HTTP request itself failed (connect, timeout, body decode).
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("backend returned {status} for {kind}: {body}")]
    Status {
        kind: EntityKind,
        status: u16,
        body: String,
    },

    /// The backend answered 2xx but the record is missing a required field.
    #[error("backend record for {kind} is missing `{field}`")]
    MalformedRecord {
        kind: EntityKind,
        field: &'static str,
    },
}

impl BackendError {
    /// True when the failure is a duplicate-key conflict, which entity
    /// resolution treats as "the row already exists".
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Status { status: 409, .. })
    }
}

/// Failure of a PII encrypt/decrypt operation.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("ciphertext is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("ciphertext is truncated")]
    Truncated,
    #[error("encryption or decryption failed")]
    Cipher,
    #[error("PII key must be 32 bytes, got {0}")]
    BadKeyLength(usize),
}

/// Errors surfaced by a conversation turn.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The inbound token is not valid for the current node. Treated as an
    /// internal-consistency failure: logged, generic message to the user,
    /// session unchanged.
    #[error("token `{token}` is not a valid transition from {state:?}")]
    InvalidTransition { state: StateId, token: String },

    /// "back" was pressed with nothing left to pop.
    #[error("navigation history is empty")]
    EmptyHistory,

    /// An entity resolve or answer persist failed; the turn is aborted and
    /// the session left in its prior state for retry.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// PII handling failed; never expected for data the engine encrypted
    /// itself, so treated like a backend failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
