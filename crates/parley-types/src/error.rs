use thiserror::Error;

use crate::llm::LlmError;

/// Errors from repository operations (used by trait definitions in parley-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,
}

/// Errors that abort a turn before a reply can be produced.
///
/// A reply that was produced but could not be stored is not a `TurnError`;
/// it is reported alongside the reply on the turn outcome.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),

    #[error("model call failed: {0}")]
    ModelCall(#[from] LlmError),
}

impl TurnError {
    /// Whether the initiator's utterance reached storage before the failure.
    ///
    /// Clients use this to decide whether to keep an optimistically shown
    /// utterance.
    pub fn utterance_persisted(&self) -> bool {
        matches!(self, TurnError::ModelCall(_))
    }
}
