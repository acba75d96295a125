//! Error types for the life coach.

use std::path::PathBuf;

use crate::session::SessionState;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse questionnaire: {0}")]
    Catalog(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistent store errors.
///
/// Callers above the store boundary treat a failed read as "no data" and a
/// failed write as logged-and-ignored; these values never reach the user.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to open store: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Encode/decode error: {0}")]
    Codec(String),
}

/// Errors raised by the inference engine capability.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Model artifact not found at {}", path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("Model artifact at {} rejected: {reason}", path.display())]
    ArtifactRejected { path: PathBuf, reason: String },

    #[error("Inference engine unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Inference request failed: {reason}")]
    Request { reason: String },

    #[error("Invalid response from inference engine: {reason}")]
    InvalidResponse { reason: String },
}

/// Inference session errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Error loading model: {0}")]
    ModelLoad(#[source] EngineError),

    #[error("A generation is already in progress")]
    Busy,

    #[error("Session is not ready (state: {state})")]
    NotReady { state: SessionState },
}

/// Questionnaire interaction errors.
#[derive(Debug, thiserror::Error)]
pub enum QuestionnaireError {
    #[error("Unknown question: {question_id}")]
    UnknownQuestion { question_id: String },

    #[error("Unknown option {option_id} for question {question_id}")]
    UnknownOption {
        question_id: String,
        option_id: String,
    },

    #[error("Question {question_id} has no selected options")]
    NotAnswered { question_id: String },

    #[error("No question is currently shown")]
    NotOnQuestion,
}
