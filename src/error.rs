//! Error types for the interrogation engine

use thiserror::Error;

/// Failures surfaced to callers of the engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    /// Only storage failures (locked or busy database) may clear on retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Storage(_))
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Storage(format!("{:#}", err))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

/// Ledger integrity failures. Returned as values, never panics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Unknown premise id: {0}")]
    UnknownPremise(String),

    #[error("A contradiction needs at least 2 distinct premises, got {0}")]
    TooFewPremises(usize),

    #[error("Unknown contradiction id: {0}")]
    UnknownContradiction(String),
}

/// Text-generation collaborator failures
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("No API credentials configured")]
    MissingCredentials,

    #[error("Rate limited (HTTP 429)")]
    RateLimited,

    #[error("Server error (HTTP {status}): {body}")]
    Server { status: u16, body: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Client error (HTTP {status}): {body}")]
    Client { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unparseable response: {0}")]
    Parse(String),
}

impl LlmError {
    /// 429, 5xx and timeouts are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited | LlmError::Server { .. } | LlmError::Timeout
        )
    }

    /// Classify an HTTP status that was not a success
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            408 => LlmError::Timeout,
            429 => LlmError::RateLimited,
            500..=599 => LlmError::Server { status, body },
            _ => LlmError::Client { status, body },
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Transport(err.to_string())
        }
    }
}
