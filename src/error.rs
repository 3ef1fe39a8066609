//! Error types for the external-call and configuration boundaries.
//!
//! Reconciliation itself cannot fail; faults only originate where the
//! pipeline talks to the LLM or reads its configuration.

use thiserror::Error;

/// Errors returned by an LLM-backed collaborator (classifier or normalizer).
#[derive(Error, Debug)]
pub enum LlmError {
    /// Credentials or endpoint missing.
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// The provider answered with a non-success status.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// HTTP 401/403.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// HTTP 429.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The provider answered, but not with something we can parse.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("timed out")]
    Timeout,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl LlmError {
    /// True when the call completed but its payload was unusable.
    ///
    /// The normalizer caller degrades these to the pass-through statement;
    /// every other variant aborts the run.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::InvalidResponse(_))
    }
}

/// Fatal pipeline errors. Any of these aborts the run before snapshots of
/// the failing stage are written.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("classifier call failed")]
    Classifier(#[source] LlmError),

    #[error("normalizer call failed for utterance {index}")]
    Normalizer {
        index: usize,
        #[source]
        source: LlmError,
    },
}
