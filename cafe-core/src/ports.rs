//! Contracts for the external language services.
//!
//! Both collaborators are asynchronous and fallible. Callers treat any
//! error as a degradation signal: a failed embedding skips semantic search,
//! and a failed classification falls back to an "open now" intent.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use thiserror::Error;

/// How the text will be used, mirroring asymmetric embedding models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingTask {
    /// Search text.
    Query,
    /// Indexed content.
    Document,
}

/// Errors raised by an [`Embedder`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    /// No embedding service is configured or reachable.
    #[error("embedding service unavailable: {message}")]
    Unavailable {
        /// Detail.
        message: String,
    },
    /// The request could not be delivered or timed out.
    #[error("embedding request to {url} failed: {message}")]
    Transport {
        /// Requested endpoint.
        url: String,
        /// Detail.
        message: String,
    },
    /// The service answered with a non-success status.
    #[error("embedding service returned HTTP {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Detail.
        message: String,
    },
    /// The response body could not be interpreted.
    #[error("failed to parse embedding response: {message}")]
    Parse {
        /// Detail.
        message: String,
    },
    /// The vector length did not match the index.
    #[error("embedding has {found} dimensions, expected {expected}")]
    Dimensions {
        /// Required length.
        expected: usize,
        /// Observed length.
        found: usize,
    },
    /// Calls are suspended after repeated failures.
    #[error("embedding circuit is open")]
    CircuitOpen,
}

impl EmbeddingError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            Self::Unavailable { .. }
            | Self::Parse { .. }
            | Self::Dimensions { .. }
            | Self::CircuitOpen => false,
        }
    }
}

/// Produces text embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `text` for `task`.
    async fn embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>, EmbeddingError>;
}

/// Time constraint extracted from a request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeFilter {
    /// The user wants venues open right now.
    pub filter_open_now: bool,
    /// Explicit local date and time the user wants to visit.
    pub target: Option<NaiveDateTime>,
}

impl Default for TimeFilter {
    fn default() -> Self {
        Self {
            filter_open_now: true,
            target: None,
        }
    }
}

/// Structured interpretation of a free-text request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Intent {
    /// Time constraint.
    pub time_filter: TimeFilter,
    /// Salient keywords from the text.
    pub extracted_keywords: Vec<String>,
    /// Canonical feature tags the user asked for.
    pub tags: Vec<String>,
}

impl Intent {
    /// Fallback intent used when classification fails: open now, with the
    /// raw text as the only keyword.
    #[must_use]
    pub fn fallback(text: &str) -> Self {
        let trimmed = text.trim();
        Self {
            time_filter: TimeFilter::default(),
            extracted_keywords: if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed.to_owned()]
            },
            tags: Vec::new(),
        }
    }
}

/// Errors raised by an [`IntentClassifier`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntentError {
    /// No classifier is configured or reachable.
    #[error("intent classifier unavailable: {message}")]
    Unavailable {
        /// Detail.
        message: String,
    },
    /// The request failed in transit or was refused.
    #[error("intent request failed: {message}")]
    Request {
        /// Detail.
        message: String,
    },
    /// The model output was not the expected JSON.
    #[error("failed to parse intent: {message}")]
    Parse {
        /// Detail.
        message: String,
    },
}

/// Turns free text into an [`Intent`].
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Classify `text`, interpreting relative times against `now`.
    async fn classify(&self, text: &str, now: DateTime<FixedOffset>) -> Result<Intent, IntentError>;
}

/// Collaborator that is never available.
///
/// Lets the engine run fully degraded: name and tag paths only, with the
/// fallback intent.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

#[async_trait]
impl Embedder for Unconfigured {
    async fn embed(&self, _text: &str, _task: EmbeddingTask) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Unavailable {
            message: "no embedding service configured".to_owned(),
        })
    }
}

#[async_trait]
impl IntentClassifier for Unconfigured {
    async fn classify(
        &self,
        _text: &str,
        _now: DateTime<FixedOffset>,
    ) -> Result<Intent, IntentError> {
        Err(IntentError::Unavailable {
            message: "no intent classifier configured".to_owned(),
        })
    }
}
