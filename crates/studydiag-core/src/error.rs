//! Error types for the feedback pipeline and its providers.
//!
//! `ProviderError` is defined here rather than in `studydiag-providers` so the
//! engine can downcast provider failures without string matching.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when interacting with a language-model provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The service answered but produced no usable text.
    #[error("empty response: {0}")]
    EmptyResponse(String),
}

impl ProviderError {
    /// Returns `true` if re-triggering the same request cannot succeed
    /// without the user changing something first.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ProviderError::AuthenticationFailed(_) | ProviderError::ModelNotFound(_)
        )
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ProviderError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

/// Failure of a "generate feedback" operation or a store mutation.
///
/// None of these leave a partial attempt behind.
#[derive(Debug, Error)]
pub enum FeedbackError {
    /// A required document or field was not supplied.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// A required setting, usually the API key, is absent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The source document could not be turned into text.
    #[error("text extraction failed: {0:#}")]
    Extraction(anyhow::Error),

    /// The language-model call failed.
    #[error("model service failed: {0:#}")]
    ModelService(anyhow::Error),

    /// The model output was not valid feedback JSON.
    #[error("could not parse model output: {0}")]
    Parse(String),

    /// The referenced test does not exist.
    #[error("test not found: {0}")]
    TestNotFound(Uuid),

    /// The referenced attempt index is out of range for its test.
    #[error("attempt {index} not found (test has {len} attempts)")]
    AttemptNotFound { index: usize, len: usize },

    /// Writing the collection to the backing store failed.
    #[error("storage failed: {0:#}")]
    Storage(anyhow::Error),
}

impl FeedbackError {
    /// Returns the underlying provider error when the model call failed with one.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            FeedbackError::ModelService(e) => e.downcast_ref::<ProviderError>(),
            _ => None,
        }
    }

    /// Short, user-facing category label.
    pub fn kind(&self) -> &'static str {
        match self {
            FeedbackError::MissingInput(_) => "missing input",
            FeedbackError::Configuration(_) => "configuration",
            FeedbackError::Extraction(_) => "extraction",
            FeedbackError::ModelService(_) => "model service",
            FeedbackError::Parse(_) => "parse",
            FeedbackError::TestNotFound(_) | FeedbackError::AttemptNotFound { .. } => {
                "not found"
            }
            FeedbackError::Storage(_) => "storage",
        }
    }
}
