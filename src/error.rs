//! Error taxonomy for the core pipelines.
//!
//! Every failure the core can surface is one of these variants, so callers
//! (CLI, HTTP layer) can distinguish input-caused failures from
//! service-caused ones without string matching. The core never retries:
//! a retry policy, if wanted, belongs to the caller.

use thiserror::Error;

/// Failures surfaced by the recognition, translation, chat, and
/// itinerary pipelines.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input bytes did not decode as an image. User-correctable.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// A frozen encoder invocation failed (local inference or the
    /// remote embedding service).
    #[error("encoder failed: {0}")]
    Encoder(String),

    /// The symbol classifier invocation failed.
    #[error("classifier failed: {0}")]
    Classifier(String),

    /// A startup artifact (feature store, model weights, label table,
    /// place index) is missing or invalid. Fatal for its pipeline.
    #[error("artifact unavailable: {0}")]
    Artifact(String),

    /// The outbound call to the generative model failed.
    #[error("generation request failed: {0}")]
    Generation(String),

    /// The generative model returned a payload that does not parse or
    /// validate against the declared output shape.
    #[error("generated payload failed validation: {0}")]
    SchemaViolation(String),

    /// A request failed boundary validation before entering a pipeline.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
