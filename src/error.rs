//! Error taxonomy for the pipeline.
//!
//! Each component returns its own typed error. The orchestrator wraps the
//! error of the failing stage in a [`PipelineError`], whose message names
//! the stage. Configuration errors are raised before the pipeline starts
//! and are never wrapped.
//!
//! | Error | Policy |
//! |-------|--------|
//! | [`ConfigError`] | abort before any network call |
//! | [`SourceError`] | per-catalog failures are logged; total failure aborts |
//! | [`EmbeddingError`] | abort |
//! | [`GenerationError`] | abort |
//! | [`DeliveryError`] | logged; the run still succeeds |

use paperweek_core::index::IndexError;
use paperweek_core::ranking::RankingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required key is absent.
    #[error("{key} is required {reason}")]
    Missing { key: &'static str, reason: String },

    /// A key is present but its value is unusable.
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    /// Keys that are individually valid but contradict each other.
    #[error("{0}")]
    Conflict(String),

    /// A local model server is unreachable or lacks a model.
    #[error("{0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("{catalog} is unreachable: {message}")]
    Unreachable { catalog: String, message: String },

    #[error("{catalog} rate limit exceeded")]
    RateLimited { catalog: String },

    #[error("{catalog} returned HTTP {status}: {body}")]
    Http {
        catalog: String,
        status: u16,
        body: String,
    },

    #[error("{catalog} returned a malformed response: {message}")]
    Malformed { catalog: String, message: String },

    #[error("no catalog could be reached: {0}")]
    AllUnavailable(String),

    #[error("no papers found for topic '{0}'")]
    NoPapers(String),
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("{provider} embedding request failed: {message}")]
    Request { provider: String, message: String },

    #[error("{provider} embedding API error {status}: {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} returned a malformed embedding response: {message}")]
    Malformed { provider: String, message: String },

    #[error("{provider} returned {actual} vectors for {expected} inputs")]
    CountMismatch {
        provider: String,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{provider} generation request failed: {message}")]
    Request { provider: String, message: String },

    #[error("{provider} chat API error {status}: {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} returned a malformed chat response: {message}")]
    Malformed { provider: String, message: String },

    #[error("{provider} returned an empty response")]
    Empty { provider: String },

    #[error("model output is not a valid ranking: {0}")]
    Ranking(#[from] RankingError),
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery request failed: {0}")]
    Request(String),

    #[error("messaging API error {status}: {description}")]
    Api { status: u16, description: String },

    #[error("messaging API rejected the message: {0}")]
    Rejected(String),

    #[error("nothing to deliver")]
    EmptyMessage,
}

/// The five pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    EmbedIndex,
    Retrieve,
    Generate,
    Deliver,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Fetch => "FETCH",
            Stage::EmbedIndex => "EMBED_INDEX",
            Stage::Retrieve => "RETRIEVE",
            Stage::Generate => "GENERATE",
            Stage::Deliver => "DELIVER",
        };
        f.write_str(name)
    }
}

/// Underlying cause of a stage failure.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// A run aborted in `stage`.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: impl Into<StageError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_names_stage_and_cause() {
        let err = PipelineError::new(
            Stage::Generate,
            GenerationError::Empty {
                provider: "ollama".into(),
            },
        );
        assert_eq!(
            err.to_string(),
            "GENERATE stage failed: ollama returned an empty response"
        );
    }

    #[test]
    fn test_stage_names() {
        let names: Vec<String> = [
            Stage::Fetch,
            Stage::EmbedIndex,
            Stage::Retrieve,
            Stage::Generate,
            Stage::Deliver,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(names, vec!["FETCH", "EMBED_INDEX", "RETRIEVE", "GENERATE", "DELIVER"]);
    }

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::Missing {
            key: "OPENAI_API_KEY",
            reason: "when LLM_PROVIDER=openai".into(),
        };
        assert_eq!(
            err.to_string(),
            "OPENAI_API_KEY is required when LLM_PROVIDER=openai"
        );
    }
}
