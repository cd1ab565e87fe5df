use std::fmt;

use thiserror::Error;

use crate::io::SinkError;
use crate::llm::DecodeError;
use crate::models::CallOutcome;

/// Failure of one external-call stage
#[derive(Debug, Error)]
pub enum StageError {
    #[error("daily quota exhausted: {0}")]
    QuotaExhausted(String),
    #[error("upstream still failing after retries: {0}")]
    Transient(String),
    #[error("upstream rejected the request: {0}")]
    Fatal(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("empty text input")]
    EmptyInput,
}

impl StageError {
    /// Raw response text, when the failure came from an undecodable payload
    pub fn raw(&self) -> Option<&str> {
        match self {
            StageError::Decode(e) => Some(&e.raw),
            _ => None,
        }
    }
}

/// Unwrap a successful call or turn the outcome into a stage error
pub fn expect_success(outcome: CallOutcome) -> Result<String, StageError> {
    match outcome {
        CallOutcome::Success(text) => Ok(text),
        CallOutcome::TransientFailure(cause) => Err(StageError::Transient(cause)),
        CallOutcome::QuotaExhausted(cause) => Err(StageError::QuotaExhausted(cause)),
        CallOutcome::FatalFailure(cause) => Err(StageError::Fatal(cause)),
    }
}

/// Stage that produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageName {
    Transcription,
    FullAnalysis,
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageName::Transcription => f.write_str("transcription"),
            StageName::FullAnalysis => f.write_str("full_analysis"),
        }
    }
}

/// Why a record did not reach the sink
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: StageName,
        #[source]
        source: StageError,
    },
    #[error("failed to store result: {0}")]
    Sink(#[from] SinkError),
}

impl PipelineError {
    pub fn stage(stage: StageName, source: StageError) -> Self {
        PipelineError::Stage { stage, source }
    }

    /// The batch should pause: no further call can succeed today
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(
            self,
            PipelineError::Stage {
                source: StageError::QuotaExhausted(_),
                ..
            }
        )
    }

    pub fn raw(&self) -> Option<&str> {
        match self {
            PipelineError::Stage { source, .. } => source.raw(),
            PipelineError::Sink(_) => None,
        }
    }
}
