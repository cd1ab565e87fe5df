use serde::Deserialize;
use tracing::{debug, info};

use super::error::{StageError, expect_success};
use crate::llm::{ResilientCallClient, RetryPolicy, build_transcription_request, decode};
use crate::models::{DetectedLanguages, InputPayload, TranscriptResult};

/// Required fields of the cheap response
#[derive(Debug, Deserialize)]
struct TranscriptPayload {
    transcript: String,
    translation: String,
    language_used: DetectedLanguages,
}

/// Minimal-cost call: transcript, translation and detected languages only
#[derive(Debug, Clone)]
pub struct CheapTranscriptionStage {
    policy: RetryPolicy,
}

impl CheapTranscriptionStage {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub async fn transcribe(
        &self,
        caller: &ResilientCallClient,
        payload: &InputPayload,
    ) -> Result<TranscriptResult, StageError> {
        if let InputPayload::Text(text) = payload {
            if text.trim().is_empty() {
                return Err(StageError::EmptyInput);
            }
        }

        let request = build_transcription_request(payload);
        let raw = expect_success(caller.call(&request, &self.policy).await)?;
        debug!("Transcription response: {} bytes", raw.len());

        let parsed: TranscriptPayload = decode(&raw)?;
        let result = TranscriptResult {
            transcript: parsed.transcript,
            translation: parsed.translation,
            languages: parsed.language_used.normalize(),
        };
        info!("Transcribed ({})", result.language_used());
        Ok(result)
    }
}
