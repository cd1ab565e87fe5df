use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::error::{StageError, expect_success};
use crate::llm::{ResilientCallClient, RetryPolicy, build_full_analysis_request, decode};
use crate::models::{
    AnalysisResult, DetectedLanguages, InputPayload, ScenarioCatalog, SentimentLabel,
    TranscriptResult, format_languages, percent_score,
};

#[derive(Debug, Deserialize)]
struct FullPayload {
    #[serde(default)]
    transcript: Option<String>,
    #[serde(default)]
    translation: Option<String>,
    #[serde(default)]
    language_used: Option<DetectedLanguages>,
    sentiment: SentimentPayload,
    #[serde(default)]
    scenario_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SentimentPayload {
    label: SentimentLabel,
    #[serde(default)]
    tone: String,
    score: f64,
    #[serde(default)]
    explanation: String,
}

/// Output of the expensive call, before reconciliation with the cheap stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullAnalysis {
    pub transcript: String,
    pub translation: String,
    pub languages: BTreeSet<String>,
    pub sentiment_label: SentimentLabel,
    pub sentiment_score: u8,
    pub sentiment_tone: String,
    pub explanation: String,
    pub scenario_id: Option<i64>,
}

impl FullAnalysis {
    /// Merge with the cheap-stage transcript; non-empty full-stage values win
    pub fn reconcile(self, cheap: &TranscriptResult) -> AnalysisResult {
        let pick = |full: String, fallback: &str| {
            if full.trim().is_empty() {
                fallback.to_string()
            } else {
                full
            }
        };
        let languages = if self.languages.is_empty() {
            &cheap.languages
        } else {
            &self.languages
        };

        AnalysisResult {
            language_used: format_languages(languages),
            transcript: pick(self.transcript, &cheap.transcript),
            translation: pick(self.translation, &cheap.translation),
            sentiment_label: self.sentiment_label,
            sentiment_score: self.sentiment_score,
            sentiment_tone: self.sentiment_tone,
            explanation: self.explanation,
            scenario_id: self.scenario_id,
        }
    }
}

/// Scenario ids sometimes come back as numeric strings
fn scenario_id_from(value: Option<Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Expensive call: sentiment, tone, explanation and scenario in one pass
#[derive(Debug, Clone)]
pub struct FullAnalysisStage {
    policy: RetryPolicy,
}

impl FullAnalysisStage {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub async fn analyze(
        &self,
        caller: &ResilientCallClient,
        payload: &InputPayload,
        catalog: &ScenarioCatalog,
    ) -> Result<FullAnalysis, StageError> {
        let request = build_full_analysis_request(payload, catalog);
        let raw = expect_success(caller.call(&request, &self.policy).await)?;
        let parsed: FullPayload = decode(&raw)?;

        let scenario_id = match scenario_id_from(parsed.scenario_id) {
            Some(id) if catalog.contains(id) => Some(id),
            Some(id) => {
                warn!("Model chose scenario {} which is not in the catalog; dropping it", id);
                None
            }
            None => None,
        };

        let analysis = FullAnalysis {
            transcript: parsed.transcript.unwrap_or_default(),
            translation: parsed.translation.unwrap_or_default(),
            languages: parsed
                .language_used
                .map(|l| l.normalize())
                .unwrap_or_default(),
            sentiment_label: parsed.sentiment.label,
            sentiment_score: percent_score(parsed.sentiment.score),
            sentiment_tone: parsed.sentiment.tone,
            explanation: parsed.sentiment.explanation,
            scenario_id,
        };
        info!(
            "Full analysis: {} ({}), scenario {:?}",
            analysis.sentiment_label, analysis.sentiment_score, analysis.scenario_id
        );
        Ok(analysis)
    }
}
