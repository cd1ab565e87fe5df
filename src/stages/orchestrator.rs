use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{PipelineError, StageName};
use super::full_analysis::FullAnalysisStage;
use super::transcribe::CheapTranscriptionStage;
use crate::classifier::{GateVerdict, LocalConfidenceGate};
use crate::config::PipelineConfig;
use crate::io::{RecordSink, StoredRecord};
use crate::llm::ResilientCallClient;
use crate::models::{AnalysisResult, ConfidenceVerdict, InputRecord, ScenarioCatalog, TranscriptResult};

/// Where a record is in its processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    Transcribed,
    Gated,
    Escalated,
    Finalized,
    Done,
    Failed,
}

/// Working state of one record; discarded after handoff to the sink
#[derive(Debug, Clone)]
pub struct PipelineRecord {
    pub record_id: Uuid,
    pub file_name: String,
    pub state: PipelineState,
    pub transcript: Option<TranscriptResult>,
    pub verdict: Option<ConfidenceVerdict>,
    pub escalated: bool,
    pub result: Option<AnalysisResult>,
}

impl PipelineRecord {
    fn start(input: &InputRecord) -> Self {
        Self {
            record_id: input.id,
            file_name: input.file_name.clone(),
            state: PipelineState::Start,
            transcript: None,
            verdict: None,
            escalated: false,
            result: None,
        }
    }

    fn advance(&mut self, state: PipelineState) {
        debug!("{}: {:?} -> {:?}", self.file_name, self.state, state);
        self.state = state;
    }
}

/// Sequences the stages for each record.
///
/// At most one expensive call is made per record, and none when the local
/// gate is confident.
pub struct PipelineOrchestrator<'a> {
    caller: &'a ResilientCallClient,
    gate: &'a LocalConfidenceGate,
    catalog: &'a ScenarioCatalog,
    sink: &'a dyn RecordSink,
    transcription: CheapTranscriptionStage,
    full_analysis: FullAnalysisStage,
}

impl<'a> PipelineOrchestrator<'a> {
    pub fn new(
        caller: &'a ResilientCallClient,
        gate: &'a LocalConfidenceGate,
        catalog: &'a ScenarioCatalog,
        sink: &'a dyn RecordSink,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            caller,
            gate,
            catalog,
            sink,
            transcription: CheapTranscriptionStage::new(config.transcription_retry),
            full_analysis: FullAnalysisStage::new(config.full_analysis_retry),
        }
    }

    /// Run one record through the pipeline and hand the result to the sink
    pub async fn process(&self, input: &InputRecord) -> Result<PipelineRecord, PipelineError> {
        let mut record = PipelineRecord::start(input);

        // START -> TRANSCRIBED
        let transcript = match self.transcription.transcribe(self.caller, &input.payload).await {
            Ok(t) => t,
            Err(e) => {
                record.advance(PipelineState::Failed);
                if let Some(raw) = e.raw() {
                    warn!("{}: undecodable transcription response: {}", input.file_name, raw);
                }
                return Err(PipelineError::stage(StageName::Transcription, e));
            }
        };
        record.transcript = Some(transcript.clone());
        record.advance(PipelineState::Transcribed);

        // TRANSCRIBED -> GATED
        let escalate = match self.gate.evaluate(transcript.classification_text()) {
            GateVerdict::Scored(verdict) => {
                record.verdict = Some(verdict);
                let escalate = self.gate.needs_escalation(verdict.probability);
                let band = self.gate.band();
                info!(
                    "{}: local p(complaint)={:.3}, band [{}, {}], escalate={}",
                    input.file_name, verdict.probability, band.low, band.high, escalate
                );
                escalate
            }
            GateVerdict::Unavailable(reason) => {
                info!("{}: local gate unavailable ({}), escalating", input.file_name, reason);
                true
            }
        };
        record.advance(PipelineState::Gated);

        let result = match (escalate, record.verdict) {
            (false, Some(verdict)) => AnalysisResult::from_local_verdict(&transcript, &verdict),
            _ => {
                record.escalated = true;
                record.advance(PipelineState::Escalated);
                let full = match self
                    .full_analysis
                    .analyze(self.caller, &input.payload, self.catalog)
                    .await
                {
                    Ok(full) => full,
                    Err(e) => {
                        record.advance(PipelineState::Failed);
                        if let Some(raw) = e.raw() {
                            warn!("{}: undecodable full analysis response: {}", input.file_name, raw);
                        }
                        return Err(PipelineError::stage(StageName::FullAnalysis, e));
                    }
                };
                full.reconcile(&transcript)
            }
        };
        record.result = Some(result.clone());
        record.advance(PipelineState::Finalized);

        // FINALIZED -> DONE
        let stored = StoredRecord::new(input, result, record.escalated);
        if let Err(e) = self.sink.store(&stored).await {
            record.advance(PipelineState::Failed);
            return Err(e.into());
        }
        record.advance(PipelineState::Done);

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::classifier::UncertaintyBand;
    use crate::llm::{Sleeper, TransportError};
    use crate::models::{InputPayload, Scenario, SentimentLabel};
    use crate::stages::StageError;
    use crate::testing::{FixedModel, MemorySink, RecordingSleeper, ScriptedTransport};

    const CHEAP: &str = r#"{
        "transcript": "Client: dah seminggu parcel tak sampai",
        "translation": "Client: the parcel has not arrived for a week",
        "language_used": ["Malay"]
    }"#;

    const FULL: &str = r#"{
        "transcript": "Client: dah seminggu parcel tak sampai!",
        "translation": "Client: the parcel has not arrived for a whole week!",
        "language_used": ["malay", "english"],
        "sentiment": {"label": "Complaint", "tone": "frustrated", "score": 87, "explanation": "Late parcel."},
        "scenario_id": 2
    }"#;

    struct Harness {
        transport: Arc<ScriptedTransport>,
        caller: ResilientCallClient,
        catalog: ScenarioCatalog,
        sink: MemorySink,
        config: PipelineConfig,
    }

    impl Harness {
        fn new(responses: Vec<Result<String, TransportError>>) -> Self {
            let transport = Arc::new(ScriptedTransport::new(responses));
            let caller = ResilientCallClient::with_sleeper(
                transport.clone(),
                Arc::new(RecordingSleeper::default()),
            );
            let catalog = ScenarioCatalog::new(vec![
                Scenario {
                    id: 1,
                    name: "Billing".to_string(),
                    description: "Charges".to_string(),
                },
                Scenario {
                    id: 2,
                    name: "Delivery".to_string(),
                    description: "Late parcels".to_string(),
                },
            ]);
            Self {
                transport,
                caller,
                catalog,
                sink: MemorySink::default(),
                config: PipelineConfig::default(),
            }
        }

        async fn run(&self, gate: &LocalConfidenceGate) -> Result<PipelineRecord, PipelineError> {
            let orchestrator =
                PipelineOrchestrator::new(&self.caller, gate, &self.catalog, &self.sink, &self.config);
            let input = InputRecord::new(
                "parcel.txt",
                InputPayload::Text("Client: dah seminggu parcel tak sampai".to_string()),
            );
            orchestrator.process(&input).await
        }
    }

    fn gate_with(p: f64) -> LocalConfidenceGate {
        LocalConfidenceGate::new(Arc::new(FixedModel(p)), UncertaintyBand::default())
    }

    #[tokio::test]
    async fn test_unavailable_gate_always_escalates() {
        let harness = Harness::new(vec![Ok(CHEAP.to_string()), Ok(FULL.to_string())]);
        let gate = LocalConfidenceGate::unavailable(UncertaintyBand::default());

        let record = harness.run(&gate).await.unwrap();

        assert_eq!(record.state, PipelineState::Done);
        assert!(record.escalated);
        assert_eq!(harness.transport.call_count(), 2);
        let stored = harness.sink.records();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].analysis.scenario_id, Some(2));
        assert_eq!(stored[0].analysis.sentiment_score, 87);
        assert_eq!(stored[0].analysis.language_used, "Bahasa, English");
        assert_eq!(
            stored[0].analysis.translation,
            "Client: the parcel has not arrived for a whole week!"
        );
    }

    #[tokio::test]
    async fn test_confident_gate_skips_full_call() {
        let harness = Harness::new(vec![Ok(CHEAP.to_string())]);

        let record = harness.run(&gate_with(0.92)).await.unwrap();

        assert!(!record.escalated);
        assert_eq!(harness.transport.call_count(), 1);
        let result = record.result.unwrap();
        assert_eq!(result.scenario_id, None);
        assert_eq!(result.sentiment_score, 92);
        assert_eq!(result.sentiment_label, SentimentLabel::Complaint);
        assert_eq!(result.sentiment_tone, "auto");
        assert_eq!(result.language_used, "Bahasa");
        assert_eq!(harness.sink.records().len(), 1);
    }

    #[tokio::test]
    async fn test_confident_non_complaint() {
        let harness = Harness::new(vec![Ok(CHEAP.to_string())]);

        let record = harness.run(&gate_with(0.08)).await.unwrap();

        let result = record.result.unwrap();
        assert_eq!(result.sentiment_label, SentimentLabel::NonComplaint);
        assert_eq!(result.sentiment_score, 8);
    }

    #[tokio::test]
    async fn test_uncertain_gate_escalates() {
        let harness = Harness::new(vec![Ok(CHEAP.to_string()), Ok(FULL.to_string())]);

        let record = harness.run(&gate_with(0.75)).await.unwrap();

        assert!(record.escalated);
        assert_eq!(record.verdict.unwrap().probability, 0.75);
        assert_eq!(harness.transport.call_count(), 2);
        let full_prompt = harness.transport.requests()[1].prompt().to_string();
        assert!(full_prompt.contains("ID 2: Delivery - Late parcels"));
    }

    #[tokio::test]
    async fn test_undecodable_transcription_fails_without_escalation() {
        let raw = "I'm sorry, I cannot help with that.";
        let harness = Harness::new(vec![Ok(raw.to_string()), Ok(FULL.to_string())]);

        let err = harness.run(&gate_with(0.5)).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Stage {
                stage: StageName::Transcription,
                source: StageError::Decode(_)
            }
        ));
        assert_eq!(err.raw(), Some(raw));
        assert_eq!(harness.transport.call_count(), 1);
        assert!(harness.sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_full_stage_failure_reaches_no_sink() {
        let harness = Harness::new(vec![
            Ok(CHEAP.to_string()),
            Err(TransportError::Status {
                status: 429,
                body: "Quota exceeded: GenerateRequestsPerDayPerProjectPerModel".to_string(),
            }),
        ]);

        let err = harness.run(&gate_with(0.5)).await.unwrap_err();

        assert!(err.is_quota_exhausted());
        assert!(matches!(
            err,
            PipelineError::Stage {
                stage: StageName::FullAnalysis,
                ..
            }
        ));
        assert!(harness.sink.records().is_empty());
    }

    struct StalledSleeper;

    #[async_trait::async_trait]
    impl Sleeper for StalledSleeper {
        async fn sleep(&self, _duration: Duration) {
            std::future::pending::<()>().await;
        }
    }

    #[tokio::test]
    async fn test_cancelled_backoff_stores_nothing() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(CHEAP.to_string()),
            Err(TransportError::Status {
                status: 503,
                body: "The model is overloaded.".to_string(),
            }),
        ]));
        let caller = ResilientCallClient::with_sleeper(transport.clone(), Arc::new(StalledSleeper));
        let harness = Harness::new(vec![]);
        let gate = gate_with(0.5);
        let orchestrator = PipelineOrchestrator::new(
            &caller,
            &gate,
            &harness.catalog,
            &harness.sink,
            &harness.config,
        );
        let input = InputRecord::new("parcel.txt", InputPayload::Text("Client: late".to_string()));

        let started = std::time::Instant::now();
        let outcome =
            tokio::time::timeout(Duration::from_millis(100), orchestrator.process(&input)).await;

        assert!(outcome.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(transport.call_count(), 2);
        assert!(harness.sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_empty_translation_falls_back_to_transcript_for_gate() {
        let cheap = r#"{"transcript": "", "translation": "", "language_used": []}"#;
        let harness = Harness::new(vec![Ok(cheap.to_string()), Ok(FULL.to_string())]);

        // empty text gives the neutral 0.5 verdict, which is inside the band
        let record = harness.run(&gate_with(0.99)).await.unwrap();

        assert_eq!(record.verdict, Some(ConfidenceVerdict::neutral()));
        assert!(record.escalated);
    }
}
