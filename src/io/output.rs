use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{AnalysisResult, InputRecord, MediaKind};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Completed record handed to durable storage
#[derive(Debug, Clone, Serialize)]
pub struct StoredRecord {
    pub record_id: Uuid,
    pub file_name: String,
    pub media_kind: MediaKind,
    pub file_created_at: Option<DateTime<Local>>,
    pub processed_at: DateTime<Local>,
    /// Whether the expensive full analysis was used
    pub escalated: bool,
    #[serde(flatten)]
    pub analysis: AnalysisResult,
}

impl StoredRecord {
    pub fn new(input: &InputRecord, analysis: AnalysisResult, escalated: bool) -> Self {
        Self {
            record_id: input.id,
            file_name: input.file_name.clone(),
            media_kind: input.media_kind(),
            file_created_at: input.created_at,
            processed_at: Local::now(),
            escalated,
            analysis,
        }
    }
}

/// Destination for finished records; never read back by the pipeline
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn store(&self, record: &StoredRecord) -> Result<(), SinkError>;
}

/// Appends one JSON object per line
pub struct JsonlSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSink for JsonlSink {
    async fn store(&self, record: &StoredRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let io_err = |source| SinkError::Io {
            path: self.path.clone(),
            source,
        };
        let _guard = self.lock.lock().await;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        file.write_all(&line).map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InputPayload, SentimentLabel};

    fn analysis(score: u8) -> AnalysisResult {
        AnalysisResult {
            transcript: "Client: hi".to_string(),
            translation: "Client: hi".to_string(),
            language_used: "English".to_string(),
            sentiment_label: SentimentLabel::Neutral,
            sentiment_score: score,
            sentiment_tone: "calm".to_string(),
            explanation: "Greeting only.".to_string(),
            scenario_id: Some(3),
        }
    }

    #[tokio::test]
    async fn test_jsonl_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new(dir.path().join("records.jsonl"));
        let input = InputRecord::new("call.txt", InputPayload::Text("Client: hi".to_string()));

        sink.store(&StoredRecord::new(&input, analysis(70), true)).await.unwrap();
        sink.store(&StoredRecord::new(&input, analysis(40), false)).await.unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["file_name"], "call.txt");
        assert_eq!(lines[0]["media_kind"], "text");
        assert_eq!(lines[0]["sentiment_label"], "Neutral");
        assert_eq!(lines[0]["sentiment_score"], 70);
        assert_eq!(lines[0]["escalated"], true);
        assert_eq!(lines[1]["sentiment_score"], 40);
        assert_eq!(lines[0]["record_id"], input.id.to_string());
    }

    #[tokio::test]
    async fn test_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new(dir.path().join("missing").join("records.jsonl"));
        let input = InputRecord::new("a.txt", InputPayload::Text("x".to_string()));

        let err = sink.store(&StoredRecord::new(&input, analysis(1), false)).await.unwrap_err();
        assert!(matches!(err, SinkError::Io { .. }));
    }
}
