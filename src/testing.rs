//! Fakes shared by unit tests across the crate.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::classifier::{ClassifierError, ComplaintModel};
use crate::io::{RecordSink, SinkError, StoredRecord};
use crate::llm::{ModelTransport, Sleeper, TransportError};
use crate::models::CallRequest;

/// Replays a fixed script of responses and records every request
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<String, TransportError>>>,
    requests: Mutex<Vec<CallRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<String, TransportError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CallRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelTransport for ScriptedTransport {
    async fn generate(&self, request: &CallRequest) -> Result<String, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("script exhausted".to_string())))
    }
}

/// Records requested sleeps without waiting
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Classifier that returns the same complaint probability for every text
pub struct FixedModel(pub f64);

impl ComplaintModel for FixedModel {
    fn predict_probability(&self, _text: &str) -> Result<[f64; 2], ClassifierError> {
        Ok([1.0 - self.0, self.0])
    }
}

/// Keeps stored records in memory
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<StoredRecord>>,
}

impl MemorySink {
    pub fn records(&self) -> Vec<StoredRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn store(&self, record: &StoredRecord) -> Result<(), SinkError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
