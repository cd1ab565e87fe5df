/// Binary payload sent alongside the prompt (e.g. an audio recording)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// MIME type reported to the upstream service (e.g. "audio/wav")
    pub mime_type: String,
    /// Raw bytes
    pub data: Vec<u8>,
}

/// A single logical request to the external model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    prompt: String,
    attachment: Option<Attachment>,
    expect_json: bool,
}

impl CallRequest {
    /// Build a request that expects a structured (JSON) response
    pub fn structured(prompt: impl Into<String>, attachment: Option<Attachment>) -> Self {
        Self {
            prompt: prompt.into(),
            attachment,
            expect_json: true,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    pub fn expect_json(&self) -> bool {
        self.expect_json
    }
}

/// Final outcome of one resilient call, after retries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// Raw response text
    Success(String),
    /// Retryable failure that exhausted the attempt budget
    TransientFailure(String),
    /// Daily quota exhausted; retrying is pointless until the quota resets
    QuotaExhausted(String),
    /// Non-retryable upstream rejection
    FatalFailure(String),
}
