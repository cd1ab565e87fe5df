use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Attachment;

/// Kind of media a record was recorded as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Text,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => f.write_str("audio"),
            MediaKind::Text => f.write_str("text"),
        }
    }
}

/// Content handed to the external model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPayload {
    /// Recording sent as an attachment
    Audio(Attachment),
    /// Conversation text embedded in the prompt
    Text(String),
}

/// One customer-interaction record to classify
#[derive(Debug, Clone)]
pub struct InputRecord {
    pub id: Uuid,
    pub file_name: String,
    pub payload: InputPayload,
    pub created_at: Option<DateTime<Local>>,
}

impl InputRecord {
    pub fn new(file_name: impl Into<String>, payload: InputPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            payload,
            created_at: None,
        }
    }

    pub fn media_kind(&self) -> MediaKind {
        match self.payload {
            InputPayload::Audio(_) => MediaKind::Audio,
            InputPayload::Text(_) => MediaKind::Text,
        }
    }
}
