use serde::de::DeserializeOwned;
use thiserror::Error;

/// A response body that could not be parsed into the expected structure.
///
/// The raw text is always kept for diagnostics.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid JSON returned: {reason}")]
pub struct DecodeError {
    pub reason: String,
    pub raw: String,
}

/// Strictly parse a raw response body into `T`
pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, DecodeError> {
    serde_json::from_str(raw.trim()).map_err(|e| DecodeError {
        reason: e.to_string(),
        raw: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Payload {
        transcript: String,
    }

    #[test]
    fn test_decode_valid() {
        let payload: Payload = decode("  {\"transcript\": \"hello\"}\n").unwrap();
        assert_eq!(payload.transcript, "hello");
    }

    #[test]
    fn test_decode_keeps_raw_text() {
        let raw = "Sure! Here is the JSON you asked for: {transcript: hello";
        let err = decode::<Payload>(raw).unwrap_err();
        assert_eq!(err.raw, raw);
        assert!(err.to_string().starts_with("Invalid JSON returned"));
    }

    #[test]
    fn test_decode_missing_field() {
        let err = decode::<Payload>("{\"translation\": \"x\"}").unwrap_err();
        assert!(err.reason.contains("transcript"));
    }
}
