use crate::models::{CallRequest, InputPayload, ScenarioCatalog};

/// Cheap prompt: transcription, language detection and translation only
pub const TRANSCRIPTION_PROMPT: &str = r#"You are an AI engine for client assessment analytics.

You will receive EITHER:
(A) an AUDIO conversation (client and customer service), OR
(B) a TEXT conversation/complaint/feedback.

TASKS (ONLY):

1) TRANSCRIPTION
- If input is AUDIO: transcribe exactly as spoken.
- If input is TEXT: keep content as-is (light normalisation only).
- Identify speakers as:
  - "Client:"
  - "CS:"
- Preserve code-mixing exactly (Mandarin + Hokkien + English + Malay).
- Mandarin: Chinese characters if present.
- Hokkien: common informal romanization.
- Do NOT translate during transcription.

2) LANGUAGE DETECTION
- Detect the primary language(s) used by the Client.
- If mixed, list all detected languages.

3) TRANSLATION
- Translate the FULL transcript into natural English.
- Preserve speaker labels and line breaks.
- Do NOT add explanations or notes.

Do NOT perform sentiment analysis or scenario classification.

OUTPUT FORMAT:
Return ONLY valid JSON exactly:
{
  "transcript": "...",
  "translation": "...",
  "language_used": ["Mandarin", "Hokkien", "English"]
}"#;

/// Full prompt: everything in one pass, including sentiment and scenario
pub const FULL_ANALYSIS_PROMPT: &str = r#"You are an AI engine for client assessment analytics.

You will receive EITHER:
(A) an AUDIO conversation (client and customer service), OR
(B) a TEXT conversation/complaint/feedback.

Your job: perform ALL tasks below in ONE pass.

POSSIBLE LANGUAGES:
- Mandarin Chinese
- Hokkien / Minnan (including Penang slang)
- English
- Malay
- Mixed code-switching

TASKS:

1) TRANSCRIPT / TEXT NORMALISATION
- If input is AUDIO: transcribe exactly as spoken.
- If input is TEXT: keep content as-is (light normalisation only).
- Identify speakers as:
  - "Client:"
  - "CS:"
- Preserve code-mixing exactly (Mandarin + Hokkien + English + Malay).
- Do NOT translate during this step.

2) LANGUAGE DETECTION
- Detect the primary language(s) used by the Client.
- If mixed, list all detected languages.

3) TRANSLATION
- Translate the FULL transcript into natural English.
- Preserve speaker labels and line breaks.

4) SENTIMENT ANALYSIS
- Determine overall client sentiment: "Positive", "Neutral" or "Complaint".
- Provide:
  - label
  - confidence score (INTEGER 0 - 100) = your confidence that the chosen label is correct
  - tone (e.g., angry, calm, frustrated, polite, stressed)
  - short explanation (1 - 2 sentences)

5) SCENARIO CLASSIFICATION
- Choose ONE scenario that best matches the client's main issue.
- Use ONLY an ID from the provided scenario list.

OUTPUT FORMAT:
Return ONLY valid JSON exactly in this structure:
{
  "transcript": "...",
  "translation": "...",
  "language_used": ["Mandarin", "Hokkien", "English"],
  "sentiment": {
    "label": "Positive | Neutral | Complaint",
    "tone": "angry | calm | frustrated | polite | stressed",
    "score": 0-100,
    "explanation": "short explanation"
  },
  "scenario_id": number
}"#;

/// Build the cheap transcription request for an input
pub fn build_transcription_request(payload: &InputPayload) -> CallRequest {
    with_payload(TRANSCRIPTION_PROMPT.to_string(), payload)
}

/// Build the full analysis request, listing the scenario catalog
pub fn build_full_analysis_request(payload: &InputPayload, catalog: &ScenarioCatalog) -> CallRequest {
    let prompt = format!("{}\n\nScenarios:\n{}", FULL_ANALYSIS_PROMPT, catalog.render());
    with_payload(prompt, payload)
}

fn with_payload(mut prompt: String, payload: &InputPayload) -> CallRequest {
    match payload {
        InputPayload::Audio(attachment) => CallRequest::structured(prompt, Some(attachment.clone())),
        InputPayload::Text(text) => {
            prompt.push_str(&format!("\n\nINPUT TEXT:\n\"\"\"{}\"\"\"", text.trim()));
            CallRequest::structured(prompt, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attachment, Scenario};

    #[test]
    fn test_text_input_is_embedded() {
        let request = build_transcription_request(&InputPayload::Text("  Client: hello  ".to_string()));

        assert!(request.expect_json());
        assert!(request.attachment().is_none());
        assert!(request.prompt().ends_with("INPUT TEXT:\n\"\"\"Client: hello\"\"\""));
        assert!(!request.prompt().contains("SENTIMENT ANALYSIS"));
    }

    #[test]
    fn test_audio_input_is_attached() {
        let attachment = Attachment {
            mime_type: "audio/mpeg".to_string(),
            data: vec![0xFF, 0xFB],
        };
        let request = build_transcription_request(&InputPayload::Audio(attachment.clone()));

        assert_eq!(request.attachment(), Some(&attachment));
        assert!(!request.prompt().contains("INPUT TEXT"));
    }

    #[test]
    fn test_full_request_lists_scenarios() {
        let catalog = ScenarioCatalog::new(vec![Scenario {
            id: 3,
            name: "Refund".to_string(),
            description: "Refund delayed".to_string(),
        }]);
        let request =
            build_full_analysis_request(&InputPayload::Text("Client: where is my money".to_string()), &catalog);

        let prompt = request.prompt();
        assert!(prompt.contains("SCENARIO CLASSIFICATION"));
        assert!(prompt.contains("Scenarios:\nID 3: Refund - Refund delayed"));
        assert!(prompt.find("Scenarios:") < prompt.find("INPUT TEXT"));
    }
}
