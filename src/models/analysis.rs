use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::language::format_languages;

/// Tone recorded when the local classifier decided on its own
pub const AUTOMATIC_TONE: &str = "auto";

/// Sentiment label stored with a finished record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Complaint,
    /// Only produced by the local classifier
    NonComplaint,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "Positive",
            SentimentLabel::Neutral => "Neutral",
            SentimentLabel::Complaint => "Complaint",
            SentimentLabel::NonComplaint => "Non-Complaint",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SentimentLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        match key.as_str() {
            "positive" => Ok(SentimentLabel::Positive),
            "neutral" => Ok(SentimentLabel::Neutral),
            "complaint" => Ok(SentimentLabel::Complaint),
            "noncomplaint" => Ok(SentimentLabel::NonComplaint),
            _ => Err(format!("unknown sentiment label: {:?}", s)),
        }
    }
}

impl TryFrom<String> for SentimentLabel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SentimentLabel> for String {
    fn from(label: SentimentLabel) -> Self {
        label.as_str().to_string()
    }
}

/// Binary label produced by the local classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplaintLabel {
    Complaint,
    NonComplaint,
}

impl From<ComplaintLabel> for SentimentLabel {
    fn from(label: ComplaintLabel) -> Self {
        match label {
            ComplaintLabel::Complaint => SentimentLabel::Complaint,
            ComplaintLabel::NonComplaint => SentimentLabel::NonComplaint,
        }
    }
}

/// Local classifier verdict
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceVerdict {
    pub label: ComplaintLabel,
    /// Estimated probability that the record is a complaint
    pub probability: f64,
}

impl ConfidenceVerdict {
    /// Verdict returned when there is no text to judge
    pub fn neutral() -> Self {
        Self {
            label: ComplaintLabel::NonComplaint,
            probability: 0.5,
        }
    }

    /// Build a verdict from a complaint probability; labels Complaint at p >= 0.5
    pub fn from_probability(probability: f64) -> Self {
        let probability = probability.clamp(0.0, 1.0);
        let label = if probability >= 0.5 {
            ComplaintLabel::Complaint
        } else {
            ComplaintLabel::NonComplaint
        };
        Self { label, probability }
    }

    /// Probability as an integer percentage (0-100)
    pub fn score(&self) -> u8 {
        percent_score(self.probability * 100.0)
    }
}

/// Round and clamp a percentage into the stored 0-100 range
pub fn percent_score(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

/// Output of the cheap transcription call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub transcript: String,
    pub translation: String,
    pub languages: BTreeSet<String>,
}

impl TranscriptResult {
    /// Text the local classifier should judge: the translation, else the transcript
    pub fn classification_text(&self) -> &str {
        let translation = self.translation.trim();
        if translation.is_empty() {
            self.transcript.trim()
        } else {
            translation
        }
    }

    pub fn language_used(&self) -> String {
        format_languages(&self.languages)
    }
}

/// Canonical analysis of one record, whichever stage produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub transcript: String,
    pub translation: String,
    /// Sorted, de-duplicated, comma-joined languages
    pub language_used: String,
    pub sentiment_label: SentimentLabel,
    pub sentiment_score: u8,
    pub sentiment_tone: String,
    pub explanation: String,
    pub scenario_id: Option<i64>,
}

impl AnalysisResult {
    /// Finalize a record from the local verdict alone; no scenario is assigned
    pub fn from_local_verdict(transcript: &TranscriptResult, verdict: &ConfidenceVerdict) -> Self {
        let score = verdict.score();
        Self {
            transcript: transcript.transcript.clone(),
            translation: transcript.translation.clone(),
            language_used: transcript.language_used(),
            sentiment_label: verdict.label.into(),
            sentiment_score: score,
            sentiment_tone: AUTOMATIC_TONE.to_string(),
            explanation: format!(
                "Auto-classified by local classifier (confidence={}%).",
                score
            ),
            scenario_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parsing_is_lenient() {
        assert_eq!("complaint".parse::<SentimentLabel>(), Ok(SentimentLabel::Complaint));
        assert_eq!(" Positive ".parse::<SentimentLabel>(), Ok(SentimentLabel::Positive));
        assert_eq!(
            "Non-Complaint".parse::<SentimentLabel>(),
            Ok(SentimentLabel::NonComplaint)
        );
        assert!("angry".parse::<SentimentLabel>().is_err());
    }

    #[test]
    fn test_label_serde() {
        let json = serde_json::to_string(&SentimentLabel::NonComplaint).unwrap();
        assert_eq!(json, "\"Non-Complaint\"");
        let back: SentimentLabel = serde_json::from_str("\"NEUTRAL\"").unwrap();
        assert_eq!(back, SentimentLabel::Neutral);
    }

    #[test]
    fn test_verdict_from_probability() {
        assert_eq!(
            ConfidenceVerdict::from_probability(0.5).label,
            ComplaintLabel::Complaint
        );
        assert_eq!(
            ConfidenceVerdict::from_probability(0.49).label,
            ComplaintLabel::NonComplaint
        );
        assert_eq!(ConfidenceVerdict::from_probability(0.926).score(), 93);
        assert_eq!(ConfidenceVerdict::neutral().score(), 50);
    }

    #[test]
    fn test_percent_score_bounds() {
        assert_eq!(percent_score(-3.0), 0);
        assert_eq!(percent_score(140.0), 100);
        assert_eq!(percent_score(86.6), 87);
        assert_eq!(percent_score(f64::NAN), 0);
    }

    #[test]
    fn test_classification_text_falls_back_to_transcript() {
        let mut t = TranscriptResult {
            transcript: "Client: wah lau".to_string(),
            translation: "  ".to_string(),
            languages: BTreeSet::new(),
        };
        assert_eq!(t.classification_text(), "Client: wah lau");

        t.translation = "Client: oh no".to_string();
        assert_eq!(t.classification_text(), "Client: oh no");
    }

    #[test]
    fn test_local_verdict_result() {
        let transcript = TranscriptResult {
            transcript: "x".to_string(),
            translation: "y".to_string(),
            languages: ["English".to_string()].into_iter().collect(),
        };
        let result =
            AnalysisResult::from_local_verdict(&transcript, &ConfidenceVerdict::from_probability(0.92));

        assert_eq!(result.sentiment_label, SentimentLabel::Complaint);
        assert_eq!(result.sentiment_score, 92);
        assert_eq!(result.sentiment_tone, AUTOMATIC_TONE);
        assert!(result.explanation.contains("92%"));
        assert_eq!(result.scenario_id, None);
        assert_eq!(result.language_used, "English");
    }
}
