use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::classifier::UncertaintyBand;
use crate::llm::RetryPolicy;

pub const DEFAULT_CLASSIFIER_PATH: &str = "models/complaint_classifier.json";

/// Policy knobs of the pipeline, read from the environment
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub band: UncertaintyBand,
    /// Retry budget of the cheap transcription call
    pub transcription_retry: RetryPolicy,
    /// Retry budget of the full analysis call; larger, as it is the final attempt
    pub full_analysis_retry: RetryPolicy,
    pub classifier_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            band: UncertaintyBand::default(),
            transcription_retry: RetryPolicy::new(
                8,
                Duration::from_secs(3),
                Duration::from_secs(1),
            ),
            full_analysis_retry: RetryPolicy::new(
                10,
                Duration::from_secs(5),
                Duration::from_millis(1500),
            ),
            classifier_path: PathBuf::from(DEFAULT_CLASSIFIER_PATH),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let band = UncertaintyBand {
            low: parse_or(&lookup, "UNCERTAINTY_LOW", defaults.band.low)?,
            high: parse_or(&lookup, "UNCERTAINTY_HIGH", defaults.band.high)?,
        };
        if !(0.0..=1.0).contains(&band.low) || !(0.0..=1.0).contains(&band.high) || band.low > band.high {
            bail!(
                "Invalid uncertainty band [{}, {}]: bounds must satisfy 0 <= low <= high <= 1",
                band.low,
                band.high
            );
        }

        let transcription_retry = retry_from(&lookup, "CHEAP", defaults.transcription_retry)?;
        let full_analysis_retry = retry_from(&lookup, "FULL", defaults.full_analysis_retry)?;
        let classifier_path = lookup("CLASSIFIER_MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.classifier_path);

        Ok(Self {
            band,
            transcription_retry,
            full_analysis_retry,
            classifier_path,
        })
    }
}

fn retry_from<F>(lookup: &F, prefix: &str, defaults: RetryPolicy) -> Result<RetryPolicy>
where
    F: Fn(&str) -> Option<String>,
{
    let max_retries = parse_or(lookup, &format!("{}_MAX_RETRIES", prefix), defaults.max_retries)?;
    let base_delay = seconds_or(lookup, &format!("{}_BASE_DELAY_SECS", prefix), defaults.base_delay)?;
    let jitter_bound = seconds_or(lookup, &format!("{}_JITTER_SECS", prefix), defaults.jitter_bound)?;
    let max_delay = seconds_or(lookup, &format!("{}_MAX_DELAY_SECS", prefix), defaults.max_delay)?;
    Ok(RetryPolicy::new(max_retries, base_delay, jitter_bound).with_max_delay(max_delay))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, value)),
        None => Ok(default),
    }
}

fn seconds_or<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: f64 = parse_or(lookup, key, default.as_secs_f64())?;
    Duration::try_from_secs_f64(secs).with_context(|| format!("Invalid duration for {}: {}", key, secs))
}
