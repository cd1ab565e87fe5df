use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use regex::Regex;
use tracing::{debug, warn};

use super::client::{ModelTransport, TransportError};
use crate::models::{CallOutcome, CallRequest};

/// Lower bound of the random jitter added to every delay
const JITTER_FLOOR_SECS: f64 = 0.1;

/// Longest single wait unless a policy says otherwise
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(600);

static RETRY_IN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)retry in\s+([\d.]+)\s*s").expect("valid regex"));
static RETRY_DELAY_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)["']?retryDelay["']?\s*:\s*["'](\d+(?:\.\d+)?)s["']"#).expect("valid regex")
});

/// Retry budget for one kind of call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first
    pub max_retries: u32,
    /// Base of the exponential backoff
    pub base_delay: Duration,
    /// Upper bound of the uniform jitter added to each delay
    pub jitter_bound: Duration,
    /// Ceiling on the backoff or server-suggested delay, before jitter
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, jitter_bound: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            jitter_bound,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before the next attempt, ignoring jitter. `attempt` is 1-based.
    /// Saturates instead of overflowing.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(30);
        self.base_delay.checked_mul(factor).unwrap_or(Duration::MAX)
    }
}

/// How a failed attempt should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    QuotaExhausted,
    Transient,
    Fatal,
}

/// Classify a failed attempt by its error text.
///
/// Daily quota wording wins over everything else: it will not reset within
/// any retry window.
pub fn classify_failure(error: &TransportError) -> FailureClass {
    let text = error.to_string();
    let lower = text.to_lowercase();

    let daily_quota = lower.contains("generaterequestsperdayperproject")
        || lower.contains("requestsperday")
        || lower.contains("requests per day")
        || lower.contains("per day")
        || lower.contains("daily quota")
        || (lower.contains("quota exceeded for metric") && lower.contains("perday"));
    if daily_quota {
        return FailureClass::QuotaExhausted;
    }

    if matches!(error, TransportError::Connection(_)) {
        return FailureClass::Transient;
    }

    let transient = text.contains("503")
        || text.contains("429")
        || lower.contains("unavailable")
        || lower.contains("overloaded")
        || lower.contains("resource_exhausted")
        || lower.contains("resource exhausted")
        || lower.contains("quota")
        || lower.contains("rate limit")
        || lower.contains("ratelimit")
        || lower.contains("rate_limit")
        || lower.contains("too many requests");
    if transient {
        FailureClass::Transient
    } else {
        FailureClass::Fatal
    }
}

/// Server-suggested delay, either "retry in 7.5s" or `'retryDelay': '7s'`
pub fn extract_retry_delay(text: &str) -> Option<Duration> {
    [&*RETRY_IN_RE, &*RETRY_DELAY_FIELD_RE]
        .iter()
        .filter_map(|re| re.captures(text))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
        .find(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
}

/// Blocks the caller between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer; dropping the future cancels the wait
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Wraps a transport with bounded retries, backoff, jitter and quota fail-fast
#[derive(Clone)]
pub struct ResilientCallClient {
    transport: Arc<dyn ModelTransport>,
    sleeper: Arc<dyn Sleeper>,
}

impl ResilientCallClient {
    pub fn new(transport: Arc<dyn ModelTransport>) -> Self {
        Self::with_sleeper(transport, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(transport: Arc<dyn ModelTransport>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { transport, sleeper }
    }

    /// Issue one logical request, retrying transient failures per `policy`
    pub async fn call(&self, request: &CallRequest, policy: &RetryPolicy) -> CallOutcome {
        let max_attempts = policy.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            let error = match self.transport.generate(request).await {
                Ok(text) => return CallOutcome::Success(text),
                Err(e) => e,
            };
            last_error = error.to_string();

            match classify_failure(&error) {
                FailureClass::QuotaExhausted => {
                    warn!("Daily quota exhausted, not retrying: {}", last_error);
                    return CallOutcome::QuotaExhausted(last_error);
                }
                FailureClass::Fatal => {
                    warn!("Non-retryable failure: {}", last_error);
                    return CallOutcome::FatalFailure(last_error);
                }
                FailureClass::Transient => {}
            }

            if attempt == max_attempts {
                break;
            }

            let delay = extract_retry_delay(&last_error)
                .unwrap_or_else(|| policy.backoff_delay(attempt))
                .min(policy.max_delay)
                .saturating_add(jitter(policy.jitter_bound));

            warn!(
                "Retry {}/{} sleeping {:.1}s after: {}",
                attempt,
                max_attempts,
                delay.as_secs_f64(),
                last_error
            );
            self.sleeper.sleep(delay).await;
        }

        debug!("Retries exhausted after {} attempts", max_attempts);
        CallOutcome::TransientFailure(last_error)
    }
}

/// Uniform jitter in (0.1s, bound); the floor alone when the bound is too small
fn jitter(bound: Duration) -> Duration {
    let upper = bound.as_secs_f64();
    let secs = if upper > JITTER_FLOOR_SECS {
        rand::rng().random_range(JITTER_FLOOR_SECS..upper)
    } else {
        JITTER_FLOOR_SECS
    };
    Duration::try_from_secs_f64(secs).unwrap_or(bound)
}
