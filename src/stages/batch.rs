use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, info, warn};

use super::orchestrator::PipelineOrchestrator;
use crate::io::{detect_media_kind, load_input};
use crate::llm::Sleeper;
use crate::models::MediaKind;

/// Pause after each record, by media kind, to stay under per-minute limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchPacing {
    pub text_delay: Duration,
    pub audio_delay: Duration,
}

impl Default for BatchPacing {
    fn default() -> Self {
        Self {
            text_delay: Duration::from_secs(2),
            audio_delay: Duration::from_secs(10),
        }
    }
}

impl BatchPacing {
    pub fn delay_for(&self, kind: MediaKind) -> Duration {
        match kind {
            MediaKind::Text => self.text_delay,
            MediaKind::Audio => self.audio_delay,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub escalated: usize,
    /// Files never attempted because the daily quota ran out
    pub skipped: usize,
    pub stopped_on_quota: bool,
}

/// Process files one at a time. A failed record is logged and skipped;
/// quota exhaustion stops the batch.
pub async fn run_batch(
    orchestrator: &PipelineOrchestrator<'_>,
    paths: &[PathBuf],
    pacing: &BatchPacing,
    sleeper: &dyn Sleeper,
) -> BatchSummary {
    let mut summary = BatchSummary::default();

    for (i, path) in paths.iter().enumerate() {
        info!("[{}/{}] Processing {:?}", i + 1, paths.len(), path);

        let input = match load_input(path) {
            Ok(input) => input,
            Err(e) => {
                error!("Skipping {:?}: {:#}", path, e);
                summary.failed += 1;
                continue;
            }
        };

        match orchestrator.process(&input).await {
            Ok(record) => {
                summary.succeeded += 1;
                if record.escalated {
                    summary.escalated += 1;
                }
            }
            Err(e) if e.is_quota_exhausted() => {
                error!("Daily quota exhausted at {:?}, stopping batch: {}", path, e);
                summary.failed += 1;
                summary.skipped = paths.len() - i - 1;
                summary.stopped_on_quota = true;
                break;
            }
            Err(e) => {
                warn!("Failed {:?}: {}", path, e);
                summary.failed += 1;
            }
        }

        if i + 1 < paths.len() {
            sleeper.sleep(pacing.delay_for(detect_media_kind(path))).await;
        }
    }

    info!(
        "Batch done: {} succeeded, {} failed, {} escalated, {} skipped",
        summary.succeeded, summary.failed, summary.escalated, summary.skipped
    );
    summary
}
