use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::model::{ComplaintModel, LinearTextModel};
use crate::models::ConfidenceVerdict;

/// Probability interval in which the local verdict is not trusted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UncertaintyBand {
    pub low: f64,
    pub high: f64,
}

impl Default for UncertaintyBand {
    fn default() -> Self {
        Self {
            low: 0.25,
            high: 0.75,
        }
    }
}

impl UncertaintyBand {
    /// Inclusive at both ends
    pub fn contains(&self, p: f64) -> bool {
        self.low <= p && p <= self.high
    }
}

/// Result of asking the gate about one text
#[derive(Debug, Clone, PartialEq)]
pub enum GateVerdict {
    Scored(ConfidenceVerdict),
    /// No model, or scoring failed; escalation is mandatory
    Unavailable(String),
}

/// Optional local classifier deciding whether the expensive call is needed
#[derive(Clone)]
pub struct LocalConfidenceGate {
    model: Option<Arc<dyn ComplaintModel>>,
    band: UncertaintyBand,
}

impl LocalConfidenceGate {
    pub fn new(model: Arc<dyn ComplaintModel>, band: UncertaintyBand) -> Self {
        Self {
            model: Some(model),
            band,
        }
    }

    /// A gate with no model; every record escalates
    pub fn unavailable(band: UncertaintyBand) -> Self {
        Self { model: None, band }
    }

    /// Load the artifact at `path`. Failure to load is not fatal: the gate
    /// reports itself unavailable.
    pub fn load(path: &Path, band: UncertaintyBand) -> Self {
        match LinearTextModel::load(path) {
            Ok(model) => {
                info!(
                    "Loaded local classifier from {:?} ({} features)",
                    path,
                    model.vectorizer.len()
                );
                Self::new(Arc::new(model), band)
            }
            Err(e) => {
                warn!("Local classifier unavailable, every record will escalate: {}", e);
                Self::unavailable(band)
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }

    pub fn band(&self) -> UncertaintyBand {
        self.band
    }

    /// Score a text; never fails
    pub fn evaluate(&self, text: &str) -> GateVerdict {
        let Some(model) = &self.model else {
            return GateVerdict::Unavailable("classifier not loaded".to_string());
        };

        let text = text.trim();
        if text.is_empty() {
            debug!("Empty text, returning neutral verdict");
            return GateVerdict::Scored(ConfidenceVerdict::neutral());
        }

        match model.predict_probability(text) {
            Ok([_, p]) if (0.0..=1.0).contains(&p) => {
                GateVerdict::Scored(ConfidenceVerdict::from_probability(p))
            }
            Ok([_, p]) => GateVerdict::Unavailable(format!("probability {} out of range", p)),
            Err(e) => GateVerdict::Unavailable(e.to_string()),
        }
    }

    /// True when `p` falls inside the uncertainty band
    pub fn needs_escalation(&self, p: f64) -> bool {
        self.band.contains(p)
    }
}
