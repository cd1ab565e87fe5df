use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A customer-interaction scenario the full analysis may assign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Ordered list of scenarios supplied by the persistence side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenarioCatalog {
    scenarios: Vec<Scenario>,
}

impl ScenarioCatalog {
    pub fn new(scenarios: Vec<Scenario>) -> Self {
        Self { scenarios }
    }

    /// Load a catalog from a JSON array of `{id, name, description}`
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario catalog: {:?}", path))?;
        let scenarios: Vec<Scenario> =
            serde_json::from_str(&content).context("Failed to parse scenario catalog")?;
        Ok(Self::new(scenarios))
    }

    pub fn contains(&self, id: i64) -> bool {
        self.scenarios.iter().any(|s| s.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// Render the catalog as the enumerated list embedded in prompts
    pub fn render(&self) -> String {
        self.scenarios
            .iter()
            .map(|s| format!("ID {}: {} - {}", s.id, s.name, s.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
