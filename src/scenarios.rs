//! Prompt catalog: the fixed set of scenarios players are dealt each round.

use crate::protocol::ScenarioEntry;
use crate::types::{Player, ScenarioId};
use rand::Rng;
use std::path::Path;

/// Built-in placeholders, replaced via `SCENARIOS_FILE`
const DEFAULT_SCENARIOS: &[&str] = &[
    "Scenario 1 text placeholder",
    "Scenario 2 text placeholder",
    "Scenario 3 text placeholder",
    "Scenario 4 text placeholder",
    "Scenario 5 text placeholder",
    "Scenario 6 text placeholder",
];

/// Shown for ids outside the catalog
pub const UNKNOWN_SCENARIO: &str = "Unknown scenario";

#[derive(Debug, Clone)]
pub struct ScenarioCatalog {
    scenarios: Vec<String>,
}

impl Default for ScenarioCatalog {
    fn default() -> Self {
        Self {
            scenarios: DEFAULT_SCENARIOS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ScenarioCatalog {
    /// Build a catalog from explicit texts. Returns None for an empty list
    /// or one too large to be indexed by a `ScenarioId`.
    pub fn new(scenarios: Vec<String>) -> Option<Self> {
        if scenarios.is_empty() || scenarios.len() > ScenarioId::MAX as usize {
            return None;
        }
        Some(Self { scenarios })
    }

    /// Load the catalog from a JSON array of strings, falling back to the
    /// built-in placeholders if the file is unusable.
    pub fn from_file(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(
                    "Failed to read scenarios file {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                return Self::default();
            }
        };

        match serde_json::from_str::<Vec<String>>(&content) {
            Ok(list) => match Self::new(list) {
                Some(catalog) => {
                    tracing::info!(
                        "Loaded {} scenarios from {}",
                        catalog.len(),
                        path.display()
                    );
                    catalog
                }
                None => {
                    tracing::warn!(
                        "Scenarios file {} has an unusable number of entries. Using defaults.",
                        path.display()
                    );
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Scenarios file {} is not a JSON string array: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Look up a scenario text by id
    pub fn text(&self, id: ScenarioId) -> &str {
        (id as usize)
            .checked_sub(1)
            .and_then(|idx| self.scenarios.get(idx))
            .map(String::as_str)
            .unwrap_or(UNKNOWN_SCENARIO)
    }

    /// Entry for any id; unknown ids carry the placeholder text
    pub fn entry(&self, id: ScenarioId) -> ScenarioEntry {
        ScenarioEntry {
            id,
            text: self.text(id).to_string(),
        }
    }

    pub fn entries(&self) -> Vec<ScenarioEntry> {
        (1..=self.scenarios.len() as ScenarioId)
            .map(|id| self.entry(id))
            .collect()
    }

    /// Prompt text for the scenario dealt to `player`, if any
    pub fn text_for(&self, player: &Player) -> Option<String> {
        player.scenario_id.map(|id| self.text(id).to_string())
    }

    pub fn contains(&self, id: ScenarioId) -> bool {
        id >= 1 && (id as usize) <= self.scenarios.len()
    }

    /// Draw an id uniformly from 1..=len. Each call is independent.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> ScenarioId {
        rng.random_range(1..=self.scenarios.len() as ScenarioId)
    }
}
