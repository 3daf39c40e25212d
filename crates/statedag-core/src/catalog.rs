//! Built-in scenarios and scenario file loading.

use crate::model::Scenario;
use crate::{Error, Result};
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

const BUILTIN_JSON: &str = include_str!("../data/scenarios.json");

static BUILTIN: OnceLock<std::result::Result<Vec<Scenario>, String>> = OnceLock::new();

/// The built-in scenario catalog, parsed and validated on first use.
pub fn builtin() -> Result<&'static [Scenario]> {
    let parsed = BUILTIN.get_or_init(|| parse_scenarios(BUILTIN_JSON).map_err(|e| e.to_string()));
    match parsed {
        Ok(scenarios) => Ok(scenarios.as_slice()),
        Err(message) => Err(Error::Catalog {
            message: message.clone(),
        }),
    }
}

/// Parses and validates a JSON scenario list.
pub fn parse_scenarios(json: &str) -> Result<Vec<Scenario>> {
    let scenarios: Vec<Scenario> = serde_json::from_str(json)?;
    validate_all(&scenarios)?;
    Ok(scenarios)
}

/// Loads a scenario list from a `.json`, `.yaml` or `.yml` file.
pub fn load_scenarios(path: &Path) -> Result<Vec<Scenario>> {
    let text = std::fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let scenarios: Vec<Scenario> = match ext.as_deref() {
        Some("json") => serde_json::from_str(&text)?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(&text)?,
        _ => {
            return Err(Error::UnsupportedFormat {
                path: path.display().to_string(),
            });
        }
    };
    validate_all(&scenarios)?;
    tracing::debug!(path = %path.display(), count = scenarios.len(), "loaded scenarios");
    Ok(scenarios)
}

fn validate_all(scenarios: &[Scenario]) -> Result<()> {
    let mut ids: HashSet<&str> = HashSet::new();
    for scenario in scenarios {
        if !ids.insert(scenario.id.as_str()) {
            return Err(Error::DuplicateScenario {
                id: scenario.id.clone(),
            });
        }
        scenario.validate()?;
    }
    Ok(())
}
