use std::error::Error;
use crate::logger::{Logger, LogEvent};
use crate::{errln, logln};

/// Function type for scenario entry functions
pub type ScenarioFn = fn(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn Error>>;

/// Entry in the scenario catalog
#[derive(Clone)]
pub struct ScenarioEntry {
    pub short_name: &'static str,
    pub run: ScenarioFn,
}

// Create an inventory collection for scenario entries
inventory::collect!(ScenarioEntry);

/// Get all registered scenarios from the catalog, sorted by name
pub fn get_scenario_catalog() -> Vec<ScenarioEntry> {
    let mut entries: Vec<ScenarioEntry> = inventory::iter::<ScenarioEntry>
        .into_iter()
        .cloned()
        .collect();
    entries.sort_by_key(|entry| entry.short_name);
    entries
}

/// Log one ✓/✗ line and remember the failure
pub fn check(logger: &mut Logger, errors: &mut Vec<String>, passed: bool, msg: String) {
    if passed {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
        errors.push(msg);
    }
}

/// Turn the collected failures into the scenario result
pub fn finish(scenario_name: &str, errors: Vec<String>) -> Result<(), Box<dyn Error>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(format!("Scenario '{}' validation failed:\n{}", scenario_name, errors.join("\n")).into())
    }
}

// Scenario modules
pub mod local_search_worked_example;
pub mod straight_mv_scpp;
pub mod target_price_scpp;
pub mod joint_local_scpp;
