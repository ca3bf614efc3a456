//! config.rs
//! Simulation configuration documents and engine options.

use crate::graph::description::{tracking_version, Tracking};
use crate::param::GraphParam;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Knobs of the engine itself, independent of any configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineOptions {
    /// Monte Carlo seed; entropy when absent.
    pub seed: Option<u64>,
    pub default_monte_carlo_iterations: u32,
    pub csv_precision: u32,
    pub histogram_buckets: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { seed: None, default_monte_carlo_iterations: 0, csv_precision: 2, histogram_buckets: 10 }
    }
}

impl EngineOptions {
    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed), ..Default::default() }
    }
}

/// A forecast sheet the scenarios may draw variables from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastSheetRef {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_nr: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking: Option<Tracking>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ForecastSheetRef {
    pub fn version(&self) -> String {
        tracking_version(self.tracking, self.release_nr)
    }
}

/// Scenario input taking its monthly value from a forecast variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastVarRef {
    pub variable_id: String,
    pub sheet_ref_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScenarioInput {
    Forecast(ForecastVarRef),
    Param(GraphParam),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationScenario {
    #[serde(default)]
    pub object_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    #[serde(default)]
    pub inports: BTreeMap<String, ScenarioInput>,
}

impl SimulationScenario {
    pub fn new(id: &str, name: &str) -> Self {
        Self { object_id: id.to_string(), name: name.to_string(), ..Default::default() }
    }

    pub fn with_input(mut self, inport_id: &str, input: ScenarioInput) -> Self {
        self.inports.insert(inport_id.to_string(), input);
        self
    }

    /// Forecast references of this scenario, by inport.
    pub fn forecast_refs(&self) -> impl Iterator<Item = (&String, &ForecastVarRef)> {
        self.inports.iter().filter_map(|(id, input)| match input {
            ScenarioInput::Forecast(r) => Some((id, r)),
            ScenarioInput::Param(_) => None,
        })
    }
}

/// What to simulate: a graph model, a month range and the scenarios
/// feeding its inports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfiguration {
    #[serde(default)]
    pub object_id: String,
    /// Id of the graph model under test.
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_nr: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking: Option<Tracking>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monte_carlo_iterations: Option<u32>,
    #[serde(default)]
    pub forecasts: BTreeMap<String, ForecastSheetRef>,
    pub step_start: String,
    pub step_last: String,
    #[serde(default)]
    pub scenarios: BTreeMap<String, SimulationScenario>,
}

impl SimulationConfiguration {
    pub fn new(id: &str, model_ref: &str, step_start: &str, step_last: &str) -> Self {
        Self {
            object_id: id.to_string(),
            reference: model_ref.to_string(),
            release_nr: None,
            tracking: None,
            model_name: None,
            monte_carlo_iterations: None,
            forecasts: BTreeMap::new(),
            step_start: step_start.to_string(),
            step_last: step_last.to_string(),
            scenarios: BTreeMap::new(),
        }
    }

    pub fn with_scenario(mut self, scenario: SimulationScenario) -> Self {
        self.scenarios.insert(scenario.object_id.clone(), scenario);
        self
    }

    pub fn with_forecast(mut self, sheet_ref_id: &str, sheet: ForecastSheetRef) -> Self {
        self.forecasts.insert(sheet_ref_id.to_string(), sheet);
        self
    }

    /// Version of the model under test.
    pub fn version(&self) -> String {
        tracking_version(self.tracking, self.release_nr)
    }

    pub fn iterations(&self, options: &EngineOptions) -> u32 {
        self.monte_carlo_iterations.unwrap_or(options.default_monte_carlo_iterations)
    }

    /// Display name used in fetch errors for the root model.
    pub fn model_display_name(&self) -> &str {
        self.model_name.as_deref().unwrap_or(&self.reference)
    }

    pub fn active_scenarios(&self) -> impl Iterator<Item = &SimulationScenario> {
        self.scenarios.values().filter(|s| !s.disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_wire_format() {
        let json = r#"{
            "objectId": "conf", "ref": "gm", "tracking": "FIXED", "releaseNr": 3,
            "monteCarloIterations": 20, "stepStart": "2024-01", "stepLast": "2024-06",
            "forecasts": {"fc1": {"ref": "sheet", "tracking": "CURRENT_VERSION", "releaseNr": 2}},
            "scenarios": {"s1": {"objectId": "s1", "name": "Base", "inports": {
                "in1": {"type": "NUMBER", "value": 5},
                "in2": {"variableId": "v1", "sheetRefId": "fc1", "name": "Users"}
            }}}
        }"#;
        let conf: SimulationConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(conf.version(), "r3");
        assert_eq!(conf.forecasts["fc1"].version(), "latest");
        assert_eq!(conf.iterations(&EngineOptions::default()), 20);

        let scenario = &conf.scenarios["s1"];
        assert_eq!(scenario.inports["in1"], ScenarioInput::Param(GraphParam::number(5.0, None)));
        let refs: Vec<_> = scenario.forecast_refs().collect();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].1.variable_id, "v1");
    }

    #[test]
    fn test_engine_options_defaults() {
        let options: EngineOptions = serde_json::from_str(r#"{"seed": 9}"#).unwrap();
        assert_eq!(options.seed, Some(9));
        assert_eq!(options.csv_precision, 2);
        assert_eq!(options.histogram_buckets, 10);

        let conf = SimulationConfiguration::new("c", "gm", "2024-01", "2024-01");
        assert_eq!(conf.iterations(&EngineOptions { default_monte_carlo_iterations: 4, ..options }), 4);
    }

    #[test]
    fn test_disabled_scenarios_are_skipped() {
        let mut off = SimulationScenario::new("b", "Off");
        off.disabled = true;
        let conf = SimulationConfiguration::new("c", "gm", "2024-01", "2024-01")
            .with_scenario(SimulationScenario::new("a", "On"))
            .with_scenario(off);
        let ids: Vec<&str> = conf.active_scenarios().map(|s| s.object_id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }
}
