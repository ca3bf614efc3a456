//! inputs.rs
//! Monthly inport values of a scenario. Fixed params are used as given,
//! forecast references are read from the projected sheet.

use super::config::{ScenarioInput, SimulationConfiguration, SimulationScenario};
use super::fetch::{Dependency, SheetLibrary};
use super::SimulationError;
use crate::param::load_ops::make_breakdown_relative;
use crate::param::{Aspect, GraphParam};
use crate::projection::{render_projections, Frame, Variable, VariableProjections};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// month -> inport id -> value
pub type ScenarioInputSeries = BTreeMap<String, BTreeMap<String, GraphParam>>;

/// Rendered sheets by (sheet id, version).
pub type SheetProjections = HashMap<(String, String), VariableProjections>;

/// Sheets the scenario's forecast references point to, without duplicates.
pub fn sheet_dependencies(
    config: &SimulationConfiguration,
    scenario: &SimulationScenario,
) -> Result<Vec<Dependency>, SimulationError> {
    let mut deps: Vec<Dependency> = Vec::new();
    for (inport_id, var_ref) in scenario.forecast_refs() {
        let sheet = config.forecasts.get(&var_ref.sheet_ref_id).ok_or_else(|| {
            SimulationError::Input(format!(
                "inport '{}' refers to unknown forecast sheet '{}'",
                inport_id, var_ref.sheet_ref_id
            ))
        })?;
        let version = sheet.version();
        if !deps.iter().any(|d| d.id == sheet.reference && d.version == version) {
            let name = sheet.label.as_deref().unwrap_or(&sheet.reference);
            deps.push(Dependency::new(&sheet.reference, &version, name));
        }
    }
    Ok(deps)
}

/// Renders every sheet of `deps` not rendered yet over the run's range.
pub fn project_sheets(
    deps: &[Dependency],
    sheets: &SheetLibrary,
    start: &str,
    last: &str,
    projections: &mut SheetProjections,
) -> Result<(), SimulationError> {
    for dep in deps {
        let key = (dep.id.clone(), dep.version.clone());
        if projections.contains_key(&key) {
            continue;
        }
        let variables = sheets
            .get(&dep.id, &dep.version)
            .ok_or_else(|| SimulationError::Input(format!("forecast sheet '{}' was not fetched", dep.name)))?;
        debug!(sheet = %dep.id, version = %dep.version, variables = variables.len(), "projecting sheet");
        projections.insert(key, render_projections(variables, start, last)?);
    }
    Ok(())
}

/// The value a forecast variable feeds into an inport for `month`.
///
/// Breakdown variables become relative aspects; everything else an
/// aspect number carrying the frame's standard deviation and the
/// variable's associated breakdowns as relative aspects.
pub fn variable_value(variable: &Variable, frames: &[Frame], month: &str) -> Result<GraphParam, String> {
    let not_found = || format!("could not find variable value for {}:{}", variable.id, month);
    let frame = frames.iter().find(|f| f.date == month).ok_or_else(not_found)?;
    if frame.has_error() {
        return Err(not_found());
    }

    let value = match frame.actual_value.or(frame.projected_value) {
        Some(value) => value,
        None => return Ok(GraphParam::aspect_number(0.0, frame.unit.as_deref(), Vec::new(), Some(0.0))),
    };

    if variable.is_breakdown() {
        let slices = frame.sub_frames.iter().flatten().map(|s| (s.name.as_str(), s.value)).collect::<Vec<_>>();
        let aspect = make_breakdown_relative(&Aspect::new(&variable.name, &slices));
        return Ok(GraphParam::Aspect { value: aspect });
    }

    let aspects = frame
        .associated_breakdowns
        .iter()
        .flatten()
        .map(|b| Aspect { slices: b.slices.clone(), ..Aspect::new(&b.name, &[]) }.relative())
        .collect();
    Ok(GraphParam::aspect_number(value, frame.unit.as_deref(), aspects, frame.std_dev()))
}

/// Resolves every inport of `scenario` for every month. Any forecast
/// value that cannot be resolved fails the whole scenario.
pub fn scenario_inputs(
    config: &SimulationConfiguration,
    scenario: &SimulationScenario,
    sheets: &SheetLibrary,
    projections: &SheetProjections,
    months: &[String],
) -> Result<ScenarioInputSeries, SimulationError> {
    let mut series = ScenarioInputSeries::new();
    for month in months {
        let mut values = BTreeMap::new();
        for (inport_id, input) in &scenario.inports {
            let value = match input {
                ScenarioInput::Param(param) => param.clone(),
                ScenarioInput::Forecast(var_ref) => {
                    let input_error = |reason: String| {
                        SimulationError::Input(format!("failed to resolve inport '{}': {}", inport_id, reason))
                    };
                    let sheet = config
                        .forecasts
                        .get(&var_ref.sheet_ref_id)
                        .ok_or_else(|| input_error(format!("unknown forecast sheet '{}'", var_ref.sheet_ref_id)))?;
                    let key = (sheet.reference.clone(), sheet.version());
                    let variable = sheets
                        .get(&key.0, &key.1)
                        .and_then(|vars| vars.iter().find(|v| v.id == var_ref.variable_id))
                        .ok_or_else(|| input_error(format!("variable '{}' does not exist", var_ref.variable_id)))?;
                    let frames = projections
                        .get(&key)
                        .and_then(|p| p.get(&variable.id))
                        .ok_or_else(|| input_error("no projection".to_string()))?;
                    variable_value(variable, frames, month).map_err(input_error)?
                }
            };
            values.insert(inport_id.clone(), value);
        }
        series.insert(month.clone(), values);
    }
    Ok(series)
}
