//! harness.rs
//! Runs one simulation configuration end to end and reports the outcome
//! as a [`SimulationResult`].
//!
//! A run moves through four states. It is QUEUED when created, RUNNING
//! once every graph model has been fetched, and DONE or FAILED at the
//! end. A failing run never surfaces as an `Err`: the error message, the
//! stage and code it failed in, and the execution stack at the time are
//! recorded on the result instead.

use super::config::{EngineOptions, ForecastSheetRef, SimulationConfiguration, SimulationScenario};
use super::env::RunContext;
use super::fetch::{fetch_models, fetch_sheets, Dependency, ForecastSource, ModelSource, SheetLibrary};
use super::inputs::{project_sheets, scenario_inputs, sheet_dependencies, ScenarioInputSeries, SheetProjections};
use super::montecarlo::{sample_inputs, Pass};
use super::SimulationError;
use crate::aggregation::aggregate;
use crate::graph::model::GraphModel;
use crate::graph::node::SimulationProcess;
use crate::param::GraphParam;
use crate::projection::{get_months, render_projections_csv};
use crate::store::{ExecFrame, MessageCode, ResultStage, RuntimeMessage, SimulationNode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationState {
    Queued,
    Running,
    Failed,
    Done,
}

/// Where and why a run failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    pub stage: ResultStage,
    pub code: MessageCode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stack: Vec<ExecFrame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub object_id: String,
    pub state: SimulationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<ErrorDetails>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<RuntimeMessage>,
    pub simulation_configuration_id: String,
    pub simulation_configuration_version: String,
    pub step_start: String,
    pub step_last: String,
    pub queued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ran_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Result nodes by id.
    #[serde(default)]
    pub nodes: BTreeMap<String, SimulationNode>,
    /// The scenarios that were simulated.
    #[serde(default)]
    pub scenarios: BTreeMap<String, SimulationScenario>,
}

impl SimulationResult {
    pub fn queued(config: &SimulationConfiguration) -> Self {
        Self {
            object_id: format!("{}-result", config.object_id),
            state: SimulationState::Queued,
            error: None,
            error_details: None,
            warnings: Vec::new(),
            simulation_configuration_id: config.object_id.clone(),
            simulation_configuration_version: config.version(),
            step_start: config.step_start.clone(),
            step_last: config.step_last.clone(),
            queued_at: Utc::now(),
            ran_at: None,
            finished_at: None,
            nodes: BTreeMap::new(),
            scenarios: BTreeMap::new(),
        }
    }

    fn fail(&mut self, err: &SimulationError, stack: &[ExecFrame]) {
        self.state = SimulationState::Failed;
        self.error = Some(err.to_string());
        self.error_details = Some(ErrorDetails {
            stage: err.stage(),
            code: err.code(),
            stack: stack.to_vec(),
            node_id: stack.last().map(|f| f.node_id.clone()),
        });
    }

    /// First node with the given name.
    pub fn node_by_name(&self, name: &str) -> Option<&SimulationNode> {
        self.nodes.values().find(|n| n.name.as_deref() == Some(name))
    }
}

/// Runs configurations against a model source and a forecast source.
pub struct Harness<M, F> {
    models: M,
    forecasts: F,
    options: EngineOptions,
}

impl<M: ModelSource, F: ForecastSource> Harness<M, F> {
    pub fn new(models: M, forecasts: F, options: EngineOptions) -> Self {
        Self { models, forecasts, options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub async fn run_configuration(&self, config: &SimulationConfiguration) -> SimulationResult {
        let mut result = SimulationResult::queued(config);
        let mut ctx = RunContext::new(self.options.seed);
        info!(configuration = %config.object_id, model = %config.reference, "simulation queued");

        match self.execute(config, &mut result, &mut ctx).await {
            Ok(()) => {
                result.state = SimulationState::Done;
                info!(configuration = %config.object_id, nodes = result.nodes.len(), "simulation done");
            }
            Err(err) => {
                warn!(configuration = %config.object_id, error = %err, "simulation failed");
                result.fail(&err, &ctx.exec_stack);
            }
        }
        result.finished_at = Some(Utc::now());
        result
    }

    async fn execute(
        &self,
        config: &SimulationConfiguration,
        result: &mut SimulationResult,
        ctx: &mut RunContext,
    ) -> Result<(), SimulationError> {
        // 1. Date range
        let months = get_months(&config.step_start, &config.step_last);
        if months.is_empty() {
            return Err(SimulationError::Range { start: config.step_start.clone(), last: config.step_last.clone() });
        }

        // 2. Documents
        let version = config.version();
        let library =
            fetch_models(&self.models, Dependency::new(&config.reference, &version, config.model_display_name())).await?;
        let mut sheets = SheetLibrary::new();
        let mut deps: Vec<Dependency> = Vec::new();
        for scenario in config.active_scenarios() {
            for dep in sheet_dependencies(config, scenario)? {
                if !deps.contains(&dep) {
                    deps.push(dep);
                }
            }
        }
        fetch_sheets(&self.forecasts, &deps, &mut sheets).await?;
        result.state = SimulationState::Running;
        result.ran_at = Some(Utc::now());

        // 3. Root model
        let description = library
            .get(&config.reference, &version)
            .cloned()
            .ok_or_else(|| SimulationError::InitFailed(config.model_display_name().to_string()))?;
        let process = GraphModel::root_process(&description, &version);
        let mut model = GraphModel::new(description, process, &[]);
        model.init(ctx, &library)?;
        debug!(nodes = ctx.registry.count(), "graph model initialized");

        // 4. Scenarios, month by month: one mean pass, then the Monte Carlo passes
        let iterations = config.iterations(&self.options);
        let mut projections = SheetProjections::new();
        let mut scenario_ids = Vec::new();
        for scenario in config.active_scenarios() {
            let deps = sheet_dependencies(config, scenario)?;
            project_sheets(&deps, &sheets, &config.step_start, &config.step_last, &mut projections)?;
            let series: ScenarioInputSeries = scenario_inputs(config, scenario, &sheets, &projections, &months)?;
            info!(scenario = %scenario.name, months = series.len(), iterations, "simulating scenario");

            for (month, inputs) in &series {
                ctx.enter_step(&scenario.object_id, month, None);
                run_pass(&mut model, inputs, ctx, Pass::Mean);
                for run in 0..iterations {
                    ctx.enter_step(&scenario.object_id, month, Some(run));
                    run_pass(&mut model, inputs, ctx, Pass::MonteCarlo);
                }
            }
            scenario_ids.push(scenario.object_id.clone());
            result.scenarios.insert(scenario.object_id.clone(), scenario.clone());
        }
        model.post_process();
        model.finalize();

        // 5. Aggregation
        ctx.exec_stack.clear();
        result.warnings = ctx.registry.warnings();
        let registry = std::mem::take(&mut ctx.registry);
        let nodes = aggregate(registry.into_nodes(), &scenario_ids, &months, self.options.histogram_buckets)?;
        result.nodes = nodes.into_iter().map(|n| (n.object_id.clone(), n)).collect();
        Ok(())
    }

    /// Renders a forecast sheet as CSV over the given month range.
    pub async fn forecast_csv(&self, sheet: &ForecastSheetRef, start: &str, last: &str) -> Result<String, SimulationError> {
        let dep = Dependency::new(&sheet.reference, &sheet.version(), sheet.label.as_deref().unwrap_or(&sheet.reference));
        let mut library = SheetLibrary::new();
        fetch_sheets(&self.forecasts, std::slice::from_ref(&dep), &mut library).await?;
        let variables = library.get(&dep.id, &dep.version).unwrap_or_default();
        Ok(render_projections_csv(variables, start, last, Some(self.options.csv_precision))?)
    }
}

fn run_pass(model: &mut GraphModel, inputs: &BTreeMap<String, GraphParam>, ctx: &mut RunContext, pass: Pass) {
    model.reset();
    for (inport_id, load) in sample_inputs(inputs, &mut ctx.sampler, pass) {
        model.accept_load(load, &inport_id, ctx);
    }
    model.process(ctx);
    model.process_response(ctx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::description::GraphModelDescription;
    use crate::projection::{GrowthType, TimeSegment, Variable, VariableType};
    use crate::simulation::config::{ForecastVarRef, ScenarioInput};
    use crate::simulation::fetch::SourceError;
    use crate::store::{Aggregate, AggregationMethod, NodeType};
    use async_trait::async_trait;
    use futures::executor::block_on;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Store {
        models: HashMap<String, GraphModelDescription>,
        sheets: HashMap<String, Vec<Variable>>,
    }

    #[async_trait]
    impl ModelSource for Store {
        async fn fetch_model(&self, id: &str, _version: &str) -> Result<GraphModelDescription, SourceError> {
            self.models.get(id).cloned().ok_or(SourceError::NotFound)
        }
    }

    #[async_trait]
    impl ForecastSource for Store {
        async fn fetch_variables(&self, sheet_id: &str, _version: &str) -> Result<Vec<Variable>, SourceError> {
            self.sheets.get(sheet_id).cloned().ok_or(SourceError::NotFound)
        }
    }

    fn harness(options: EngineOptions) -> Harness<Store, Store> {
        let model = GraphModelDescription::new("gm", "Web")
            .with_inport("in", "Requests")
            .with_outport("out", "Served")
            .connect("in", "out");
        let mut users = Variable::new("users", "Users", VariableType::Integer, Some("users"));
        users
            .add_time_segment(TimeSegment::basic("2024-01", 100.0, 0.1, GrowthType::Exponential))
            .unwrap();
        let models = Store { models: HashMap::from([("gm".to_string(), model)]), ..Default::default() };
        let sheets = Store { sheets: HashMap::from([("sheet".to_string(), vec![users])]), ..Default::default() };
        Harness::new(models, sheets, options)
    }

    fn avg(node: &SimulationNode, scenario: &str, month: &str) -> f64 {
        let data = node.aggregated_report[scenario][month].data.as_ref().unwrap();
        data[&AggregationMethod::Avg].as_number().unwrap().value
    }

    fn fixed_input(value: GraphParam) -> SimulationConfiguration {
        SimulationConfiguration::new("conf", "gm", "2024-01", "2024-03")
            .with_scenario(SimulationScenario::new("s1", "Base").with_input("in", ScenarioInput::Param(value)))
    }

    #[test]
    fn test_run_reports_per_month() {
        let h = harness(EngineOptions::seeded(7));
        let result = block_on(h.run_configuration(&fixed_input(GraphParam::number(10.0, Some("rps")))));

        assert_eq!(result.state, SimulationState::Done, "{:?}", result.error);
        assert!(result.ran_at.is_some() && result.finished_at.is_some());
        let inport = result.node_by_name("Requests").unwrap();
        assert_eq!(inport.node_type, NodeType::ProcessInport);
        assert_eq!(inport.aggregated_report["s1"].len(), 3);
        assert_eq!(avg(inport, "s1", "2024-02"), 10.0);
        assert_eq!(avg(result.node_by_name("Served").unwrap(), "s1", "2024-03"), 10.0);
        assert!(result.scenarios.contains_key("s1"));
    }

    #[test]
    fn test_monte_carlo_passes_follow_the_mean_pass() {
        let h = harness(EngineOptions { default_monte_carlo_iterations: 40, ..EngineOptions::seeded(3) });
        let input = GraphParam::dist_number(100.0, None, Some(10.0));
        let result = block_on(h.run_configuration(&fixed_input(input)));
        assert_eq!(result.state, SimulationState::Done);

        let inport = result.node_by_name("Requests").unwrap();
        let data = inport.aggregated_report["s1"]["2024-01"].data.as_ref().unwrap();
        match &data[&AggregationMethod::Histogram] {
            Aggregate::Histogram { buckets, .. } => assert_eq!(buckets.iter().map(|b| b.count).sum::<usize>(), 41),
            other => panic!("unexpected {:?}", other),
        }
        let min = data[&AggregationMethod::Min].as_number().unwrap().value;
        let max = data[&AggregationMethod::Max].as_number().unwrap().value;
        assert!(min < max);
    }

    #[test]
    fn test_forecast_input() {
        let sheet = ForecastSheetRef { reference: "sheet".into(), release_nr: None, tracking: None, label: Some("Demand".into()) };
        let var_ref = ForecastVarRef { variable_id: "users".into(), sheet_ref_id: "fc".into(), unit: None, name: None };
        let config = SimulationConfiguration::new("conf", "gm", "2024-01", "2024-02")
            .with_forecast("fc", sheet)
            .with_scenario(SimulationScenario::new("s1", "Base").with_input("in", ScenarioInput::Forecast(var_ref)));

        let result = block_on(harness(EngineOptions::seeded(1)).run_configuration(&config));
        assert_eq!(result.state, SimulationState::Done, "{:?}", result.error);
        let inport = result.node_by_name("Requests").unwrap();
        assert_eq!(avg(inport, "s1", "2024-01"), 100.0);
        assert!((avg(inport, "s1", "2024-02") - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_disabled_scenarios_are_skipped() {
        let mut disabled = SimulationScenario::new("s2", "Off").with_input("in", ScenarioInput::Param(GraphParam::number(1.0, None)));
        disabled.disabled = true;
        let config = fixed_input(GraphParam::number(5.0, None)).with_scenario(disabled);
        let result = block_on(harness(EngineOptions::default()).run_configuration(&config));
        assert_eq!(result.scenarios.len(), 1);
        assert!(!result.node_by_name("Requests").unwrap().aggregated_report.contains_key("s2"));
    }

    #[test]
    fn test_missing_model_fails_setup() {
        let config = SimulationConfiguration::new("conf", "nope", "2024-01", "2024-02");
        let result = block_on(harness(EngineOptions::default()).run_configuration(&config));
        assert_eq!(result.state, SimulationState::Failed);
        assert!(result.ran_at.is_none());
        let details = result.error_details.unwrap();
        assert_eq!(details.stage, ResultStage::Setup);
        assert_eq!(details.code, MessageCode::GraphModelMissing);
    }

    #[test]
    fn test_invalid_range_fails() {
        let config = SimulationConfiguration::new("conf", "gm", "2024-05", "2024-01");
        let result = block_on(harness(EngineOptions::default()).run_configuration(&config));
        assert_eq!(result.state, SimulationState::Failed);
        assert_eq!(result.error_details.map(|d| d.code), Some(MessageCode::InvalidDateRange));
    }

    #[test]
    fn test_unknown_forecast_variable_fails() {
        let sheet = ForecastSheetRef { reference: "sheet".into(), release_nr: None, tracking: None, label: None };
        let var_ref = ForecastVarRef { variable_id: "ghost".into(), sheet_ref_id: "fc".into(), unit: None, name: None };
        let config = SimulationConfiguration::new("conf", "gm", "2024-01", "2024-01")
            .with_forecast("fc", sheet)
            .with_scenario(SimulationScenario::new("s1", "Base").with_input("in", ScenarioInput::Forecast(var_ref)));
        let result = block_on(harness(EngineOptions::default()).run_configuration(&config));
        assert_eq!(result.state, SimulationState::Failed);
        assert_eq!(result.error_details.map(|d| d.stage), Some(ResultStage::Simulation));
        assert!(result.error.unwrap().contains("ghost"));
    }

    #[test]
    fn test_result_wire_format() {
        let result = block_on(harness(EngineOptions::default()).run_configuration(&fixed_input(GraphParam::number(1.0, None))));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["state"], "DONE");
        assert_eq!(json["simulationConfigurationId"], "conf");
        assert!(json["queuedAt"].as_str().unwrap().contains('T'));
        assert!(json.get("errorDetails").is_none());
    }

    #[test]
    fn test_forecast_csv() {
        let h = harness(EngineOptions::default());
        let sheet = ForecastSheetRef { reference: "sheet".into(), release_nr: None, tracking: None, label: None };
        let csv = block_on(h.forecast_csv(&sheet, "2024-01", "2024-02")).unwrap();
        assert!(csv.starts_with("Variable,Type,Breakdown"));
        assert!(csv.contains("Users"));
    }
}
