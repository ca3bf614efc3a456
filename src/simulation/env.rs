//! env.rs
//! Narrow capabilities handed to graph elements: registration at build
//! time, sample storage while running, and construction of sub-processes.

use super::SimulationError;
use crate::graph::description::Process;
use crate::graph::node::SimulationProcess;
use crate::param::{GraphParam, Sampler};
use crate::store::{ExecFrame, MessageCode, Registry, SimulationNode, StepContext};

pub trait NodeRegistry {
    fn register_node(&mut self, node: SimulationNode);
}

pub trait SampleSink {
    fn step(&self) -> &StepContext;
    fn sampler(&mut self) -> &mut Sampler;
    fn store_raw_data(&mut self, node_id: &str, data: &GraphParam);
    fn store_raw_responses(&mut self, node_id: &str, responses: &[GraphParam]);
    fn warn(&mut self, node_id: &str, code: MessageCode, desc: Option<&str>);
    fn push_exec(&mut self, node_id: &str, name: &str);
    fn pop_exec(&mut self);
}

pub trait ProcessFactory {
    /// `parent_path` is the simulation path of the enclosing graph model,
    /// its own id included.
    fn build_process(&self, process: &Process, parent_path: &[String]) -> Result<Box<dyn SimulationProcess>, SimulationError>;
}

impl NodeRegistry for Registry {
    fn register_node(&mut self, node: SimulationNode) {
        self.insert(node);
    }
}

/// Mutable state of one configuration run. Owns the node registry for
/// the run's duration.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub registry: Registry,
    pub step: StepContext,
    pub sampler: Sampler,
    pub exec_stack: Vec<ExecFrame>,
}

impl RunContext {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            registry: Registry::new(),
            step: StepContext::default(),
            sampler: Sampler::new(seed),
            exec_stack: Vec::new(),
        }
    }

    pub fn enter_step(&mut self, scenario_id: &str, date: &str, mc_run: Option<u32>) {
        self.step = StepContext { scenario_id: scenario_id.to_string(), date: date.to_string(), mc_run };
        self.exec_stack.clear();
    }
}

impl NodeRegistry for RunContext {
    fn register_node(&mut self, node: SimulationNode) {
        self.registry.insert(node);
    }
}

impl SampleSink for RunContext {
    fn step(&self) -> &StepContext {
        &self.step
    }

    fn sampler(&mut self) -> &mut Sampler {
        &mut self.sampler
    }

    fn store_raw_data(&mut self, node_id: &str, data: &GraphParam) {
        self.registry.store_raw_data(node_id, &self.step, data);
    }

    fn store_raw_responses(&mut self, node_id: &str, responses: &[GraphParam]) {
        self.registry.store_raw_responses(node_id, &self.step, responses);
    }

    fn warn(&mut self, node_id: &str, code: MessageCode, desc: Option<&str>) {
        self.registry.warn(node_id, &self.step, &self.exec_stack, code, desc);
    }

    fn push_exec(&mut self, node_id: &str, name: &str) {
        self.exec_stack.push(ExecFrame { node_id: node_id.to_string(), name: name.to_string() });
    }

    fn pop_exec(&mut self) {
        self.exec_stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NodeType;

    #[test]
    fn test_run_context_tags_samples_with_the_current_step() {
        let mut ctx = RunContext::new(Some(1));
        ctx.register_node(SimulationNode::new("n", NodeType::ProcessOutport, "Out"));

        ctx.enter_step("s1", "2020-02", Some(4));
        ctx.push_exec("n", "Out");
        ctx.store_raw_data("n", &GraphParam::number(2.0, None));
        ctx.warn("n", MessageCode::InportParamMissing, None);
        ctx.pop_exec();

        let node = ctx.registry.get("n").unwrap();
        assert_eq!(node.raw_data[0].step_date, "2020-02");
        assert_eq!(node.raw_data[0].mc_run, Some(4));
        assert_eq!(node.warnings[0].stack.len(), 1);
        assert!(ctx.exec_stack.is_empty());
    }
}
