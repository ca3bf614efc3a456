//! variable.rs
//! Named and broadcast variables inside a graph model: a junction that
//! joins loads and fans responses back out.

use super::description::{GraphVariableDescription, VariableKind};
use crate::param::load_ops::aggregate_params;
use crate::param::response_ops::combine_response_groups;
use crate::param::GraphParam;
use crate::simulation::env::{NodeRegistry, SampleSink};
use crate::store::{gen_sim_id, NodeType, SimulationNode};

#[derive(Debug, Clone)]
pub struct GraphVariable {
    pub sim_id: String,
    pub description: GraphVariableDescription,
    input_load: Vec<GraphParam>,
    load: Option<GraphParam>,
    input_response: Vec<Vec<GraphParam>>,
    response: Option<Vec<GraphParam>>,
}

impl GraphVariable {
    pub fn new(description: GraphVariableDescription, parent_path: &[String]) -> Self {
        Self {
            sim_id: gen_sim_id(parent_path, &description.object_id),
            description,
            input_load: Vec::new(),
            load: None,
            input_response: Vec::new(),
            response: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.description.object_id
    }

    pub fn node_type(&self) -> NodeType {
        match self.description.kind {
            VariableKind::NamedVariable => NodeType::NamedVariable,
            VariableKind::BroadcastVariable => NodeType::BroadcastVariable,
        }
    }

    pub fn init(&self, registry: &mut dyn NodeRegistry, parent_id: &str) {
        registry.register_node(
            SimulationNode::new(&self.sim_id, self.node_type(), &self.description.label)
                .with_parent(Some(parent_id))
                .with_process(self.id(), self.id()),
        );
    }

    pub fn reset(&mut self) {
        self.input_load.clear();
        self.load = None;
        self.input_response.clear();
        self.response = None;
    }

    pub fn accept_load(&mut self, load: GraphParam) {
        self.input_load.push(load);
    }

    pub fn process(&mut self, sink: &mut dyn SampleSink) {
        sink.push_exec(&self.sim_id, &self.description.label);
        self.load = aggregate_params(&self.input_load);
        if let Some(load) = &self.load {
            sink.store_raw_data(&self.sim_id, load);
        }
        sink.pop_exec();
    }

    pub fn yield_load(&self) -> Option<&GraphParam> {
        self.load.as_ref()
    }

    pub fn accept_response(&mut self, response: Vec<GraphParam>) {
        self.input_response.push(response);
    }

    /// Every consumer is an alternative path for the load, so their
    /// responses are joined rather than maxed.
    pub fn process_response(&mut self, sink: &mut dyn SampleSink) {
        sink.push_exec(&self.sim_id, &self.description.label);
        if !self.input_response.is_empty() {
            self.response = Some(combine_response_groups(&self.input_response));
        }
        sink.pop_exec();
    }

    pub fn yield_response(&self) -> Option<&[GraphParam]> {
        self.response.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::response_ops::make_latency_response;
    use crate::simulation::env::RunContext;

    fn variable() -> GraphVariable {
        GraphVariable::new(
            GraphVariableDescription {
                object_id: "v1".into(),
                kind: VariableKind::BroadcastVariable,
                label: "shared".into(),
            },
            &[],
        )
    }

    #[test]
    fn test_variable_joins_loads_and_records_them() {
        let mut var = variable();
        let mut ctx = RunContext::new(Some(1));
        var.init(&mut ctx, "gm");
        ctx.enter_step("s", "2019-01", None);

        var.accept_load(GraphParam::number(4.0, None));
        var.accept_load(GraphParam::number(6.0, None));
        var.process(&mut ctx);
        assert_eq!(var.yield_load().and_then(|l| l.number_value()), Some(10.0));

        let node = ctx.registry.get(&var.sim_id).unwrap();
        assert_eq!(node.node_type, NodeType::BroadcastVariable);
        assert_eq!(node.raw_data.len(), 1);
    }

    #[test]
    fn test_variable_joins_response_splits() {
        let mut var = variable();
        let mut ctx = RunContext::new(Some(1));
        var.accept_response(vec![make_latency_response(10.0, &[])]);
        var.accept_response(vec![make_latency_response(20.0, &[])]);
        var.process_response(&mut ctx);

        let response = var.yield_response().unwrap();
        let split = &response[0].as_response().unwrap().value;
        assert_eq!(split.len(), 2);
        assert_eq!(split.iter().map(|e| e.freq).sum::<f64>(), 1000.0);

        var.reset();
        assert!(var.yield_response().is_none());
    }
}
