//! port.rs
//! Typed endpoints of processes and graph models. Loads are collected and
//! aggregated on the way in, responses on the way back.

use super::description::{InportDescription, OutportDescription, ProcessPort, ResponsePolicy};
use crate::param::load_ops::aggregate_params;
use crate::param::response_ops::max_response_groups;
use crate::param::{Aspect, GraphParam};
use crate::simulation::env::{NodeRegistry, SampleSink};
use crate::store::{gen_sim_id, MessageCode, NodeType, SimulationNode};
use smallvec::SmallVec;
use std::ops::{Deref, DerefMut};

/// State shared by inports and outports.
#[derive(Debug, Clone)]
pub struct Port {
    pub sim_id: String,
    pub process_port: ProcessPort,
    pub label: String,
    pub node_type: NodeType,
    input_load: SmallVec<[GraphParam; 2]>,
    load: Option<GraphParam>,
    input_response: Vec<Vec<GraphParam>>,
    response: Option<Vec<GraphParam>>,
}

impl Port {
    fn new(process_port: ProcessPort, label: &str, node_type: NodeType, parent_path: &[String]) -> Self {
        Self {
            sim_id: gen_sim_id(parent_path, &process_port.object_id),
            process_port,
            label: label.to_string(),
            node_type,
            input_load: SmallVec::new(),
            load: None,
            input_response: Vec::new(),
            response: None,
        }
    }

    /// External id, as used by connections of the enclosing graph.
    pub fn id(&self) -> &str {
        &self.process_port.object_id
    }

    /// Id of the described port this one instantiates.
    pub fn reference(&self) -> &str {
        &self.process_port.reference
    }

    pub fn config(&self) -> Option<&GraphParam> {
        self.process_port.config.as_ref()
    }

    pub fn init(&self, registry: &mut dyn NodeRegistry, parent_id: &str) {
        registry.register_node(
            SimulationNode::new(&self.sim_id, self.node_type, &self.label)
                .with_parent(Some(parent_id))
                .with_process(&self.process_port.object_id, &self.process_port.reference),
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

    fn aggregate_load(&mut self, sink: &mut dyn SampleSink) {
        sink.push_exec(&self.sim_id, &self.label);
        if !self.input_load.is_empty() {
            self.load = aggregate_params(&self.input_load);
        }
        sink.pop_exec();
    }

    pub fn yield_load(&self) -> Option<&GraphParam> {
        self.load.as_ref()
    }

    /// Replaces the current load; used by elements that compute their
    /// output directly.
    pub fn set_load(&mut self, load: Option<GraphParam>) {
        self.load = load;
    }

    pub fn accept_response(&mut self, response: Vec<GraphParam>) {
        self.input_response.push(response);
    }

    /// Parallel aggregation of every response group seen so far.
    pub fn process_response(&mut self, sink: &mut dyn SampleSink) {
        sink.push_exec(&self.sim_id, &self.label);
        if !self.input_response.is_empty() {
            let response = max_response_groups(&self.input_response);
            sink.store_raw_responses(&self.sim_id, &response);
            self.response = Some(response);
        }
        sink.pop_exec();
    }

    pub fn yield_response(&self) -> Option<&[GraphParam]> {
        self.response.as_deref()
    }

    /// Warnings are raised on behalf of the port so element specific
    /// checks stay in one place.
    pub fn warn(&self, sink: &mut dyn SampleSink, code: MessageCode, desc: Option<&str>) {
        sink.push_exec(&self.sim_id, &self.label);
        sink.warn(&self.sim_id, code, desc);
        sink.pop_exec();
    }
}

#[derive(Debug, Clone)]
pub struct Inport {
    port: Port,
    pub description: InportDescription,
}

impl Inport {
    pub fn new(description: InportDescription, process_port: ProcessPort, parent_path: &[String]) -> Self {
        let port = Port::new(process_port, &description.name, NodeType::ProcessInport, parent_path);
        Self { port, description }
    }

    pub fn generates_response(&self) -> bool {
        self.description.generates_response != ResponsePolicy::Never
    }

    /// Aggregates incoming loads, falling back to the process port's
    /// param and then the description default. Plain aspects are
    /// recorded as numbers carrying that aspect.
    pub fn process(&mut self, sink: &mut dyn SampleSink) {
        self.port.aggregate_load(sink);
        let load = self
            .port
            .load
            .take()
            .or_else(|| self.port.process_port.param.clone())
            .or_else(|| self.description.default_param.clone());

        match &load {
            Some(GraphParam::Aspect { value }) => {
                let aspect = Aspect { slices: value.slices.clone(), ..Aspect::new(&value.name, &[]) };
                let sum = value.slices.values().map(|v| v.abs()).sum();
                sink.store_raw_data(&self.port.sim_id, &GraphParam::aspect_number(sum, None, vec![aspect], None));
            }
            Some(param) => sink.store_raw_data(&self.port.sim_id, param),
            None => {}
        }
        self.port.load = load;
    }
}

impl Deref for Inport {
    type Target = Port;
    fn deref(&self) -> &Port {
        &self.port
    }
}

impl DerefMut for Inport {
    fn deref_mut(&mut self) -> &mut Port {
        &mut self.port
    }
}

#[derive(Debug, Clone)]
pub struct Outport {
    port: Port,
    pub description: OutportDescription,
}

impl Outport {
    pub fn new(description: OutportDescription, process_port: ProcessPort, parent_path: &[String]) -> Self {
        let port = Port::new(process_port, &description.name, NodeType::ProcessOutport, parent_path);
        Self { port, description }
    }

    pub fn process(&mut self, sink: &mut dyn SampleSink) {
        self.port.aggregate_load(sink);
        if let Some(load) = &self.port.load {
            sink.store_raw_data(&self.port.sim_id, load);
        }
    }

    /// Accepts `load` and processes it right away.
    pub fn emit(&mut self, load: GraphParam, sink: &mut dyn SampleSink) {
        self.port.accept_load(load);
        self.process(sink);
    }
}

impl Deref for Outport {
    type Target = Port;
    fn deref(&self) -> &Port {
        &self.port
    }
}

impl DerefMut for Outport {
    fn deref_mut(&mut self) -> &mut Port {
        &mut self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::response_ops::make_latency_response;
    use crate::simulation::env::RunContext;

    fn inport(default: Option<GraphParam>, param: Option<GraphParam>) -> Inport {
        let mut desc = InportDescription::new("in", "In", &[], ResponsePolicy::Always);
        desc.default_param = default;
        let mut pp = ProcessPort::new("pin", "in");
        pp.param = param;
        Inport::new(desc, pp, &["root".to_string()])
    }

    fn ctx_with(port: &Port) -> RunContext {
        let mut ctx = RunContext::new(Some(7));
        port.init(&mut ctx, "parent");
        ctx.enter_step("s", "2019-01", None);
        ctx
    }

    #[test]
    fn test_inport_sums_loads() {
        let mut port = inport(None, None);
        let mut ctx = ctx_with(&port);
        port.accept_load(GraphParam::number(2.0, Some("tps")));
        port.accept_load(GraphParam::number(3.0, None));
        port.process(&mut ctx);
        assert_eq!(port.yield_load().and_then(|l| l.number_value()), Some(5.0));
        assert_eq!(ctx.registry.get(&port.sim_id).unwrap().raw_data.len(), 1);
    }

    #[test]
    fn test_inport_falls_back_to_param_then_default() {
        let mut port = inport(Some(GraphParam::number(1.0, None)), Some(GraphParam::number(9.0, None)));
        let mut ctx = ctx_with(&port);
        port.process(&mut ctx);
        assert_eq!(port.yield_load().and_then(|l| l.number_value()), Some(9.0));

        let mut port = inport(Some(GraphParam::number(1.0, None)), None);
        let mut ctx = ctx_with(&port);
        port.process(&mut ctx);
        assert_eq!(port.yield_load().and_then(|l| l.number_value()), Some(1.0));

        let mut port = inport(None, None);
        let mut ctx = ctx_with(&port);
        port.process(&mut ctx);
        assert!(port.yield_load().is_none());
        assert!(ctx.registry.get(&port.sim_id).unwrap().raw_data.is_empty());
    }

    #[test]
    fn test_aspect_load_is_recorded_as_number() {
        let aspect = Aspect::new("region", &[("eu", 0.25), ("us", 0.75)]);
        let mut port = inport(None, None);
        let mut ctx = ctx_with(&port);
        port.accept_load(GraphParam::Aspect { value: aspect });
        port.process(&mut ctx);

        let raw = &ctx.registry.get(&port.sim_id).unwrap().raw_data[0].data;
        assert!(raw.is_aspect_number());
        assert_eq!(raw.number_value(), Some(1.0));
        // the load itself stays an aspect
        assert!(matches!(port.yield_load(), Some(GraphParam::Aspect { .. })));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut port = inport(None, None);
        let mut ctx = ctx_with(&port);
        port.accept_load(GraphParam::number(2.0, None));
        port.process(&mut ctx);
        port.accept_response(vec![make_latency_response(5.0, &[])]);
        port.process_response(&mut ctx);
        assert!(port.yield_response().is_some());

        port.reset();
        assert!(port.yield_load().is_none());
        assert!(port.yield_response().is_none());
        port.process(&mut ctx);
        assert!(port.yield_load().is_none());
    }

    #[test]
    fn test_outport_keeps_slowest_response() {
        let desc = OutportDescription::new("out", "Out", &[], None);
        let mut port = Outport::new(desc, ProcessPort::new("pout", "out"), &[]);
        let mut ctx = ctx_with(&port);
        port.accept_response(vec![make_latency_response(5.0, &[])]);
        port.accept_response(vec![make_latency_response(12.0, &[])]);
        port.process_response(&mut ctx);

        let response = port.yield_response().unwrap();
        assert_eq!(response.len(), 1);
        let value = &response[0].as_response().unwrap().value;
        assert_eq!(value[0].value, 12.0);
        assert_eq!(ctx.registry.get(&port.sim_id).unwrap().raw_responses.len(), 1);
    }
}
