//! testing.rs
//! Drives a single catalog element outside of a graph model.
//!
//! Static ports use their description id as external id. Template ports
//! are named `<port>#<n>`, `n` counting template instances from 1.

use super::catalog::build_element;
use super::element::ProcessingElement;
use crate::graph::description::{Process, ProcessPort};
use crate::graph::node::SimulationProcess;
use crate::param::GraphParam;
use crate::simulation::env::{ProcessFactory, RunContext};
use crate::simulation::SimulationError;

struct NoSubProcesses;

impl ProcessFactory for NoSubProcesses {
    fn build_process(&self, process: &Process, _: &[String]) -> Result<Box<dyn SimulationProcess>, SimulationError> {
        Err(SimulationError::InitFailed(process.reference.clone()))
    }
}

pub(crate) struct Harness {
    process: Process,
    loads: Vec<(String, GraphParam)>,
    instances: usize,
    element: Option<ProcessingElement>,
    pub ctx: RunContext,
}

impl Harness {
    pub fn new(description_id: &str) -> Self {
        let description = super::catalog::description(description_id).expect("unknown element");
        let mut process = Process::element("pe", description_id);
        for id in description.inports.keys() {
            process = process.with_inport(ProcessPort::new(id, id));
        }
        for id in description.outports.keys() {
            process = process.with_outport(ProcessPort::new(id, id));
        }
        let mut ctx = RunContext::new(Some(7));
        ctx.enter_step("scenario", "2024-01", None);
        Self { process, loads: Vec::new(), instances: 0, element: None, ctx }
    }

    pub fn input(mut self, port: &str, load: GraphParam) -> Self {
        self.loads.push((port.to_string(), load));
        self
    }

    /// Sets the process port param of a static inport.
    pub fn param(mut self, port: &str, param: GraphParam) -> Self {
        if let Some(p) = self.process.inports.get_mut(port) {
            p.param = Some(param);
        }
        self
    }

    pub fn configured_output(mut self, port: &str, config: GraphParam) -> Self {
        if let Some(p) = self.process.outports.get_mut(port) {
            p.config = Some(config);
        }
        self
    }

    pub fn without_output(mut self, port: &str) -> Self {
        self.process.outports.remove(port);
        self
    }

    fn next_instance(&mut self, port: &str) -> (String, String) {
        self.instances += 1;
        (format!("{}#{}", port, self.instances), format!("group-{}", self.instances))
    }

    pub fn template_input(mut self, template: &str, port: &str, load: GraphParam) -> Self {
        let (id, group) = self.next_instance(port);
        self.process = self.process.with_inport(ProcessPort::templated(&id, port, template, &group));
        self.loads.push((id, load));
        self
    }

    pub fn template_output(mut self, template: &str, port: &str, config: Option<GraphParam>) -> Self {
        let (id, group) = self.next_instance(port);
        let mut process_port = ProcessPort::templated(&id, port, template, &group);
        process_port.config = config;
        self.process = self.process.with_outport(process_port);
        self
    }

    pub fn mc_run(mut self, run: u32) -> Self {
        self.ctx.enter_step("scenario", "2024-01", Some(run));
        self
    }

    pub fn element(&mut self) -> &mut ProcessingElement {
        if self.element.is_none() {
            let mut element = build_element(&self.process, &[]).expect("element builds");
            element.init(&mut self.ctx, &NoSubProcesses).expect("element initializes");
            self.element = Some(element);
        }
        self.element.as_mut().expect("element")
    }

    /// Resets the element, delivers all loads and processes once.
    pub fn run(&mut self) {
        let loads = self.loads.clone();
        self.element().reset();
        let Self { element, ctx, .. } = self;
        let element = element.as_mut().expect("element");
        for (port, load) in loads {
            element.accept_load(load, &port, ctx);
        }
        element.process(ctx);
    }

    pub fn load(&self, port: &str) -> Option<GraphParam> {
        self.element.as_ref()?.yield_load(port).cloned()
    }

    /// Hands responses to outports and processes them.
    pub fn respond(&mut self, responses: Vec<(&str, Vec<GraphParam>)>) {
        self.element();
        let Self { element, ctx, .. } = self;
        let element = element.as_mut().expect("element");
        for (port, response) in responses {
            element.accept_response(response, port);
        }
        element.process_response(ctx);
    }

    pub fn response(&self, port: &str) -> Option<Vec<GraphParam>> {
        self.element.as_ref()?.yield_response(port).map(<[GraphParam]>::to_vec)
    }
}

pub(crate) fn run_element(harness: &mut Harness, outport: &str) -> Option<GraphParam> {
    harness.run();
    harness.load(outport)
}
