//! element.rs
//! Shared machinery of processing elements: static and template ports,
//! routing by external id and default response aggregation.

use super::description::ProcessInterfaceDescription;
use crate::graph::description::{InportDescription, OutportDescription, Process, ProcessPort};
use crate::graph::node::SimulationProcess;
use crate::graph::port::{Inport, Outport};
use crate::param::response_ops::max_response_groups;
use crate::param::GraphParam;
use crate::simulation::env::{NodeRegistry, ProcessFactory, SampleSink};
use crate::simulation::SimulationError;
use crate::store::{gen_sim_id, NodeType, SimulationNode};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Behaviour of one element type. The defaults forward nothing and
/// aggregate responses in parallel.
pub trait ElementKind {
    /// Called once after the ports exist and before they are registered.
    fn configure(&mut self, _core: &mut ElementCore) {}

    fn reset(&mut self) {}

    /// Returns `true` when the load was consumed and must not reach a port.
    fn accept_load(&mut self, _core: &mut ElementCore, _load: &GraphParam, _sink: &mut dyn SampleSink) -> bool {
        false
    }

    fn accepts_responses(&self) -> bool {
        true
    }

    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink);

    fn process_response(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        core.auto_aggregate_responses(sink);
    }
}

/// Ports and identity of a processing element. Ports live in arenas and are
/// addressed by index; maps resolve description refs and external ids.
pub struct ElementCore {
    pub sim_id: String,
    pub label: String,
    parent_id: Option<String>,
    path: Vec<String>,
    process: Process,
    description: ProcessInterfaceDescription,

    inports: Vec<Inport>,
    outports: Vec<Outport>,
    static_inports: HashMap<String, usize>,
    static_outports: HashMap<String, usize>,
    external_inports: HashMap<String, usize>,
    external_outports: HashMap<String, usize>,
}

impl ElementCore {
    fn new(mut process: Process, description: ProcessInterfaceDescription, parent_path: &[String]) -> Self {
        process.normalize_port_ids();
        let sim_id = gen_sim_id(parent_path, &process.object_id);
        let mut path = parent_path.to_vec();
        path.push(sim_id.clone());
        let label = process.label.clone().unwrap_or_else(|| description.name.clone());
        Self {
            sim_id,
            label,
            parent_id: parent_path.last().cloned(),
            path,
            process,
            description,
            inports: Vec::new(),
            outports: Vec::new(),
            static_inports: HashMap::new(),
            static_outports: HashMap::new(),
            external_inports: HashMap::new(),
            external_outports: HashMap::new(),
        }
    }

    pub fn process_node_id(&self) -> &str {
        &self.process.object_id
    }

    pub fn description(&self) -> &ProcessInterfaceDescription {
        &self.description
    }

    fn init_error(&self, what: &str) -> SimulationError {
        warn!(element = %self.label, "failed to create {}", what);
        SimulationError::InitFailed(format!("{}: {}", self.label, what))
    }

    fn add_inport(&mut self, description: InportDescription, process_port: ProcessPort) -> usize {
        let idx = self.inports.len();
        self.external_inports.insert(process_port.object_id.clone(), idx);
        self.inports.push(Inport::new(description, process_port, &self.path));
        idx
    }

    fn add_outport(&mut self, description: OutportDescription, process_port: ProcessPort) -> usize {
        let idx = self.outports.len();
        self.external_outports.insert(process_port.object_id.clone(), idx);
        self.outports.push(Outport::new(description, process_port, &self.path));
        idx
    }

    // 1. Static ports, keyed by the described port they instantiate
    fn create_static_ports(&mut self) -> Result<(), SimulationError> {
        let inports: Vec<ProcessPort> = self.process.inports.values().filter(|p| !p.is_dynamic()).cloned().collect();
        for process_port in inports {
            let Some(def) = self.description.inports.get(&process_port.reference).cloned() else {
                return Err(self.init_error("static inports"));
            };
            let reference = process_port.reference.clone();
            let idx = self.add_inport(def, process_port);
            self.static_inports.insert(reference, idx);
        }
        let outports: Vec<ProcessPort> = self.process.outports.values().filter(|p| !p.is_dynamic()).cloned().collect();
        for process_port in outports {
            let Some(def) = self.description.outports.get(&process_port.reference).cloned() else {
                return Err(self.init_error("static outports"));
            };
            let reference = process_port.reference.clone();
            let idx = self.add_outport(def, process_port);
            self.static_outports.insert(reference, idx);
        }
        Ok(())
    }

    // 2. Template ports, grouped by template group; the group's template
    //    is named by its first port
    fn create_dynamic_ports(&mut self) -> Result<(), SimulationError> {
        let mut groups: BTreeMap<String, (Vec<ProcessPort>, Vec<ProcessPort>)> = BTreeMap::new();
        for port in self.process.inports.values() {
            if let Some(group) = &port.template_group_id {
                groups.entry(group.clone()).or_default().0.push(port.clone());
            }
        }
        for port in self.process.outports.values() {
            if let Some(group) = &port.template_group_id {
                groups.entry(group.clone()).or_default().1.push(port.clone());
            }
        }

        for (inports, outports) in groups.into_values() {
            let template_id = inports.iter().chain(outports.iter()).find_map(|p| p.template_id.clone());
            let Some(template) = template_id.and_then(|id| self.description.port_templates.get(&id).cloned()) else {
                return Err(self.init_error("dynamic ports"));
            };
            for process_port in inports {
                let Some(def) = template.inport_templates.get(&process_port.reference).cloned() else {
                    return Err(self.init_error("dynamic inports"));
                };
                self.add_inport(def, process_port);
            }
            for process_port in outports {
                let Some(def) = template.outport_templates.get(&process_port.reference).cloned() else {
                    return Err(self.init_error("dynamic outports"));
                };
                self.add_outport(def, process_port);
            }
        }
        Ok(())
    }

    pub fn inport(&self, reference: &str) -> Option<&Inport> {
        self.static_inports.get(reference).map(|&i| &self.inports[i])
    }

    pub fn inport_mut(&mut self, reference: &str) -> Option<&mut Inport> {
        self.static_inports.get(reference).map(|&i| &mut self.inports[i])
    }

    pub fn outport(&self, reference: &str) -> Option<&Outport> {
        self.static_outports.get(reference).map(|&i| &self.outports[i])
    }

    pub fn outport_index(&self, reference: &str) -> Option<usize> {
        self.static_outports.get(reference).copied()
    }

    /// Static outports first, then template instances.
    pub fn outport_count(&self) -> usize {
        self.outports.len()
    }

    pub fn outport_at(&self, idx: usize) -> Option<&Outport> {
        self.outports.get(idx)
    }

    pub fn outport_at_mut(&mut self, idx: usize) -> Option<&mut Outport> {
        self.outports.get_mut(idx)
    }

    /// Indices of the dynamic inports instantiating `template_port`.
    pub fn template_inports(&self, template_port: &str) -> Vec<usize> {
        self.inports
            .iter()
            .enumerate()
            .filter(|(_, p)| p.process_port.is_dynamic() && p.reference() == template_port)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn template_outports(&self, template_port: &str) -> Vec<usize> {
        self.outports
            .iter()
            .enumerate()
            .filter(|(_, p)| p.process_port.is_dynamic() && p.reference() == template_port)
            .map(|(i, _)| i)
            .collect()
    }

    /// Processes a static inport and returns its load.
    pub fn take_input(&mut self, reference: &str, sink: &mut dyn SampleSink) -> Option<GraphParam> {
        let inport = self.inport_mut(reference)?;
        inport.process(sink);
        inport.yield_load().cloned()
    }

    /// Processes every instance of a template inport, in creation order.
    pub fn take_template_inputs(&mut self, template_port: &str, sink: &mut dyn SampleSink) -> Vec<Option<GraphParam>> {
        self.template_inports(template_port)
            .into_iter()
            .map(|i| {
                let inport = &mut self.inports[i];
                inport.process(sink);
                inport.yield_load().cloned()
            })
            .collect()
    }

    /// Hands `load` to a static outport and processes it.
    pub fn emit(&mut self, reference: &str, load: GraphParam, sink: &mut dyn SampleSink) {
        if let Some(idx) = self.outport_index(reference) {
            self.emit_at(idx, load, sink);
        }
    }

    pub fn emit_at(&mut self, idx: usize, load: GraphParam, sink: &mut dyn SampleSink) {
        if let Some(outport) = self.outports.get_mut(idx) {
            outport.emit(load, sink);
        }
    }

    pub fn emit_all(&mut self, load: &GraphParam, sink: &mut dyn SampleSink) {
        for outport in &mut self.outports {
            outport.emit(load.clone(), sink);
        }
    }

    pub fn emit_template(&mut self, template_port: &str, load: &GraphParam, sink: &mut dyn SampleSink) {
        for idx in self.template_outports(template_port) {
            self.emit_at(idx, load.clone(), sink);
        }
    }

    /// Processes the response of one outport and returns it.
    pub fn outport_response(&mut self, idx: usize, sink: &mut dyn SampleSink) -> Option<Vec<GraphParam>> {
        let outport = self.outports.get_mut(idx)?;
        outport.process_response(sink);
        outport.yield_response().map(<[GraphParam]>::to_vec)
    }

    /// Delivers a response to a static inport and processes it there.
    pub fn respond(&mut self, reference: &str, response: Vec<GraphParam>, sink: &mut dyn SampleSink) {
        if let Some(inport) = self.inport_mut(reference) {
            inport.accept_response(response);
            inport.process_response(sink);
        }
    }

    /// Parallel aggregation of the given outports' responses, delivered to
    /// the given inports.
    pub fn aggregate_responses(&mut self, outports: &[usize], inports: &[usize], sink: &mut dyn SampleSink) {
        let groups: Vec<Vec<GraphParam>> =
            outports.iter().filter_map(|&idx| self.outport_response(idx, sink)).collect();
        if groups.is_empty() {
            return;
        }
        let aggregated = max_response_groups(&groups);
        for &idx in inports {
            if let Some(inport) = self.inports.get_mut(idx) {
                inport.accept_response(aggregated.clone());
                inport.process_response(sink);
            }
        }
    }

    /// Every outport's response goes to every inport that generates one.
    pub fn auto_aggregate_responses(&mut self, sink: &mut dyn SampleSink) {
        let outports: Vec<usize> = (0..self.outports.len()).collect();
        let inports: Vec<usize> =
            self.inports.iter().enumerate().filter(|(_, p)| p.generates_response()).map(|(i, _)| i).collect();
        self.aggregate_responses(&outports, &inports, sink);
    }

    fn children(&self) -> Vec<String> {
        self.inports
            .iter()
            .map(|p| p.sim_id.clone())
            .chain(self.outports.iter().map(|p| p.sim_id.clone()))
            .collect()
    }

    fn external_inport(&mut self, port_id: &str) -> Option<&mut Inport> {
        let idx = *self.external_inports.get(port_id).or_else(|| self.static_inports.get(port_id))?;
        self.inports.get_mut(idx)
    }

    fn external_outport(&self, port_id: &str) -> Option<&Outport> {
        let idx = self.external_outports.get(port_id).or_else(|| self.static_outports.get(port_id))?;
        self.outports.get(*idx)
    }
}

pub struct ProcessingElement {
    core: ElementCore,
    kind: Box<dyn ElementKind>,
}

impl ProcessingElement {
    pub fn new(
        process: Process,
        description: ProcessInterfaceDescription,
        kind: Box<dyn ElementKind>,
        parent_path: &[String],
    ) -> Self {
        Self { core: ElementCore::new(process, description, parent_path), kind }
    }

    pub fn core(&self) -> &ElementCore {
        &self.core
    }
}

impl SimulationProcess for ProcessingElement {
    fn sim_id(&self) -> &str {
        &self.core.sim_id
    }

    fn process_node_id(&self) -> &str {
        self.core.process_node_id()
    }

    fn node_type(&self) -> NodeType {
        NodeType::ProcessingElement
    }

    fn label(&self) -> &str {
        &self.core.label
    }

    fn inport_ids(&self) -> Vec<String> {
        self.core.process.inports.keys().cloned().collect()
    }

    fn outport_ids(&self) -> Vec<String> {
        self.core.process.outports.keys().cloned().collect()
    }

    fn init(&mut self, registry: &mut dyn NodeRegistry, _factory: &dyn ProcessFactory) -> Result<(), SimulationError> {
        self.core.create_static_ports()?;
        self.core.create_dynamic_ports()?;
        self.kind.configure(&mut self.core);

        let core = &self.core;
        for port in &core.inports {
            port.init(registry, &core.sim_id);
        }
        for port in &core.outports {
            port.init(registry, &core.sim_id);
        }
        registry.register_node(
            SimulationNode::new(&core.sim_id, NodeType::ProcessingElement, &core.label)
                .with_parent(core.parent_id.as_deref())
                .with_process(&core.process.object_id, &core.description.object_id)
                .with_children(core.children()),
        );
        Ok(())
    }

    fn reset(&mut self) {
        self.core.inports.iter_mut().for_each(|p| p.reset());
        self.core.outports.iter_mut().for_each(|p| p.reset());
        self.kind.reset();
    }

    fn accept_load(&mut self, load: GraphParam, port_id: &str, sink: &mut dyn SampleSink) {
        if self.kind.accept_load(&mut self.core, &load, sink) {
            return;
        }
        if let Some(inport) = self.core.external_inport(port_id) {
            inport.accept_load(load);
        }
    }

    fn process(&mut self, sink: &mut dyn SampleSink) {
        sink.push_exec(&self.core.sim_id, &self.core.label);
        self.kind.process(&mut self.core, sink);
        sink.pop_exec();
    }

    fn yield_load(&self, port_id: &str) -> Option<&GraphParam> {
        self.core.external_outport(port_id).and_then(|o| o.yield_load())
    }

    fn accept_response(&mut self, response: Vec<GraphParam>, port_id: &str) {
        if !self.kind.accepts_responses() {
            return;
        }
        let idx = self.core.external_outports.get(port_id).or_else(|| self.core.static_outports.get(port_id)).copied();
        if let Some(outport) = idx.and_then(|i| self.core.outports.get_mut(i)) {
            outport.accept_response(response);
        }
    }

    fn process_response(&mut self, sink: &mut dyn SampleSink) {
        sink.push_exec(&self.core.sim_id, &self.core.label);
        self.kind.process_response(&mut self.core, sink);
        sink.pop_exec();
    }

    fn yield_response(&self, port_id: &str) -> Option<&[GraphParam]> {
        let idx = self.core.external_inports.get(port_id).or_else(|| self.core.static_inports.get(port_id))?;
        self.core.inports.get(*idx).and_then(|i| i.yield_response())
    }
}
