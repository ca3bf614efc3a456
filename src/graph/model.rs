//! model.rs
//! A graph model instantiated as a process: ports, nested processes,
//! variables and connections, executed in dependency order.

use super::dag::kahn_order;
use super::description::{Connection, GraphModelDescription, Process, ProcessPort, ProcessType};
use super::node::SimulationProcess;
use super::port::{Inport, Outport};
use super::variable::GraphVariable;
use crate::param::GraphParam;
use crate::simulation::env::{NodeRegistry, ProcessFactory, SampleSink};
use crate::simulation::SimulationError;
use crate::store::{gen_sim_id, NodeType, SimulationNode};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
enum ExecNode {
    Inport(String),
    Process(String),
    Variable(String),
    Outport(String),
}

pub struct GraphModel {
    sim_id: String,
    path: Vec<String>,
    parent_id: Option<String>,
    description: GraphModelDescription,
    process: Process,
    label: String,

    // internal port id (the graph model's own port id) -> port
    inports: BTreeMap<String, Inport>,
    outports: BTreeMap<String, Outport>,
    // process port id -> internal port id
    inports_external: HashMap<String, String>,
    outports_external: HashMap<String, String>,

    processes: BTreeMap<String, Box<dyn SimulationProcess>>,
    // process port id -> process id
    process_port_map: HashMap<String, String>,
    variables: BTreeMap<String, GraphVariable>,
    connections: Vec<Connection>,
    order: Vec<ExecNode>,
}

impl GraphModel {
    /// `parent_path` is the simulation path of the enclosing model, empty
    /// for the root.
    pub fn new(description: GraphModelDescription, mut process: Process, parent_path: &[String]) -> Self {
        process.normalize_port_ids();
        let sim_id = gen_sim_id(parent_path, &process.object_id);
        let mut path = parent_path.to_vec();
        path.push(sim_id.clone());
        let label = process
            .label
            .clone()
            .or_else(|| description.label.clone())
            .unwrap_or_else(|| description.object_id.clone());
        Self {
            sim_id,
            path,
            parent_id: parent_path.last().cloned(),
            description,
            process,
            label,
            inports: BTreeMap::new(),
            outports: BTreeMap::new(),
            inports_external: HashMap::new(),
            outports_external: HashMap::new(),
            processes: BTreeMap::new(),
            process_port_map: HashMap::new(),
            variables: BTreeMap::new(),
            connections: Vec::new(),
            order: Vec::new(),
        }
    }

    /// Wraps a model in a synthetic process whose ports map the model's
    /// ports one to one.
    pub fn root_process(description: &GraphModelDescription, version: &str) -> Process {
        let mut process = Process::new("root", ProcessType::GraphModel, &description.object_id);
        process.label = Some(description.label.clone().unwrap_or_else(|| "Root Model".to_string()));
        process.name = Some("root".to_string());
        process.release_nr = version.strip_prefix('r').and_then(|nr| nr.parse().ok());
        for id in description.inports.keys() {
            process.inports.insert(id.clone(), ProcessPort::new(id, id));
        }
        for id in description.outports.keys() {
            process.outports.insert(id.clone(), ProcessPort::new(id, id));
        }
        process
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    fn init_error(&self, what: &str) -> SimulationError {
        warn!(model = %self.label, "failed to create {}", what);
        SimulationError::InitFailed(format!("{}: {}", self.label, what))
    }

    // 1. Ports mirror the process ports; each must exist on the model
    fn create_ports(&mut self, registry: &mut dyn NodeRegistry) -> Result<(), SimulationError> {
        let inports: Vec<ProcessPort> = self.process.inports.values().cloned().collect();
        for process_port in inports {
            let description = match self.description.inports.get(&process_port.reference) {
                Some(description) => description.clone(),
                None => return Err(self.init_error("inports")),
            };
            let inport = Inport::new(description, process_port.clone(), &self.path);
            inport.init(registry, &self.sim_id);
            self.inports_external.insert(process_port.object_id.clone(), process_port.reference.clone());
            self.inports.insert(process_port.reference, inport);
        }
        let outports: Vec<ProcessPort> = self.process.outports.values().cloned().collect();
        for process_port in outports {
            let description = match self.description.outports.get(&process_port.reference) {
                Some(description) => description.clone(),
                None => return Err(self.init_error("outports")),
            };
            let outport = Outport::new(description, process_port.clone(), &self.path);
            outport.init(registry, &self.sim_id);
            self.outports_external.insert(process_port.object_id.clone(), process_port.reference.clone());
            self.outports.insert(process_port.reference, outport);
        }
        Ok(())
    }

    // 2. Nested processes, built by the factory
    fn create_processes(
        &mut self,
        registry: &mut dyn NodeRegistry,
        factory: &dyn ProcessFactory,
    ) -> Result<(), SimulationError> {
        for (id, desc) in &self.description.processes {
            let mut desc = desc.clone();
            if desc.object_id.is_empty() {
                desc.object_id = id.clone();
            }
            desc.normalize_port_ids();
            let mut process = factory.build_process(&desc, &self.path)?;
            process.init(registry, factory)?;
            for port_id in desc.inports.keys().chain(desc.outports.keys()) {
                self.process_port_map.insert(port_id.clone(), id.clone());
            }
            self.processes.insert(id.clone(), process);
        }
        Ok(())
    }

    // 3. Variables
    fn create_variables(&mut self, registry: &mut dyn NodeRegistry) {
        for (id, desc) in &self.description.variables {
            let mut desc = desc.clone();
            desc.object_id = id.clone();
            let variable = GraphVariable::new(desc, &self.path);
            variable.init(registry, &self.sim_id);
            self.variables.insert(id.clone(), variable);
        }
    }

    // 4. Connections; both ends must be known
    fn create_connections(&mut self) -> Result<(), SimulationError> {
        for (id, connection) in &self.description.connections {
            if !self.has_port(&connection.source) || !self.has_port(&connection.destination) {
                return Err(self.init_error(&format!("connection {}", id)));
            }
            let mut connection = connection.clone();
            connection.object_id = id.clone();
            self.connections.push(connection);
        }
        Ok(())
    }

    fn has_port(&self, id: &str) -> bool {
        self.process_port_map.contains_key(id)
            || self.inports.contains_key(id)
            || self.outports.contains_key(id)
            || self.variables.contains_key(id)
    }

    /// Nodes feeding `port_id`: inports and variables directly, process
    /// outports via their owning process.
    fn upstream_of(&self, port_id: &str) -> Vec<String> {
        let mut upstream: Vec<String> = Vec::new();
        for connection in self.connections.iter().filter(|c| c.destination == port_id) {
            let source = if self.variables.contains_key(&connection.source) || self.inports.contains_key(&connection.source) {
                Some(connection.source.clone())
            } else {
                self.process_port_map.get(&connection.source).cloned()
            };
            if let Some(source) = source {
                if !upstream.contains(&source) {
                    upstream.push(source);
                }
            }
        }
        upstream
    }

    // 5. Execution order: inports, processes, variables, outports
    fn calculate_execution_order(&mut self) -> Result<(), SimulationError> {
        let mut nodes: Vec<(String, Vec<String>)> = Vec::new();
        let mut kinds: HashMap<String, ExecNode> = HashMap::new();

        // ports, processes and variables share one id space
        let mut seen: HashSet<&String> = HashSet::new();
        let ids = self.inports.keys().chain(self.processes.keys()).chain(self.variables.keys()).chain(self.outports.keys());
        for id in ids {
            if !seen.insert(id) {
                return Err(self.init_error(&format!("unique node ids ('{}' is used twice)", id)));
            }
        }

        for id in self.inports.keys() {
            nodes.push((id.clone(), Vec::new()));
            kinds.insert(id.clone(), ExecNode::Inport(id.clone()));
        }
        for (id, process) in &self.processes {
            let mut deps: Vec<String> = Vec::new();
            for port_id in process.inport_ids() {
                for dep in self.upstream_of(&port_id) {
                    if !deps.contains(&dep) {
                        deps.push(dep);
                    }
                }
            }
            nodes.push((id.clone(), deps));
            kinds.insert(id.clone(), ExecNode::Process(id.clone()));
        }
        for id in self.variables.keys() {
            nodes.push((id.clone(), self.upstream_of(id)));
            kinds.insert(id.clone(), ExecNode::Variable(id.clone()));
        }
        for id in self.outports.keys() {
            nodes.push((id.clone(), self.upstream_of(id)));
            kinds.insert(id.clone(), ExecNode::Outport(id.clone()));
        }

        let result = kahn_order(nodes);
        if !result.is_complete() {
            warn!(model = %self.label, unresolved = ?result.unresolved, "execution order has cycles");
            return Err(SimulationError::Dependency { model: self.label.clone() });
        }
        self.order = result.order.into_iter().filter_map(|id| kinds.remove(&id)).collect();
        Ok(())
    }

    fn children(&self) -> Vec<String> {
        let mut children: Vec<String> = self.processes.values().map(|p| p.sim_id().to_string()).collect();
        children.extend(self.inports.values().map(|p| p.sim_id.clone()));
        children.extend(self.outports.values().map(|p| p.sim_id.clone()));
        children.extend(self.variables.values().map(|v| v.sim_id.clone()));
        children
    }

    fn push_load(&mut self, source: &str, load: &GraphParam, sink: &mut dyn SampleSink) {
        let destinations: Vec<String> =
            self.connections.iter().filter(|c| c.source == source).map(|c| c.destination.clone()).collect();
        for destination in destinations {
            if let Some(process_id) = self.process_port_map.get(&destination) {
                if let Some(process) = self.processes.get_mut(process_id) {
                    process.accept_load(load.clone(), &destination, sink);
                }
            } else if let Some(variable) = self.variables.get_mut(&destination) {
                variable.accept_load(load.clone());
            } else if let Some(outport) = self.outports.get_mut(&destination) {
                outport.accept_load(load.clone());
            }
        }
    }

    fn push_response(&mut self, destination: &str, response: &[GraphParam]) {
        let sources: Vec<String> =
            self.connections.iter().filter(|c| c.destination == destination).map(|c| c.source.clone()).collect();
        for source in sources {
            if let Some(process_id) = self.process_port_map.get(&source) {
                if let Some(process) = self.processes.get_mut(process_id) {
                    process.accept_response(response.to_vec(), &source);
                }
            } else if let Some(variable) = self.variables.get_mut(&source) {
                variable.accept_response(response.to_vec());
            } else if let Some(inport) = self.inports.get_mut(&source) {
                inport.accept_response(response.to_vec());
            }
        }
    }

    fn inport_key(&self, port_id: &str) -> Option<String> {
        if self.inports.contains_key(port_id) {
            Some(port_id.to_string())
        } else {
            self.inports_external.get(port_id).cloned()
        }
    }

    fn outport_key(&self, port_id: &str) -> Option<String> {
        if self.outports.contains_key(port_id) {
            Some(port_id.to_string())
        } else {
            self.outports_external.get(port_id).cloned()
        }
    }
}

impl SimulationProcess for GraphModel {
    fn sim_id(&self) -> &str {
        &self.sim_id
    }

    fn process_node_id(&self) -> &str {
        &self.process.object_id
    }

    fn node_type(&self) -> NodeType {
        NodeType::GraphModel
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn inport_ids(&self) -> Vec<String> {
        self.process.inports.keys().cloned().collect()
    }

    fn outport_ids(&self) -> Vec<String> {
        self.process.outports.keys().cloned().collect()
    }

    fn init(&mut self, registry: &mut dyn NodeRegistry, factory: &dyn ProcessFactory) -> Result<(), SimulationError> {
        debug!(model = %self.label, "initializing graph model");
        self.create_ports(registry)?;
        self.create_processes(registry, factory)?;
        self.create_variables(registry);
        self.create_connections()?;
        self.calculate_execution_order()?;

        let mut node = SimulationNode::new(&self.sim_id, NodeType::GraphModel, &self.label)
            .with_parent(self.parent_id.as_deref())
            .with_process(&self.process.object_id, &self.description.object_id)
            .with_children(self.children());
        node.release_nr = self.process.release_nr;
        registry.register_node(node);
        Ok(())
    }

    fn reset(&mut self) {
        self.processes.values_mut().for_each(|p| p.reset());
        self.inports.values_mut().for_each(|p| p.reset());
        self.outports.values_mut().for_each(|p| p.reset());
        self.variables.values_mut().for_each(|v| v.reset());
    }

    fn accept_load(&mut self, load: GraphParam, port_id: &str, _sink: &mut dyn SampleSink) {
        if let Some(key) = self.inport_key(port_id) {
            if let Some(inport) = self.inports.get_mut(&key) {
                inport.accept_load(load);
            }
        }
    }

    fn process(&mut self, sink: &mut dyn SampleSink) {
        sink.push_exec(&self.sim_id, &self.label);
        for i in 0..self.order.len() {
            match self.order[i].clone() {
                ExecNode::Inport(id) => {
                    let load = self.inports.get_mut(&id).and_then(|inport| {
                        inport.process(sink);
                        inport.yield_load().cloned()
                    });
                    if let Some(load) = load {
                        self.push_load(&id, &load, sink);
                    }
                }
                ExecNode::Process(id) => {
                    let loads: Vec<(String, GraphParam)> = match self.processes.get_mut(&id) {
                        Some(process) => {
                            process.process(sink);
                            process
                                .outport_ids()
                                .into_iter()
                                .filter_map(|port| process.yield_load(&port).cloned().map(|l| (port, l)))
                                .collect()
                        }
                        None => Vec::new(),
                    };
                    for (port, load) in loads {
                        self.push_load(&port, &load, sink);
                    }
                }
                ExecNode::Variable(id) => {
                    let load = self.variables.get_mut(&id).and_then(|variable| {
                        variable.process(sink);
                        variable.yield_load().cloned()
                    });
                    if let Some(load) = load {
                        self.push_load(&id, &load, sink);
                    }
                }
                ExecNode::Outport(id) => {
                    if let Some(outport) = self.outports.get_mut(&id) {
                        outport.process(sink);
                    }
                }
            }
        }
        sink.pop_exec();
    }

    fn yield_load(&self, port_id: &str) -> Option<&GraphParam> {
        let key = self.outport_key(port_id)?;
        self.outports.get(&key).and_then(|o| o.yield_load())
    }

    fn accept_response(&mut self, response: Vec<GraphParam>, port_id: &str) {
        if let Some(key) = self.outport_key(port_id) {
            if let Some(outport) = self.outports.get_mut(&key) {
                outport.accept_response(response);
            }
        }
    }

    fn process_response(&mut self, sink: &mut dyn SampleSink) {
        sink.push_exec(&self.sim_id, &self.label);
        for i in (0..self.order.len()).rev() {
            match self.order[i].clone() {
                ExecNode::Inport(id) => {
                    if let Some(inport) = self.inports.get_mut(&id) {
                        inport.process_response(sink);
                    }
                }
                ExecNode::Process(id) => {
                    let responses: Vec<(String, Vec<GraphParam>)> = match self.processes.get_mut(&id) {
                        Some(process) => {
                            process.process_response(sink);
                            process
                                .inport_ids()
                                .into_iter()
                                .filter_map(|port| process.yield_response(&port).map(|r| (port, r.to_vec())))
                                .collect()
                        }
                        None => Vec::new(),
                    };
                    for (port, response) in responses {
                        self.push_response(&port, &response);
                    }
                }
                ExecNode::Variable(id) => {
                    let response = self.variables.get_mut(&id).and_then(|variable| {
                        variable.process_response(sink);
                        variable.yield_response().map(<[GraphParam]>::to_vec)
                    });
                    if let Some(response) = response {
                        self.push_response(&id, &response);
                    }
                }
                ExecNode::Outport(id) => {
                    let response = self.outports.get_mut(&id).and_then(|outport| {
                        outport.process_response(sink);
                        outport.yield_response().map(<[GraphParam]>::to_vec)
                    });
                    if let Some(response) = response {
                        self.push_response(&id, &response);
                    }
                }
            }
        }
        sink.pop_exec();
    }

    fn yield_response(&self, port_id: &str) -> Option<&[GraphParam]> {
        let key = self.inport_key(port_id)?;
        self.inports.get(&key).and_then(|i| i.yield_response())
    }

    fn post_process(&mut self) {
        self.processes.values_mut().for_each(|p| p.post_process());
    }

    fn finalize(&mut self) {
        self.processes.values_mut().for_each(|p| p.finalize());
    }
}
