//! node.rs
//! Lifecycle shared by every active element of a running graph.

use crate::param::GraphParam;
use crate::simulation::env::{NodeRegistry, ProcessFactory, SampleSink};
use crate::simulation::SimulationError;
use crate::store::NodeType;

/// A process inside a graph model: a processing element or a nested
/// graph model.
///
/// Per run the caller drives `reset`, `accept_load`, `process`,
/// `accept_response` and `process_response`, in that order. Port ids are
/// the ids of the process ports as seen from the enclosing graph.
pub trait SimulationProcess {
    fn sim_id(&self) -> &str;
    fn process_node_id(&self) -> &str;
    fn node_type(&self) -> NodeType;
    fn label(&self) -> &str;

    /// Ids of the process inports/outports, static and dynamic.
    fn inport_ids(&self) -> Vec<String>;
    fn outport_ids(&self) -> Vec<String>;

    /// Builds the internal structure and registers the node once.
    fn init(&mut self, registry: &mut dyn NodeRegistry, factory: &dyn ProcessFactory) -> Result<(), SimulationError>;

    /// Clears every piece of per-run state.
    fn reset(&mut self);

    fn accept_load(&mut self, load: GraphParam, port_id: &str, sink: &mut dyn SampleSink);
    fn process(&mut self, sink: &mut dyn SampleSink);
    fn yield_load(&self, port_id: &str) -> Option<&GraphParam>;

    fn accept_response(&mut self, response: Vec<GraphParam>, port_id: &str);
    fn process_response(&mut self, sink: &mut dyn SampleSink);
    fn yield_response(&self, port_id: &str) -> Option<&[GraphParam]>;

    fn post_process(&mut self) {}
    fn finalize(&mut self) {}
}
