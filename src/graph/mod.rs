//! Graph models at runtime: descriptions, ports, variables and the
//! execution of a model as a process.
pub mod dag;
pub mod description;
pub mod model;
pub mod node;
pub mod port;
pub mod variable;

pub use dag::{kahn_order, KahnOrder};
pub use description::{
    tracking_version, Connection, GraphModelDescription, GraphVariableDescription, InportDescription,
    OutportDescription, Process, ProcessPort, ProcessType, ResponsePolicy, Tracking, VariableKind,
};
pub use model::GraphModel;
pub use node::SimulationProcess;
pub use port::{Inport, Outport, Port};
pub use variable::GraphVariable;
