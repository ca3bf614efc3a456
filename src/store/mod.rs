//! store/mod.rs
//! Runtime registry of simulation nodes and the samples they record.

pub mod registry;
pub mod types;

pub use registry::{Registry, StepContext};
pub use types::{
    gen_sim_id, Aggregate, AggregatedReport, AggregationMethod, ExecFrame, HistogramBucket, MessageCode, MessageKind,
    MessageRate, NodeType, RawNodeDataEntry, ResultStage, RuntimeMessage, SimulationNode, StepAggregate, StepReport,
};
