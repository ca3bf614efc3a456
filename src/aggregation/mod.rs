//! aggregation/mod.rs
//! Turns the raw samples recorded during a run into per-step reports.
//!
//! Nodes are independent of each other here, so the per-node statistics
//! run on the rayon pool. Breakdown and slice nodes are derived afterwards
//! from the finished reports.

pub mod aspects;
pub mod histogram;
pub mod report;
pub mod stats;

pub use aspects::{materialize_breakdowns, split_response_categories};
pub use histogram::generate_histogram;
pub use report::{aggregate_node, aggregate_step};
pub use stats::SampleStats;

use crate::simulation::SimulationError;
use crate::store::{Registry, SimulationNode};
use rayon::prelude::*;
use tracing::debug;

/// Aggregates every node for the given scenarios and months. The returned
/// list holds the input nodes followed by derived category, breakdown and
/// slice nodes; raw samples are dropped.
pub fn aggregate(
    mut nodes: Vec<SimulationNode>,
    scenarios: &[String],
    months: &[String],
    buckets: usize,
) -> Result<Vec<SimulationNode>, SimulationError> {
    // 1. Response categories get their own node
    let categories = split_response_categories(&mut nodes);
    nodes.extend(categories);

    // 2. Statistics per node
    nodes
        .par_iter_mut()
        .map(|node| aggregate_node(node, scenarios, months, buckets))
        .collect::<Result<(), _>>()?;

    // 3. Breakdowns and slices
    let mut extra = Registry::new();
    for node in nodes.iter_mut() {
        materialize_breakdowns(node, &mut extra, buckets);
    }
    debug!(nodes = nodes.len(), derived = extra.count(), "aggregated run");
    nodes.extend(extra.into_nodes());

    for node in nodes.iter_mut() {
        node.raw_data.clear();
        node.raw_responses.clear();
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::response_ops::{make_hop_response, make_latency_response};
    use crate::param::{Aspect, GraphParam};
    use crate::store::{gen_sim_id, AggregationMethod, NodeType, RawNodeDataEntry};

    fn sample(month: &str, mc_run: Option<u32>, data: GraphParam) -> RawNodeDataEntry {
        RawNodeDataEntry { scenario_id: "s".into(), step_date: month.into(), mc_run, data }
    }

    #[test]
    fn test_aggregate_run() {
        let mut outport = SimulationNode::new("out", NodeType::ProcessOutport, "Out");
        let load = |v: f64| GraphParam::aspect_number(v, None, vec![Aspect::new("region", &[("eu", v / 2.0), ("us", v / 2.0)])], None);
        outport.raw_data.push(sample("2024-01", None, load(10.0)));
        outport.raw_data.push(sample("2024-01", Some(0), load(12.0)));

        let mut inport = SimulationNode::new("in", NodeType::ProcessInport, "In");
        inport.raw_responses.push(sample("2024-01", None, make_latency_response(3.0, &[])));
        inport.raw_responses.push(sample("2024-01", None, make_hop_response(1.0, &[])));

        let months = vec!["2024-01".to_string()];
        let nodes = aggregate(vec![outport, inport], &["s".to_string()], &months, 10).unwrap();

        // outport, inport, two categories, one breakdown, two slices
        assert_eq!(nodes.len(), 7);
        assert!(nodes.iter().all(|n| n.raw_data.is_empty() && n.raw_responses.is_empty()));

        let avg = nodes[0].aggregated_report["s"]["2024-01"].data.as_ref().unwrap()[&AggregationMethod::Avg].clone();
        assert_eq!(avg.as_number().unwrap().value, 11.0);

        let latency = nodes.iter().find(|n| n.object_id == gen_sim_id(&["latency"], "in")).unwrap();
        assert!(latency.aggregation_methods.contains(&AggregationMethod::Histogram));
        assert!(nodes.iter().any(|n| n.node_type == NodeType::Breakdown && n.name.as_deref() == Some("region")));
        assert_eq!(nodes.iter().filter(|n| n.node_type == NodeType::Slice).count(), 2);
    }

    #[test]
    fn test_aggregation_error_names_node() {
        let mut node = SimulationNode::new("n", NodeType::ProcessOutport, "Broken");
        node.raw_data.push(sample("2024-01", None, GraphParam::number(f64::NAN, None)));
        let err = aggregate(vec![node], &["s".to_string()], &["2024-01".to_string()], 10).unwrap_err();
        assert!(matches!(err, SimulationError::Aggregation(ref m) if m.starts_with("Broken")));
    }
}
