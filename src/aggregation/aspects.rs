//! aspects.rs
//! Derived result nodes: one child per response category, and one
//! breakdown node per aspect with a slice node per slice.

use super::report::{numeric_aggregates, plain_number};
use crate::elements::latency::SOURCE_ASPECT_PREFIX;
use crate::param::load_ops::scale_breakdown;
use crate::param::response_ops::{flatten_response_aspect, response_value_histogram};
use crate::param::NumberParam;
use crate::store::{
    gen_sim_id, Aggregate, AggregationMethod, NodeType, RawNodeDataEntry, Registry, SimulationNode, StepAggregate,
};
use std::collections::BTreeMap;

const NUMBER_METHODS: [AggregationMethod; 6] = [
    AggregationMethod::Avg,
    AggregationMethod::Min,
    AggregationMethod::Max,
    AggregationMethod::Ninetieth,
    AggregationMethod::Ninetiefifth,
    AggregationMethod::Ninetieninth,
];

/// Moves the responses of nodes that saw more than one response category
/// into one child node per category. Returns the new children.
pub fn split_response_categories(nodes: &mut [SimulationNode]) -> Vec<SimulationNode> {
    let mut children = Vec::new();
    for node in nodes.iter_mut() {
        let mut by_category: BTreeMap<String, Vec<RawNodeDataEntry>> = BTreeMap::new();
        for entry in &node.raw_responses {
            let category = entry.data.as_response().map(|r| r.category.clone()).unwrap_or_default();
            by_category.entry(category).or_default().push(entry.clone());
        }
        if by_category.len() < 2 {
            continue;
        }

        let name = node.name.clone().unwrap_or_default();
        for (category, entries) in by_category {
            let mut child = SimulationNode::new(
                &gen_sim_id(&[category.as_str()], &node.object_id),
                node.node_type,
                &format!("{} ({})", name, category),
            )
            .with_parent(Some(&node.object_id));
            child.raw_responses = entries;
            node.add_child(&child.object_id);
            children.push(child);
        }
        node.raw_responses.clear();
    }
    children
}

/// Merges `aggregates` into the step of `node`, creating it on demand.
fn record(node: &mut SimulationNode, scenario: &str, month: &str, response: bool, aggregates: StepAggregate) {
    for method in aggregates.keys() {
        node.add_aggregation_method(*method);
    }
    let step = node
        .aggregated_report
        .entry(scenario.to_string())
        .or_default()
        .entry(month.to_string())
        .or_default();
    let slot = if response { &mut step.response } else { &mut step.data };
    slot.get_or_insert_with(StepAggregate::new).extend(aggregates);
}

fn child<'a>(extra: &'a mut Registry, id: &str, node_type: NodeType, name: &str, parent: &str) -> &'a mut SimulationNode {
    extra.get_or_insert(SimulationNode::new(id, node_type, name).with_parent(Some(parent)))
}

/// Creates breakdown and slice nodes for the aspects found in the
/// aggregated report of `parent`. Only steps with an average carry
/// breakdowns; source tags of response aspects are skipped.
pub fn materialize_breakdowns(parent: &mut SimulationNode, extra: &mut Registry, buckets: usize) {
    let report = parent.aggregated_report.clone();
    for (scenario, months) in &report {
        for (month, step) in months {
            // 1. Load breakdowns
            if let Some(data) = &step.data {
                if let (Some(Aggregate::Number(avg)), Some(Aggregate::Aspects { values })) =
                    (data.get(&AggregationMethod::Avg), data.get(&AggregationMethod::Aspects))
                {
                    for aspect in values {
                        let scaled = scale_breakdown(avg.value, aspect);
                        let breakdown_id = gen_sim_id(&[aspect.name.as_str()], &parent.object_id);
                        parent.add_child(&breakdown_id);

                        let mut slice_ids = Vec::new();
                        for (slice, value) in &scaled.slices {
                            let slice_id = gen_sim_id(&[aspect.name.as_str(), slice.as_str()], &breakdown_id);
                            let node = child(extra, &slice_id, NodeType::Slice, slice, &breakdown_id);
                            let avg_only = StepAggregate::from([(AggregationMethod::Avg, plain_number(*value, avg.unit.as_deref()))]);
                            record(node, scenario, month, false, avg_only);
                            slice_ids.push(slice_id);
                        }

                        let node = child(extra, &breakdown_id, NodeType::Breakdown, &aspect.name, &parent.object_id);
                        let number = NumberParam { value: avg.value, unit: avg.unit.clone(), aspects: vec![scaled], std_dev: None };
                        record(node, scenario, month, false, StepAggregate::from([(AggregationMethod::Avg, Aggregate::Number(number))]));
                        for id in &slice_ids {
                            node.add_child(id);
                        }
                    }
                }
            }

            // 2. Response breakdowns
            let Some(response) = &step.response else { continue };
            let (Some(Aggregate::Number(avg)), Some(Aggregate::ResponseAspects { values })) =
                (response.get(&AggregationMethod::Avg), response.get(&AggregationMethod::ResponseAspects))
            else {
                continue;
            };
            for aspect in values.iter().filter(|a| !a.name.starts_with(SOURCE_ASPECT_PREFIX)) {
                let flat = flatten_response_aspect(aspect);
                let breakdown_id = gen_sim_id(&[aspect.name.as_str()], &parent.object_id);
                parent.add_child(&breakdown_id);

                let mut slice_ids = Vec::new();
                for (slice, value) in &aspect.slices {
                    let slice_id = gen_sim_id(&[aspect.name.as_str(), slice.as_str()], &breakdown_id);
                    let samples = response_value_histogram(value);
                    let node = child(extra, &slice_id, NodeType::Slice, slice, &breakdown_id);
                    record(node, scenario, month, true, numeric_aggregates(&samples, avg.unit.as_deref(), buckets));
                    slice_ids.push(slice_id);
                }

                let mut aggregates = StepAggregate::new();
                for method in NUMBER_METHODS {
                    if let Some(Aggregate::Number(n)) = response.get(&method) {
                        let number = NumberParam { aspects: vec![flat.clone()], ..n.clone() };
                        aggregates.insert(method, Aggregate::Number(number));
                    }
                }
                if let Some(histogram) = response.get(&AggregationMethod::Histogram) {
                    aggregates.insert(AggregationMethod::Histogram, histogram.clone());
                }
                let node = child(extra, &breakdown_id, NodeType::Breakdown, &aspect.name, &parent.object_id);
                record(node, scenario, month, true, aggregates);
                for id in &slice_ids {
                    node.add_child(id);
                }
            }
        }
    }
}
