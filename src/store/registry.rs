use super::types::*;
use crate::param::GraphParam;
use std::collections::HashMap;

/// Where and when a sample is taken.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepContext {
    pub scenario_id: String,
    pub date: String,
    pub mc_run: Option<u32>,
}

impl StepContext {
    pub fn is_mean_run(&self) -> bool {
        self.mc_run.is_none()
    }
}

/// Arena of simulation nodes with an id index.
///
/// Nodes keep registration order; re-registering an id replaces the entry
/// in place.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    nodes: Vec<SimulationNode>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self { Self::default() }
    pub fn count(&self) -> usize { self.nodes.len() }

    pub fn insert(&mut self, node: SimulationNode) {
        match self.index.get(&node.object_id) {
            Some(&i) => self.nodes[i] = node,
            None => {
                self.index.insert(node.object_id.clone(), self.nodes.len());
                self.nodes.push(node);
            }
        }
    }

    /// The node registered under `node`'s id, inserting `node` if there
    /// is none yet.
    pub fn get_or_insert(&mut self, node: SimulationNode) -> &mut SimulationNode {
        let idx = match self.index.get(&node.object_id) {
            Some(&i) => i,
            None => {
                self.index.insert(node.object_id.clone(), self.nodes.len());
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        &mut self.nodes[idx]
    }

    pub fn get(&self, id: &str) -> Option<&SimulationNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut SimulationNode> {
        match self.index.get(id) {
            Some(&i) => Some(&mut self.nodes[i]),
            None => None,
        }
    }

    pub fn nodes(&self) -> &[SimulationNode] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<SimulationNode> {
        self.nodes
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
    }

    /// Samples from unregistered nodes are dropped.
    pub fn store_raw_data(&mut self, node_id: &str, step: &StepContext, data: &GraphParam) {
        if let Some(node) = self.get_mut(node_id) {
            node.raw_data.push(entry(step, data));
        }
    }

    /// One raw entry per response.
    pub fn store_raw_responses(&mut self, node_id: &str, step: &StepContext, responses: &[GraphParam]) {
        if let Some(node) = self.get_mut(node_id) {
            node.raw_responses.extend(responses.iter().map(|r| entry(step, r)));
        }
    }

    /// Records a runtime warning unless the node already carries one with
    /// the same code and description.
    pub fn warn(
        &mut self,
        node_id: &str,
        step: &StepContext,
        stack: &[ExecFrame],
        code: MessageCode,
        desc: Option<&str>,
    ) -> bool {
        let Some(node) = self.get_mut(node_id) else {
            return false;
        };
        let known = node
            .warnings
            .iter()
            .any(|w| w.node_id.as_deref() == Some(node_id) && w.code == code && w.desc.as_deref() == desc);
        if known {
            return false;
        }
        node.warnings.push(RuntimeMessage {
            code,
            stage: ResultStage::Simulation,
            node_id: Some(node_id.to_string()),
            stack: stack.to_vec(),
            date: Some(step.date.clone()),
            scenario_id: Some(step.scenario_id.clone()),
            desc: desc.map(str::to_string),
        });
        true
    }

    /// Every warning of every node, in registration order.
    pub fn warnings(&self) -> Vec<RuntimeMessage> {
        self.nodes.iter().flat_map(|n| n.warnings.iter().cloned()).collect()
    }
}

fn entry(step: &StepContext, data: &GraphParam) -> RawNodeDataEntry {
    RawNodeDataEntry {
        scenario_id: step.scenario_id.clone(),
        step_date: step.date.clone(),
        mc_run: step.mc_run,
        data: data.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(mc_run: Option<u32>) -> StepContext {
        StepContext { scenario_id: "s1".into(), date: "2019-01".into(), mc_run }
    }

    #[test]
    fn test_samples_land_on_registered_nodes_only() {
        let mut reg = Registry::new();
        reg.insert(SimulationNode::new("a", NodeType::ProcessOutport, "Out"));

        reg.store_raw_data("a", &step(None), &GraphParam::number(3.0, None));
        reg.store_raw_data("missing", &step(None), &GraphParam::number(3.0, None));
        reg.store_raw_responses(
            "a",
            &step(Some(1)),
            &[GraphParam::number(1.0, None), GraphParam::number(2.0, None)],
        );

        let node = reg.get("a").unwrap();
        assert_eq!(node.raw_data.len(), 1);
        assert_eq!(node.raw_data[0].mc_run, None);
        assert_eq!(node.raw_responses.len(), 2);
        assert_eq!(node.raw_responses[1].mc_run, Some(1));
        assert_eq!(reg.count(), 1);
    }

    #[test]
    fn test_warnings_are_deduplicated() {
        let mut reg = Registry::new();
        reg.insert(SimulationNode::new("a", NodeType::ProcessingElement, "Split"));

        assert!(reg.warn("a", &step(None), &[], MessageCode::InportParamMissing, Some("aspect name needs to be set")));
        assert!(!reg.warn("a", &step(Some(2)), &[], MessageCode::InportParamMissing, Some("aspect name needs to be set")));
        assert!(reg.warn("a", &step(None), &[], MessageCode::InportParamMissing, None));
        assert!(!reg.warn("nope", &step(None), &[], MessageCode::Exception, None));

        let warnings = reg.warnings();
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].date.as_deref(), Some("2019-01"));
        assert_eq!(warnings[0].stage, ResultStage::Simulation);
    }

    #[test]
    fn test_reinsert_replaces_in_place() {
        let mut reg = Registry::new();
        reg.insert(SimulationNode::new("a", NodeType::GraphModel, "first"));
        reg.insert(SimulationNode::new("b", NodeType::GraphModel, "second"));
        reg.insert(SimulationNode::new("a", NodeType::GraphModel, "again"));
        assert_eq!(reg.count(), 2);
        assert_eq!(reg.nodes()[0].name.as_deref(), Some("again"));
    }

    #[test]
    fn test_get_or_insert_keeps_existing() {
        let mut reg = Registry::new();
        reg.get_or_insert(SimulationNode::new("a", NodeType::Breakdown, "region")).add_child("x");
        let node = reg.get_or_insert(SimulationNode::new("a", NodeType::Breakdown, "other"));
        assert_eq!(node.name.as_deref(), Some("region"));
        assert_eq!(node.sub_node_instance_ids, vec!["x".to_string()]);
        assert_eq!(reg.count(), 1);
    }
}
