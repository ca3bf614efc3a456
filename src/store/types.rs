use crate::param::{Aspect, GraphParam, NumberParam, ResponseAspect};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Stable id of a runtime node: the hex digest of its ancestor path and
/// its id local to the enclosing process.
///
/// Deterministic content hash, never random: the same graph yields the
/// same ids on every run.
pub fn gen_sim_id<S: AsRef<str>>(path: &[S], local_id: &str) -> String {
    let mut key = local_id.to_string();
    for segment in path {
        key = format!("{}:{}", segment.as_ref(), key);
    }
    let digest = Sha256::digest(key.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    ProcessingElement,
    GraphModel,
    ProcessInport,
    ProcessOutport,
    NamedVariable,
    BroadcastVariable,
    Breakdown,
    Slice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStage {
    Setup,
    Simulation,
    Aggregation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageCode {
    GraphModelMissing,
    GraphModelTrashed,
    ForecastSheetMissing,
    ForecastSheetTrashed,
    ForecastVariableMissing,
    ModelInitializationFailed,
    ScenarioInputFailed,
    InvalidDateRange,
    InportParamMissing,
    AggregationFailed,
    Exception,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecFrame {
    pub node_id: String,
    pub name: String,
}

/// A warning raised while running, or the details of a failed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeMessage {
    pub code: MessageCode,
    pub stage: ResultStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stack: Vec<ExecFrame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

/// One sample recorded by a node for a scenario, month and run.
/// `mc_run` is absent for the mean pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNodeDataEntry {
    pub scenario_id: String,
    pub step_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mc_run: Option<u32>,
    pub data: GraphParam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregationMethod {
    Avg,
    Min,
    Max,
    Ninetieth,
    Ninetiefifth,
    Ninetieninth,
    Histogram,
    Aspects,
    Messages,
    ResponseAspects,
    Rate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRate {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub name: String,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Aggregate {
    Number(NumberParam),
    Histogram {
        buckets: Vec<HistogramBucket>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
    },
    Aspects {
        values: Vec<Aspect>,
    },
    ResponseAspects {
        values: Vec<ResponseAspect>,
    },
    Messages {
        values: Vec<MessageRate>,
    },
    Rate {
        value: f64,
    },
}

impl Aggregate {
    pub fn as_number(&self) -> Option<&NumberParam> {
        match self {
            Aggregate::Number(n) => Some(n),
            _ => None,
        }
    }
}

pub type StepAggregate = BTreeMap<AggregationMethod, Aggregate>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StepReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<StepAggregate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<StepAggregate>,
}

/// scenario id -> month -> report
pub type AggregatedReport = BTreeMap<String, BTreeMap<String, StepReport>>;

/// Runtime registry entry for one instantiated graph element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationNode {
    pub object_id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_node_instance_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "ref")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_nr: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<RuntimeMessage>,
    #[serde(default)]
    pub aggregation_methods: Vec<AggregationMethod>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aggregated_report: AggregatedReport,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_data: Vec<RawNodeDataEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_responses: Vec<RawNodeDataEntry>,
}

impl SimulationNode {
    pub fn new(object_id: &str, node_type: NodeType, name: &str) -> Self {
        Self {
            object_id: object_id.to_string(),
            node_type,
            parent_instance_id: None,
            sub_node_instance_ids: Vec::new(),
            process_node_id: None,
            reference: None,
            release_nr: None,
            name: Some(name.to_string()),
            warnings: Vec::new(),
            aggregation_methods: Vec::new(),
            aggregated_report: AggregatedReport::new(),
            raw_data: Vec::new(),
            raw_responses: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: Option<&str>) -> Self {
        self.parent_instance_id = parent.map(str::to_string);
        self
    }

    pub fn with_process(mut self, process_node_id: &str, reference: &str) -> Self {
        self.process_node_id = Some(process_node_id.to_string());
        self.reference = Some(reference.to_string());
        self
    }

    pub fn with_children(mut self, children: Vec<String>) -> Self {
        self.sub_node_instance_ids = children;
        self
    }

    pub fn add_child(&mut self, child_id: &str) {
        if !self.sub_node_instance_ids.iter().any(|c| c == child_id) {
            self.sub_node_instance_ids.push(child_id.to_string());
        }
    }

    pub fn add_aggregation_method(&mut self, method: AggregationMethod) {
        if !self.aggregation_methods.contains(&method) {
            self.aggregation_methods.push(method);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_id_is_stable_and_path_sensitive() {
        let a = gen_sim_id(&["p1", "p2"], "port");
        assert_eq!(a, gen_sim_id(&["p1".to_string(), "p2".to_string()], "port"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, gen_sim_id(&["p2", "p1"], "port"));
        assert_ne!(gen_sim_id::<&str>(&[], "root"), gen_sim_id(&["x"], "root"));
    }

    #[test]
    fn test_sim_id_folds_path_in_reverse() {
        // "b:a:pid" hashed
        let expected: String = Sha256::digest(b"b:a:pid").iter().map(|b| format!("{:02x}", b)).collect();
        assert_eq!(gen_sim_id(&["a", "b"], "pid"), expected);
    }

    #[test]
    fn test_report_wire_format() {
        let mut step = StepAggregate::new();
        step.insert(AggregationMethod::Ninetiefifth, Aggregate::Rate { value: 50.0 });
        step.insert(
            AggregationMethod::Histogram,
            Aggregate::Histogram { buckets: vec![HistogramBucket { min: 0.0, max: 1.0, count: 3 }], unit: None },
        );
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["NINETIEFIFTH"]["type"], "RATE");
        assert_eq!(json["HISTOGRAM"]["buckets"][0]["count"], 3);

        let back: StepAggregate = serde_json::from_value(json).unwrap();
        assert_eq!(back, step);
    }

    #[test]
    fn test_node_skips_empty_fields() {
        let node = SimulationNode::new("abc", NodeType::Slice, "eu").with_parent(Some("parent"));
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "SLICE");
        assert_eq!(json["parentInstanceId"], "parent");
        assert!(json.get("rawData").is_none());
        assert!(json.get("subNodeInstanceIds").is_none());
    }
}
