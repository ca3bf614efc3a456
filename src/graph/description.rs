//! description.rs
//! Documents describing graph models, processes and their ports, as
//! supplied by the model editor.

use crate::param::{GraphParam, ParamType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponsePolicy {
    Always,
    Never,
    #[default]
    Passthrough,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InportDescription {
    pub name: String,
    #[serde(default)]
    pub object_id: String,
    #[serde(default)]
    pub required_types: Vec<ParamType>,
    #[serde(default)]
    pub desired_units: Vec<String>,
    #[serde(default)]
    pub generates_response: ResponsePolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_param: Option<GraphParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_type: Option<ParamType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

impl InportDescription {
    pub fn new(id: &str, name: &str, required: &[ParamType], generates_response: ResponsePolicy) -> Self {
        Self {
            name: name.to_string(),
            object_id: id.to_string(),
            required_types: required.to_vec(),
            generates_response,
            ..Default::default()
        }
    }

    pub fn with_default(mut self, param: GraphParam) -> Self {
        self.default_param = Some(param);
        self
    }

    pub fn with_units(mut self, units: &[&str]) -> Self {
        self.desired_units = units.iter().map(|u| u.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutportDescription {
    pub name: String,
    #[serde(default)]
    pub object_id: String,
    #[serde(default)]
    pub types: Vec<ParamType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_type: Option<ParamType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

impl OutportDescription {
    pub fn new(id: &str, name: &str, types: &[ParamType], unit: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            object_id: id.to_string(),
            types: types.to_vec(),
            unit: unit.map(str::to_string),
            ..Default::default()
        }
    }

    pub fn with_config(mut self, config_type: ParamType) -> Self {
        self.config_type = Some(config_type);
        self
    }
}

/// A port instance on a process. `reference` names the port of the
/// element description (or of the nested graph model) it instantiates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPort {
    #[serde(default)]
    pub object_id: String,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<GraphParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<GraphParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

impl ProcessPort {
    pub fn new(id: &str, reference: &str) -> Self {
        Self { object_id: id.to_string(), reference: reference.to_string(), ..Default::default() }
    }

    pub fn templated(id: &str, reference: &str, template_id: &str, group_id: &str) -> Self {
        Self {
            template_id: Some(template_id.to_string()),
            template_group_id: Some(group_id.to_string()),
            ..Self::new(id, reference)
        }
    }

    pub fn with_param(mut self, param: GraphParam) -> Self {
        self.param = Some(param);
        self
    }

    pub fn with_config(mut self, config: GraphParam) -> Self {
        self.config = Some(config);
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.template_id.is_some() || self.template_group_id.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessType {
    ProcessingElement,
    GraphModel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tracking {
    CurrentVersion,
    LatestRelease,
    Fixed,
}

/// Version a process, configuration or sheet reference resolves to:
/// `latest` when tracking the current version, `r<n>` otherwise.
pub fn tracking_version(tracking: Option<Tracking>, release_nr: Option<u32>) -> String {
    match (tracking, release_nr) {
        (Some(Tracking::CurrentVersion), _) | (_, None) => "latest".to_string(),
        (_, Some(nr)) => format!("r{}", nr),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    #[serde(default)]
    pub object_id: String,
    #[serde(rename = "type")]
    pub process_type: ProcessType,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_nr: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking: Option<Tracking>,
    #[serde(default)]
    pub inports: BTreeMap<String, ProcessPort>,
    #[serde(default)]
    pub outports: BTreeMap<String, ProcessPort>,
}

impl Process {
    pub fn new(id: &str, process_type: ProcessType, reference: &str) -> Self {
        Self {
            object_id: id.to_string(),
            process_type,
            reference: reference.to_string(),
            label: None,
            name: None,
            release_nr: None,
            tracking: None,
            inports: BTreeMap::new(),
            outports: BTreeMap::new(),
        }
    }

    pub fn element(id: &str, description_id: &str) -> Self {
        Self::new(id, ProcessType::ProcessingElement, description_id)
    }

    pub fn with_inport(mut self, port: ProcessPort) -> Self {
        self.inports.insert(port.object_id.clone(), port);
        self
    }

    pub fn with_outport(mut self, port: ProcessPort) -> Self {
        self.outports.insert(port.object_id.clone(), port);
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn version(&self) -> String {
        tracking_version(self.tracking, self.release_nr)
    }

    /// Map keys win over embedded ids, which may be missing.
    pub(crate) fn normalize_port_ids(&mut self) {
        for (id, port) in self.inports.iter_mut().chain(self.outports.iter_mut()) {
            port.object_id = id.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(default)]
    pub object_id: String,
    pub source: String,
    pub destination: String,
}

impl Connection {
    pub fn new(id: &str, source: &str, destination: &str) -> Self {
        Self { object_id: id.to_string(), source: source.to_string(), destination: destination.to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableKind {
    NamedVariable,
    BroadcastVariable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphVariableDescription {
    #[serde(default)]
    pub object_id: String,
    #[serde(rename = "objectType")]
    pub kind: VariableKind,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphModelDescription {
    #[serde(default)]
    pub object_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub inports: BTreeMap<String, InportDescription>,
    #[serde(default)]
    pub outports: BTreeMap<String, OutportDescription>,
    #[serde(default)]
    pub processes: BTreeMap<String, Process>,
    #[serde(default)]
    pub connections: BTreeMap<String, Connection>,
    #[serde(default)]
    pub variables: BTreeMap<String, GraphVariableDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl GraphModelDescription {
    pub fn new(id: &str, label: &str) -> Self {
        Self { object_id: id.to_string(), label: Some(label.to_string()), ..Default::default() }
    }

    pub fn with_inport(mut self, id: &str, name: &str) -> Self {
        self.inports.insert(id.to_string(), InportDescription::new(id, name, &[], ResponsePolicy::Passthrough));
        self
    }

    pub fn with_outport(mut self, id: &str, name: &str) -> Self {
        self.outports.insert(id.to_string(), OutportDescription::new(id, name, &[], None));
        self
    }

    pub fn with_process(mut self, process: Process) -> Self {
        self.processes.insert(process.object_id.clone(), process);
        self
    }

    pub fn connect(mut self, source: &str, destination: &str) -> Self {
        let id = format!("c{}", self.connections.len());
        self.connections.insert(id.clone(), Connection::new(&id, source, destination));
        self
    }

    pub fn with_variable(mut self, id: &str, kind: VariableKind, label: &str) -> Self {
        self.variables.insert(
            id.to_string(),
            GraphVariableDescription { object_id: id.to_string(), kind, label: label.to_string() },
        );
        self
    }

    /// Nested graph models as (model id, version, display name).
    pub fn sub_model_refs(&self) -> Vec<(String, String, String)> {
        self.processes
            .values()
            .filter(|p| p.process_type == ProcessType::GraphModel)
            .map(|p| {
                let name = p.name.clone().or_else(|| p.label.clone()).unwrap_or_else(|| p.reference.clone());
                (p.reference.clone(), p.version(), name)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, None, "latest")]
    #[case(Some(Tracking::CurrentVersion), Some(3), "latest")]
    #[case(Some(Tracking::Fixed), Some(3), "r3")]
    #[case(Some(Tracking::LatestRelease), Some(4), "r4")]
    #[case(None, Some(7), "r7")]
    fn test_tracking_version(#[case] tracking: Option<Tracking>, #[case] nr: Option<u32>, #[case] expected: &str) {
        assert_eq!(tracking_version(tracking, nr), expected);
    }

    #[test]
    fn test_graph_model_wire_format() {
        let json = r#"{
            "objectId": "gm1", "label": "Web tier",
            "inports": {"in1": {"name": "Requests", "requiredTypes": ["NUMBER"], "desiredUnits": [], "generatesResponse": "ALWAYS"}},
            "outports": {"out1": {"name": "Out", "types": ["NUMBER"]}},
            "processes": {"p1": {"type": "PROCESSING_ELEMENT", "ref": "bd96eec1-483b-44fe-a07b-11bb9141f02f",
                "inports": {"pi1": {"ref": "f37c3cf8-881d-46ba-8715-de76904365c5"}}, "outports": {}}},
            "connections": {"c1": {"source": "in1", "destination": "pi1"}},
            "variables": {"v1": {"objectType": "BROADCAST_VARIABLE", "label": "shared"}}
        }"#;
        let gm: GraphModelDescription = serde_json::from_str(json).unwrap();
        assert_eq!(gm.inports["in1"].generates_response, ResponsePolicy::Always);
        assert_eq!(gm.processes["p1"].process_type, ProcessType::ProcessingElement);
        assert_eq!(gm.processes["p1"].inports["pi1"].reference, "f37c3cf8-881d-46ba-8715-de76904365c5");
        assert_eq!(gm.variables["v1"].kind, VariableKind::BroadcastVariable);
        assert!(gm.sub_model_refs().is_empty());
    }

    #[test]
    fn test_fixed_tracking_resolves_release() {
        let p: Process = serde_json::from_str(
            r#"{"type":"GRAPH_MODEL","ref":"sub","tracking":"FIXED","releaseNr":2,"inports":{},"outports":{}}"#,
        )
        .unwrap();
        assert_eq!(p.version(), "r2");
    }
}
