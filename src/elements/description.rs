//! description.rs
//! Fixed port interfaces of the built-in processing elements.

use crate::graph::description::{InportDescription, OutportDescription};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A group of ports a caller may add to a process any number of times.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortTemplate {
    pub name: String,
    pub object_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub inport_templates: BTreeMap<String, InportDescription>,
    #[serde(default)]
    pub outport_templates: BTreeMap<String, OutportDescription>,
}

impl PortTemplate {
    pub fn new(id: &str, name: &str) -> Self {
        Self { name: name.to_string(), object_id: id.to_string(), ..Default::default() }
    }

    pub fn with_inport(mut self, mut port: InportDescription) -> Self {
        port.index = Some(self.inport_templates.len() as u32);
        self.inport_templates.insert(port.object_id.clone(), port);
        self
    }

    pub fn with_outport(mut self, mut port: OutportDescription) -> Self {
        port.index = Some(self.outport_templates.len() as u32);
        self.outport_templates.insert(port.object_id.clone(), port);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInterfaceDescription {
    pub object_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub inports: BTreeMap<String, InportDescription>,
    #[serde(default)]
    pub outports: BTreeMap<String, OutportDescription>,
    #[serde(default)]
    pub port_templates: BTreeMap<String, PortTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization_hint: Option<String>,
}

impl ProcessInterfaceDescription {
    pub fn new(id: &str, name: &str) -> Self {
        Self { object_id: id.to_string(), name: name.to_string(), ..Default::default() }
    }

    pub fn with_description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    /// Ports are indexed in the order they are added.
    pub fn with_inport(mut self, mut port: InportDescription) -> Self {
        port.index = Some(self.inports.len() as u32);
        self.inports.insert(port.object_id.clone(), port);
        self
    }

    pub fn with_outport(mut self, mut port: OutportDescription) -> Self {
        port.index = Some(self.outports.len() as u32);
        self.outports.insert(port.object_id.clone(), port);
        self
    }

    pub fn with_template(mut self, template: PortTemplate) -> Self {
        self.port_templates.insert(template.object_id.clone(), template);
        self
    }

    pub fn with_hint(mut self, hint: &str) -> Self {
        self.visualization_hint = Some(hint.to_string());
        self
    }
}
