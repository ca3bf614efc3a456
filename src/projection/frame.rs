//! A variable's rendered result for one month.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistributionType {
    #[default]
    Gaussian,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub distribution_type: DistributionType,
    pub std_dev: f64,
}

impl Distribution {
    pub fn gaussian(std_dev: f64) -> Self {
        Self { distribution_type: DistributionType::Gaussian, std_dev }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubFrame {
    pub name: String,
    pub value: f64,
}

/// Slices of a breakdown variable referenced by this frame's variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociatedBreakdown {
    pub id: String,
    pub name: String,
    pub slices: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_frames: Option<Vec<SubFrame>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_dependency_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projected_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection_calculation_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Distribution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_calculation_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_breakdowns: Option<Vec<AssociatedBreakdown>>,
}

impl Frame {
    pub fn new(date: &str, unit: Option<&str>) -> Self {
        Self {
            date: date.to_string(),
            unit: unit.map(str::to_string),
            ..Default::default()
        }
    }

    pub fn add_subframe(&mut self, name: &str, value: f64) {
        self.sub_frames
            .get_or_insert_with(Vec::new)
            .push(SubFrame { name: name.to_string(), value });
    }

    pub fn has_error(&self) -> bool {
        self.frame_dependency_error.is_some()
            || self.projection_calculation_error.is_some()
            || self.distribution_calculation_error.is_some()
    }

    /// First error in dependency, projection, distribution order.
    pub fn error(&self) -> Option<&str> {
        self.frame_dependency_error
            .as_deref()
            .or(self.projection_calculation_error.as_deref())
            .or(self.distribution_calculation_error.as_deref())
    }

    pub fn std_dev(&self) -> Option<f64> {
        self.distribution.as_ref().map(|d| d.std_dev)
    }

    pub fn subframe_value(&self, name: &str) -> Option<f64> {
        self.sub_frames
            .as_ref()?
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.value)
    }
}
