//! The values exchanged between ports: loads flow forward, responses flow
//! backward.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const UNKNOWN_SLICE: &str = "unknown";
pub const NORM_FREQ: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AspectType {
    #[default]
    Breakdown,
    Tag,
}

/// A named breakdown of a value into slices. Relative aspects hold
/// fractions that still have to be scaled by a magnitude.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Aspect {
    #[serde(rename = "type", default)]
    pub kind: AspectType,
    pub name: String,
    #[serde(default)]
    pub slices: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub relative: bool,
}

impl Aspect {
    pub fn new(name: &str, slices: &[(&str, f64)]) -> Self {
        Self {
            kind: AspectType::Breakdown,
            name: name.to_string(),
            slices: slices.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            relative: false,
        }
    }

    pub fn relative(mut self) -> Self {
        self.relative = true;
        self
    }

    pub fn slice_sum(&self) -> f64 {
        self.slices.values().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseEntry {
    pub value: f64,
    pub freq: f64,
}

/// Discrete latency distribution; frequencies normalize to 1000.
pub type ResponseValue = Vec<ResponseEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseAspectType {
    #[default]
    ResponseBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseAspect {
    #[serde(rename = "type", default)]
    pub kind: ResponseAspectType,
    pub name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub relative: bool,
    #[serde(default)]
    pub slices: BTreeMap<String, ResponseValue>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberParam {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aspects: Vec<Aspect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseNumberParam {
    pub value: ResponseValue,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aspects: Vec<ResponseAspect>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "distr", content = "distrDescr", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RandomDistribution {
    Normal { mean: f64, stddev: f64 },
    Lognormal { scale: f64, shape: f64 },
    Uniform { a: f64, b: f64 },
    Bernoulli { p: f64 },
    Poisson { rate: f64 },
    Exponential { rate: f64 },
    Erlang { shape: f64, rate: f64 },
    Weibull { scale: f64, shape: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomNumberParam {
    #[serde(flatten)]
    pub distribution: RandomDistribution,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aspects: Vec<Aspect>,
}

/// Warning/error message emitted by a node. Blank messages record that the
/// condition was checked but not triggered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageParam {
    pub name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub blank: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GraphParam {
    Number(NumberParam),
    AspectNumber(NumberParam),
    NormalDistNumber(NumberParam),
    String { value: String },
    Boolean { value: bool },
    Date { value: String },
    Aspect { value: Aspect },
    ResponseNumber(ResponseNumberParam),
    Random(RandomNumberParam),
    Warning(MessageParam),
    Error(MessageParam),
}

/// Port type names used by element descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParamType {
    Number,
    String,
    Boolean,
    Breakdown,
    Date,
    Default,
}

impl GraphParam {
    pub fn number(value: f64, unit: Option<&str>) -> Self {
        GraphParam::Number(NumberParam { value, unit: unit.map(str::to_string), ..Default::default() })
    }

    pub fn aspect_number(value: f64, unit: Option<&str>, aspects: Vec<Aspect>, std_dev: Option<f64>) -> Self {
        GraphParam::AspectNumber(NumberParam { value, unit: unit.map(str::to_string), aspects, std_dev })
    }

    pub fn dist_number(value: f64, unit: Option<&str>, std_dev: Option<f64>) -> Self {
        GraphParam::NormalDistNumber(NumberParam { value, unit: unit.map(str::to_string), aspects: Vec::new(), std_dev })
    }

    pub fn boolean(value: bool) -> Self {
        GraphParam::Boolean { value }
    }

    pub fn string(value: &str) -> Self {
        GraphParam::String { value: value.to_string() }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            GraphParam::Number(_) => "NUMBER",
            GraphParam::AspectNumber(_) => "ASPECT_NUMBER",
            GraphParam::NormalDistNumber(_) => "NORMAL_DIST_NUMBER",
            GraphParam::String { .. } => "STRING",
            GraphParam::Boolean { .. } => "BOOLEAN",
            GraphParam::Date { .. } => "DATE",
            GraphParam::Aspect { .. } => "ASPECT",
            GraphParam::ResponseNumber(_) => "RESPONSE_NUMBER",
            GraphParam::Random(_) => "RANDOM",
            GraphParam::Warning(_) => "WARNING",
            GraphParam::Error(_) => "ERROR",
        }
    }

    /// Any of the three numeric variants.
    pub fn as_number(&self) -> Option<&NumberParam> {
        match self {
            GraphParam::Number(n) | GraphParam::AspectNumber(n) | GraphParam::NormalDistNumber(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_number_mut(&mut self) -> Option<&mut NumberParam> {
        match self {
            GraphParam::Number(n) | GraphParam::AspectNumber(n) | GraphParam::NormalDistNumber(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        self.as_number().is_some()
    }

    pub fn number_value(&self) -> Option<f64> {
        self.as_number().map(|n| n.value)
    }

    pub fn is_aspect_number(&self) -> bool {
        matches!(self, GraphParam::AspectNumber(n) if !n.aspects.is_empty())
    }

    pub fn is_dist_number(&self) -> bool {
        matches!(self, GraphParam::NormalDistNumber(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            GraphParam::Boolean { value } => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GraphParam::String { value } => Some(value),
            _ => None,
        }
    }

    pub fn as_response(&self) -> Option<&ResponseNumberParam> {
        match self {
            GraphParam::ResponseNumber(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&MessageParam> {
        match self {
            GraphParam::Warning(m) | GraphParam::Error(m) => Some(m),
            _ => None,
        }
    }

    pub fn unit(&self) -> Option<&str> {
        match self {
            GraphParam::Number(n) | GraphParam::AspectNumber(n) | GraphParam::NormalDistNumber(n) => n.unit.as_deref(),
            GraphParam::ResponseNumber(r) => r.unit.as_deref(),
            GraphParam::Random(r) => r.unit.as_deref(),
            _ => None,
        }
    }

    /// Explicit conversion to an aspect number, keeping unit and stdDev.
    pub fn to_aspect_number(&self) -> Option<NumberParam> {
        self.as_number().map(|n| NumberParam {
            value: n.value,
            unit: n.unit.clone(),
            aspects: if self.is_aspect_number() { n.aspects.clone() } else { Vec::new() },
            std_dev: n.std_dev,
        })
    }

    /// Explicit conversion to a normal distribution number; aspects are dropped.
    pub fn to_dist_number(&self) -> Option<NumberParam> {
        self.as_number().map(|n| NumberParam {
            value: n.value,
            unit: n.unit.clone(),
            aspects: Vec::new(),
            std_dev: n.std_dev,
        })
    }

    /// Aspects of an aspect number, empty otherwise.
    pub fn aspects(&self) -> &[Aspect] {
        match self {
            GraphParam::AspectNumber(n) => &n.aspects,
            GraphParam::Random(r) => &r.aspects,
            _ => &[],
        }
    }
}
