//! Forecast variables: dated time segments, actuals and breakdown links.
use super::error::ProjectionError;
use super::segment::{Breakdown, TimeSegment};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableType {
    Integer,
    Real,
    Breakdown,
}

impl VariableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableType::Integer => "INTEGER",
            VariableType::Real => "REAL",
            VariableType::Breakdown => "BREAKDOWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actual {
    pub date: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "VariableDocument")]
pub struct Variable {
    pub id: String,
    pub name: String,
    pub variable_type: VariableType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    time_segments: Vec<TimeSegment>,
    actuals: Vec<Actual>,
    breakdown_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_breakdown: Option<Breakdown>,
}

/// Wire form; loaded through the same checks as the builder methods.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariableDocument {
    id: String,
    name: String,
    variable_type: VariableType,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    time_segments: Vec<TimeSegment>,
    #[serde(default)]
    actuals: Vec<Actual>,
    #[serde(default)]
    breakdown_ids: Vec<String>,
    #[serde(default)]
    default_breakdown: Option<Breakdown>,
}

impl From<VariableDocument> for Variable {
    fn from(doc: VariableDocument) -> Self {
        let mut v = Variable::new(&doc.id, &doc.name, doc.variable_type, doc.unit.as_deref());
        for ts in doc.time_segments {
            if let Err(e) = v.add_time_segment(ts) {
                warn!(variable = %v.id, "skipping time segment: {}", e);
            }
        }
        for id in doc.breakdown_ids {
            v.add_breakdown_variable(&id);
        }
        for a in doc.actuals {
            v.add_actual(&a.date, a.value);
        }
        v.default_breakdown = doc.default_breakdown;
        v
    }
}

impl Variable {
    pub fn new(id: &str, name: &str, variable_type: VariableType, unit: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            variable_type,
            unit: unit.map(str::to_string),
            time_segments: Vec::new(),
            actuals: Vec::new(),
            breakdown_ids: Vec::new(),
            default_breakdown: None,
        }
    }

    pub fn is_breakdown(&self) -> bool {
        self.variable_type == VariableType::Breakdown
    }

    pub fn time_segments(&self) -> &[TimeSegment] {
        &self.time_segments
    }

    pub fn actuals(&self) -> &[Actual] {
        &self.actuals
    }

    pub fn breakdown_ids(&self) -> &[String] {
        &self.breakdown_ids
    }

    /// Adds or replaces the segment for its date; segments stay date-sorted.
    pub fn add_time_segment(&mut self, segment: TimeSegment) -> Result<(), ProjectionError> {
        if self.is_breakdown() != segment.is_breakdown() {
            return Err(ProjectionError::TypeMismatch {
                method: segment.method_name().to_string(),
                variable_type: self.variable_type.as_str().to_string(),
            });
        }
        self.time_segments.retain(|ts| ts.date() != segment.date());
        self.time_segments.push(segment);
        self.time_segments.sort_by(|a, b| a.date().cmp(b.date()));
        Ok(())
    }

    /// Breakdown variables carry no actuals.
    pub fn add_actual(&mut self, date: &str, value: f64) {
        if self.is_breakdown() {
            return;
        }
        self.actuals.retain(|a| a.date != date);
        self.actuals.push(Actual { date: date.to_string(), value });
    }

    pub fn add_breakdown_variable(&mut self, breakdown_id: &str) {
        if self.is_breakdown() {
            return;
        }
        self.breakdown_ids.retain(|id| id != breakdown_id);
        self.breakdown_ids.push(breakdown_id.to_string());
    }

    pub fn actual(&self, month: &str) -> Option<f64> {
        self.actuals.iter().rev().find(|a| a.date == month).map(|a| a.value)
    }

    /// The segment dated `month`, else the latest one before it.
    pub fn get_time_segment(&self, month: &str) -> Option<&TimeSegment> {
        let mut last = None;
        for ts in &self.time_segments {
            if ts.date() == month {
                return Some(ts);
            }
            if ts.date() > month {
                return last;
            }
            last = Some(ts);
        }
        last
    }
}
