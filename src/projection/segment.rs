//! Time segments: the rule that produces a variable's frame from a given
//! month onward.

use super::frame::{Distribution, DistributionType, Frame};
use super::month::month_diff;
use crate::expression::{Expression, IdentifierValues, ScopedIdentifierValues, DISTRIBUTION_SCOPE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Slice label -> weight.
pub type Breakdown = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrowthType {
    Constant,
    #[default]
    Exponential,
    Linear,
}

/// Where a segment's standard deviation comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistributionSource {
    Static {
        #[serde(rename = "staticStdDev")]
        static_std_dev: f64,
    },
    Expression { expression: Expression },
    /// Root-sum-square of the referenced variables' standard deviations.
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicSegment {
    pub date: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub growth: f64,
    #[serde(default)]
    pub growth_type: GrowthType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<DistributionSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionSegment {
    pub date: String,
    pub expression: Expression,
    #[serde(default)]
    pub growth: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<DistributionSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownSegment {
    pub date: String,
    #[serde(default)]
    pub breakdown: Breakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeSegment {
    Basic(BasicSegment),
    Expression(ExpressionSegment),
    Breakdown(BreakdownSegment),
}

/// Values of the frames already rendered in the current month.
#[derive(Debug, Clone, Default)]
pub struct SiblingValues {
    pub projected: IdentifierValues,
    pub scoped: ScopedIdentifierValues,
}

impl SiblingValues {
    pub fn std_devs(&self) -> Option<&IdentifierValues> {
        self.scoped.get(DISTRIBUTION_SCOPE)
    }
}

impl TimeSegment {
    pub fn basic(date: &str, value: f64, growth: f64, growth_type: GrowthType) -> Self {
        TimeSegment::Basic(BasicSegment {
            date: date.to_string(),
            value,
            growth,
            growth_type,
            distribution: None,
        })
    }

    pub fn expression(date: &str, expression: Expression, growth: f64) -> Self {
        TimeSegment::Expression(ExpressionSegment {
            date: date.to_string(),
            expression,
            growth,
            distribution: None,
        })
    }

    pub fn breakdown(date: &str, breakdown: Breakdown) -> Self {
        TimeSegment::Breakdown(BreakdownSegment { date: date.to_string(), breakdown })
    }

    /// Attaches a distribution source. Breakdown segments carry none.
    pub fn with_distribution(mut self, source: DistributionSource) -> Self {
        match &mut self {
            TimeSegment::Basic(s) => s.distribution = Some(source),
            TimeSegment::Expression(s) => s.distribution = Some(source),
            TimeSegment::Breakdown(_) => {}
        }
        self
    }

    pub fn date(&self) -> &str {
        match self {
            TimeSegment::Basic(s) => &s.date,
            TimeSegment::Expression(s) => &s.date,
            TimeSegment::Breakdown(s) => &s.date,
        }
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            TimeSegment::Basic(_) => "BASIC",
            TimeSegment::Expression(_) => "EXPRESSION",
            TimeSegment::Breakdown(_) => "BREAKDOWN",
        }
    }

    pub fn is_breakdown(&self) -> bool {
        matches!(self, TimeSegment::Breakdown(_))
    }

    /// Variable ids this segment reads when rendering.
    pub fn needed_var_ids(&self) -> Vec<String> {
        match self {
            TimeSegment::Basic(s) => distribution_refs(s.distribution.as_ref()),
            TimeSegment::Expression(s) => {
                let mut ids = s.expression.needed_refs();
                for r in distribution_refs(s.distribution.as_ref()) {
                    if !ids.contains(&r) {
                        ids.push(r);
                    }
                }
                ids
            }
            TimeSegment::Breakdown(_) => Vec::new(),
        }
    }

    pub fn calculate(&self, month: &str, unit: Option<&str>, siblings: &SiblingValues) -> Frame {
        let mut f = Frame::new(month, unit);
        match self {
            TimeSegment::Basic(s) => {
                let mut value = s.value;
                let diff = month_diff(&s.date, month);
                if diff > 0 && s.growth != 0.0 {
                    for _ in 0..diff {
                        match s.growth_type {
                            GrowthType::Exponential => value += value * s.growth,
                            GrowthType::Linear => value += s.value * s.growth,
                            GrowthType::Constant => {}
                        }
                    }
                }
                f.projected_value = Some(value);
                apply_distribution(s.distribution.as_ref(), None, siblings, &mut f);
            }
            TimeSegment::Expression(s) => {
                match s.expression.calculate(&siblings.projected, Some(&siblings.scoped)) {
                    Ok(mut value) => {
                        if s.expression.is_static() && s.growth != 0.0 {
                            for _ in 0..month_diff(&s.date, month) {
                                value += value * s.growth;
                            }
                        }
                        f.projected_value = Some(value);
                    }
                    Err(e) => f.projection_calculation_error = Some(e.to_string()),
                }
                apply_distribution(s.distribution.as_ref(), Some(&s.expression), siblings, &mut f);
            }
            TimeSegment::Breakdown(s) => {
                for (name, weight) in &s.breakdown {
                    f.add_subframe(name, *weight);
                }
            }
        }
        f
    }
}

fn distribution_refs(source: Option<&DistributionSource>) -> Vec<String> {
    match source {
        Some(DistributionSource::Expression { expression }) => expression.needed_refs(),
        _ => Vec::new(),
    }
}

fn apply_distribution(
    source: Option<&DistributionSource>,
    value_expression: Option<&Expression>,
    siblings: &SiblingValues,
    f: &mut Frame,
) {
    match source {
        None => {}
        Some(DistributionSource::Static { static_std_dev }) => {
            f.distribution = Some(Distribution::gaussian(*static_std_dev));
        }
        Some(DistributionSource::Expression { expression }) => {
            match expression.calculate(&siblings.projected, Some(&siblings.scoped)) {
                Ok(std_dev) => f.distribution = Some(Distribution::gaussian(std_dev)),
                Err(e) => f.distribution_calculation_error = Some(e.to_string()),
            }
        }
        Some(DistributionSource::Auto) => {
            f.distribution = value_expression.and_then(|e| auto_distribution(e, siblings));
        }
    }
}

/// Rough approximation: sqrt of the summed variances of every referenced
/// variable that has a non-zero value and a positive standard deviation.
fn auto_distribution(expression: &Expression, siblings: &SiblingValues) -> Option<Distribution> {
    let std_devs = siblings.std_devs();
    let sum: f64 = expression
        .needed_refs()
        .iter()
        .filter(|r| siblings.projected.get(*r).map_or(false, |v| *v != 0.0 && !v.is_nan()))
        .filter_map(|r| std_devs.and_then(|sd| sd.get(r)).copied())
        .filter(|sd| *sd > 0.0)
        .map(|sd| sd * sd)
        .sum();
    (sum > 0.0).then(|| Distribution {
        distribution_type: DistributionType::Gaussian,
        std_dev: sum.sqrt(),
    })
}
