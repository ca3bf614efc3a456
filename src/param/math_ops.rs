//! math_ops.rs
//! Arithmetic on numeric params.

use super::error::ParamError;
use super::load_ops::add_aspects;
use super::types::{GraphParam, NumberParam};

/// Standard deviation of the sum of two independent normals.
/// A missing or zero side yields the other one. Both operands contribute
/// to the root sum of squares; summing `b` with itself is not reproduced.
pub fn add_std_dev(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a.filter(|v| *v != 0.0), b.filter(|v| *v != 0.0)) {
        (None, _) => b,
        (Some(_), None) => a,
        (Some(a), Some(b)) => Some((a * a + b * b).sqrt()),
    }
}

fn same_unit(p1: &NumberParam, p2: &NumberParam) -> Option<String> {
    if p1.unit == p2.unit {
        p1.unit.clone()
    } else {
        None
    }
}

/// Sum of two params; a missing side yields the other.
///
/// Aspect numbers dominate distribution numbers which dominate plain ones.
pub fn add(p1: Option<&GraphParam>, p2: Option<&GraphParam>) -> Result<GraphParam, ParamError> {
    let (p1, p2) = match (p1, p2) {
        (None, None) => return Err(ParamError::EmptyInput),
        (Some(p), None) | (None, Some(p)) => return Ok(p.clone()),
        (Some(p1), Some(p2)) => (p1, p2),
    };
    let (Some(n1), Some(n2)) = (p1.as_number(), p2.as_number()) else {
        return Err(ParamError::NotANumber { op: "add" });
    };
    let value = n1.value + n2.value;
    let unit = same_unit(n1, n2);

    if p1.is_aspect_number() || p2.is_aspect_number() {
        let a1 = p1.to_aspect_number().unwrap_or_default();
        let a2 = p2.to_aspect_number().unwrap_or_default();
        return Ok(GraphParam::AspectNumber(NumberParam {
            value,
            unit,
            aspects: add_aspects(a1.value, &a1.aspects, a2.value, &a2.aspects),
            std_dev: add_std_dev(a1.std_dev, a2.std_dev),
        }));
    }
    if p1.is_dist_number() || p2.is_dist_number() {
        return Ok(GraphParam::NormalDistNumber(NumberParam {
            value,
            unit,
            aspects: Vec::new(),
            std_dev: add_std_dev(n1.std_dev, n2.std_dev),
        }));
    }
    Ok(GraphParam::Number(NumberParam { value, unit, ..Default::default() }))
}

/// Product of two params. Only the first factor's aspects survive.
pub fn multiply(p1: &GraphParam, p2: &GraphParam) -> Result<GraphParam, ParamError> {
    let (Some(n1), Some(n2)) = (p1.as_number(), p2.as_number()) else {
        return Err(ParamError::NotANumber { op: "multiply" });
    };
    let unit = if n1.unit == n2.unit || n2.unit.is_none() {
        n1.unit.clone()
    } else if n1.unit.is_none() {
        n2.unit.clone()
    } else {
        None
    };
    let value = n1.value * n2.value;
    if p1.is_aspect_number() {
        return Ok(GraphParam::AspectNumber(NumberParam { value, unit, aspects: n1.aspects.clone(), std_dev: None }));
    }
    Ok(GraphParam::Number(NumberParam { value, unit, ..Default::default() }))
}

fn pick<'a>(params: &'a [GraphParam], keep_first: impl Fn(f64, f64) -> bool) -> Result<&'a GraphParam, ParamError> {
    let mut iter = params.iter();
    let first = iter.next().ok_or(ParamError::EmptyInput)?;
    iter.try_fold(first, |best, cur| {
        let b = best.number_value().ok_or(ParamError::NotANumber { op: "compare" })?;
        let c = cur.number_value().ok_or(ParamError::NotANumber { op: "compare" })?;
        Ok(if keep_first(b, c) { best } else { cur })
    })
}

/// Param with the lowest value; ties go to the later one.
pub fn min(params: &[GraphParam]) -> Result<GraphParam, ParamError> {
    pick(params, |best, cur| best < cur).cloned()
}

/// Param with the highest value; ties go to the later one.
pub fn max(params: &[GraphParam]) -> Result<GraphParam, ParamError> {
    pick(params, |best, cur| best > cur).cloned()
}
