//! load_ops.rs
//! Aggregation of loads arriving at one port and breakdown (aspect) algebra.

use super::math_ops::add;
use super::types::{Aspect, AspectType, GraphParam, NumberParam, UNKNOWN_SLICE};

/// Folds all loads of a port into one.
///
/// Numbers (and booleans counted as 1/0) are summed, taking the first
/// number's unit. Only booleans: logical AND. Otherwise the first load wins.
pub fn aggregate_params(params: &[GraphParam]) -> Option<GraphParam> {
    match params {
        [] => return None,
        [single] => return Some(single.clone()),
        _ => {}
    }

    if params.iter().any(GraphParam::is_number) {
        let mut sum = GraphParam::number(0.0, None);
        let mut unit_selected = false;
        for p in params {
            if let Some(n) = p.as_number() {
                // add() only fails on non-numbers
                if let Ok(s) = add(Some(&sum), Some(p)) {
                    sum = s;
                }
                if !unit_selected {
                    set_unit(&mut sum, n.unit.clone());
                    unit_selected = true;
                }
            } else if let Some(b) = p.as_bool() {
                let as_num = GraphParam::number(if b { 1.0 } else { 0.0 }, None);
                if let Ok(s) = add(Some(&sum), Some(&as_num)) {
                    sum = s;
                }
            }
        }
        return Some(sum);
    }

    let bools: Vec<bool> = params.iter().filter_map(GraphParam::as_bool).collect();
    if !bools.is_empty() {
        return Some(GraphParam::boolean(bools.iter().all(|b| *b)));
    }
    params.first().cloned()
}

fn set_unit(param: &mut GraphParam, unit: Option<String>) {
    if let GraphParam::Number(n) | GraphParam::AspectNumber(n) | GraphParam::NormalDistNumber(n) = param {
        n.unit = unit;
    }
}

fn slice_sum(aspect: &Aspect, ignore_unknown: bool) -> f64 {
    aspect
        .slices
        .iter()
        .filter(|(name, _)| !ignore_unknown || name.as_str() != UNKNOWN_SLICE)
        .map(|(_, v)| *v)
        .sum()
}

/// Rescales all slices so they sum to `scale_to`. The result is absolute.
pub fn scale_breakdown(scale_to: f64, breakdown: &Aspect) -> Aspect {
    let mut sum = breakdown.slice_sum();
    if sum == 0.0 {
        sum = 1.0;
    }
    let scale = scale_to / sum;
    Aspect {
        kind: breakdown.kind,
        name: breakdown.name.clone(),
        slices: breakdown.slices.iter().map(|(k, v)| (k.clone(), v * scale)).collect(),
        relative: false,
    }
}

pub fn scale_breakdowns(scale_to: f64, breakdowns: &[Aspect]) -> Vec<Aspect> {
    breakdowns.iter().map(|a| scale_breakdown(scale_to, a)).collect()
}

/// Fills the gap between `value` and the known slices with an "unknown" slice.
fn pad_aspect(value: f64, aspect: Aspect) -> Aspect {
    let known = slice_sum(&aspect, true);
    if value <= known {
        return aspect;
    }
    let mut slices: std::collections::BTreeMap<String, f64> = aspect
        .slices
        .into_iter()
        .filter(|(name, _)| name != UNKNOWN_SLICE)
        .collect();
    if aspect.kind == AspectType::Tag {
        slices = [(aspect.name.clone(), known)].into_iter().collect();
    }
    slices.insert(UNKNOWN_SLICE.to_string(), value - known);
    Aspect { kind: aspect.kind, name: aspect.name, slices, relative: false }
}

fn add_single_aspect(a: Aspect, b: Aspect) -> Aspect {
    let mut out = Aspect { kind: a.kind, name: a.name, slices: a.slices, relative: a.relative };
    for (name, v) in b.slices {
        *out.slices.entry(name).or_insert(0.0) += v;
    }
    out
}

/// Merges the aspects of two values. Same-named aspects add slice-wise; the
/// others are padded with "unknown" up to the combined magnitude.
pub fn add_aspects(a_val: f64, a_aspects: &[Aspect], b_val: f64, b_aspects: &[Aspect]) -> Vec<Aspect> {
    let sum = a_val.abs() + b_val.abs();
    let mut a_scaled = scale_breakdowns(a_val, a_aspects);
    let mut b_scaled = scale_breakdowns(b_val, b_aspects);

    let common: Vec<String> = a_scaled
        .iter()
        .filter(|a| b_scaled.iter().any(|b| b.name == a.name))
        .map(|a| a.name.clone())
        .collect();

    let mut result = Vec::new();
    for name in common {
        let a = take_last_named(&mut a_scaled, &name);
        let b = take_last_named(&mut b_scaled, &name);
        if let (Some(a), Some(b)) = (a, b) {
            result.push(add_single_aspect(a, b));
        }
    }
    result.extend(a_scaled.into_iter().map(|a| pad_aspect(sum, a)));
    result.extend(b_scaled.into_iter().map(|b| pad_aspect(sum, b)));
    result
}

fn take_last_named(aspects: &mut Vec<Aspect>, name: &str) -> Option<Aspect> {
    let last = aspects.iter().rposition(|a| a.name == name).map(|i| aspects[i].clone());
    aspects.retain(|a| a.name != name);
    last
}

/// The part of `val` that falls into one slice of a breakdown.
///
/// Without the breakdown the result is zero; a missing or zero slice yields
/// `None`. Relative aspects stay relative, absolute ones are rescaled.
pub fn filter_by_breakdown_slice(val: &NumberParam, breakdown: &str, slice: &str) -> Option<NumberParam> {
    let mut res = NumberParam { value: 0.0, unit: val.unit.clone(), aspects: Vec::new(), std_dev: None };
    let Some(filter) = val.aspects.iter().rev().find(|a| a.name == breakdown) else {
        return Some(res);
    };
    let slice_value = filter.slices.get(slice).copied().filter(|v| *v != 0.0)?;
    res.value = if filter.relative { val.value * slice_value } else { slice_value };

    for a in &val.aspects {
        if a.name == breakdown {
            let mut asp = Aspect { kind: a.kind, name: a.name.clone(), slices: Default::default(), relative: a.relative };
            asp.slices.insert(slice.to_string(), if a.relative { 1.0 } else { res.value });
            res.aspects.push(asp);
        } else if a.relative {
            res.aspects.push(a.clone());
        } else {
            res.aspects.push(scale_breakdown(res.value, a));
        }
    }
    Some(res)
}

/// Converts absolute slices into fractions of their sum.
pub fn make_breakdown_relative(breakdown: &Aspect) -> Aspect {
    if breakdown.relative {
        return breakdown.clone();
    }
    let mut sum = breakdown.slice_sum();
    if sum == 0.0 {
        sum = 1.0;
    }
    Aspect {
        kind: breakdown.kind,
        name: breakdown.name.clone(),
        slices: breakdown.slices.iter().map(|(k, v)| (k.clone(), v / sum)).collect(),
        relative: true,
    }
}

/// Turns relative aspects into absolute ones for the given magnitude.
pub fn apply_aspects(value: f64, aspects: &[Aspect]) -> Vec<Aspect> {
    aspects
        .iter()
        .map(|a| if a.relative { scale_breakdown(value.abs(), a) } else { a.clone() })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(eu: f64, us: f64) -> Aspect {
        Aspect::new("region", &[("eu", eu), ("us", us)])
    }

    #[test]
    fn test_aggregate_empty_and_single() {
        assert_eq!(aggregate_params(&[]), None);
        let s = GraphParam::string("x");
        assert_eq!(aggregate_params(&[s.clone()]), Some(s));
    }

    #[test]
    fn test_aggregate_sums_numbers_and_booleans() {
        let params = [
            GraphParam::number(2.0, Some("req")),
            GraphParam::boolean(true),
            GraphParam::number(3.0, Some("req")),
        ];
        let sum = aggregate_params(&params).unwrap();
        assert_eq!(sum.number_value(), Some(6.0));
    }

    #[test]
    fn test_aggregate_takes_first_unit() {
        let params = [GraphParam::number(2.0, Some("req")), GraphParam::number(3.0, Some("req"))];
        assert_eq!(aggregate_params(&params).unwrap().unit(), Some("req"));
    }

    #[test]
    fn test_aggregate_booleans_and_other() {
        let all = [GraphParam::boolean(true), GraphParam::boolean(false)];
        assert_eq!(aggregate_params(&all), Some(GraphParam::boolean(false)));
        let strings = [GraphParam::string("a"), GraphParam::string("b")];
        assert_eq!(aggregate_params(&strings), Some(GraphParam::string("a")));
    }

    #[test]
    fn test_scale_breakdown() {
        let scaled = scale_breakdown(10.0, &region(1.0, 3.0));
        assert_eq!(scaled.slices["eu"], 2.5);
        assert_eq!(scaled.slices["us"], 7.5);
        assert!(!scaled.relative);
        // zero sum scales against 1
        let zero = scale_breakdown(10.0, &region(0.0, 0.0));
        assert_eq!(zero.slice_sum(), 0.0);
    }

    #[test]
    fn test_add_aspects_common_and_padded() {
        let device = Aspect::new("device", &[("mobile", 5.0)]);
        let out = add_aspects(10.0, &[region(5.0, 5.0), device], 20.0, &[region(10.0, 10.0)]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "region");
        assert_eq!(out[0].slices["eu"], 15.0);
        assert_eq!(out[0].slices["us"], 15.0);
        // device only covered 10 of 30
        assert_eq!(out[1].slices["mobile"], 10.0);
        assert_eq!(out[1].slices[UNKNOWN_SLICE], 20.0);
    }

    #[test]
    fn test_filter_by_breakdown_slice() {
        let val = NumberParam {
            value: 100.0,
            unit: Some("req".into()),
            aspects: vec![region(0.25, 0.75).relative(), Aspect::new("device", &[("a", 50.0), ("b", 50.0)])],
            std_dev: None,
        };
        let eu = filter_by_breakdown_slice(&val, "region", "eu").unwrap();
        assert_eq!(eu.value, 25.0);
        assert_eq!(eu.aspects[0].slices["eu"], 1.0);
        assert_eq!(eu.aspects[1].slices["a"], 12.5);

        assert_eq!(filter_by_breakdown_slice(&val, "region", "apac"), None);
        assert_eq!(filter_by_breakdown_slice(&val, "color", "red").unwrap().value, 0.0);
    }

    #[test]
    fn test_make_breakdown_relative() {
        let rel = make_breakdown_relative(&region(30.0, 10.0));
        assert!(rel.relative);
        assert_eq!(rel.slices["eu"], 0.75);
        assert_eq!(make_breakdown_relative(&rel), rel);
    }
}
