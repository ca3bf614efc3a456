//! response_ops.rs
//! Construction and aggregation of backward-flowing (response) params.

use super::cartesian::{add_response_values, combine_response_values, max_response_values};
use super::types::{
    Aspect, AspectType, GraphParam, ResponseAspect, ResponseAspectType, ResponseEntry, ResponseNumberParam,
    ResponseValue, NORM_FREQ,
};
use std::collections::BTreeMap;

pub const LATENCY_CATEGORY: &str = "latency";
pub const HOP_CATEGORY: &str = "hop";

fn build_response_aspect(value: &ResponseValue, aspect: &Aspect) -> ResponseAspect {
    ResponseAspect {
        kind: ResponseAspectType::ResponseBreakdown,
        name: aspect.name.clone(),
        relative: aspect.relative,
        slices: aspect.slices.keys().map(|k| (k.clone(), value.clone())).collect(),
    }
}

fn make_response(value: f64, unit: &str, category: &str, aspects: &[Aspect]) -> GraphParam {
    let split = vec![ResponseEntry { value, freq: NORM_FREQ }];
    GraphParam::ResponseNumber(ResponseNumberParam {
        aspects: aspects.iter().map(|a| build_response_aspect(&split, a)).collect(),
        value: split,
        category: category.to_string(),
        unit: Some(unit.to_string()),
    })
}

/// A latency response in milliseconds; every slice of `aspects` gets the same split.
pub fn make_latency_response(value: f64, aspects: &[Aspect]) -> GraphParam {
    make_response(value, "ms", LATENCY_CATEGORY, aspects)
}

pub fn make_hop_response(value: f64, aspects: &[Aspect]) -> GraphParam {
    make_response(value, "", HOP_CATEGORY, aspects)
}

pub fn is_latency_response(param: &GraphParam) -> bool {
    matches!(param.as_response(), Some(r) if r.category == LATENCY_CATEGORY && r.unit.as_deref() == Some("ms"))
}

pub fn zero_value() -> ResponseValue {
    vec![ResponseEntry { value: 0.0, freq: NORM_FREQ }]
}

pub fn add_entry(value: &mut ResponseValue, entry: ResponseEntry) {
    match value.iter_mut().find(|e| e.value == entry.value) {
        Some(existing) => existing.freq += entry.freq,
        None => value.push(entry),
    }
}

/// Weighted mean of a split normalized to 1000.
pub fn response_value_mean(value: &ResponseValue) -> f64 {
    value.iter().map(|e| (e.freq * e.value).abs()).sum::<f64>() / NORM_FREQ
}

/// Rescales frequencies to `norm`, rounding both frequencies and values.
pub fn scale_frequencies(value: &ResponseValue, norm: f64) -> ResponseValue {
    let norm = norm.round();
    let freq_sum: f64 = value.iter().map(|e| e.freq.abs()).sum();
    if freq_sum == 0.0 {
        return Vec::new();
    }
    let factor = norm / freq_sum;
    value
        .iter()
        .map(|e| ResponseEntry { value: e.value.round(), freq: (e.freq * factor).round() })
        .collect()
}

pub fn normalize_response_value(value: &ResponseValue) -> ResponseValue {
    scale_frequencies(value, NORM_FREQ)
}

/// Adds the non-zero entries of `b` to a copy of `a`.
pub fn merge_response_value(a: &ResponseValue, b: &ResponseValue) -> ResponseValue {
    let mut merged = a.clone();
    for entry in b.iter().filter(|e| e.value != 0.0) {
        add_entry(&mut merged, *entry);
    }
    merged
}

/// Slice-wise merge of two response aspects, normalized afterwards.
pub fn merge_response_aspect(a: &ResponseAspect, b: &ResponseAspect) -> ResponseAspect {
    let mut slices = a.slices.clone();
    for (name, value) in &b.slices {
        let merged = match slices.get(name) {
            Some(existing) if !existing.is_empty() => merge_response_value(existing, value),
            _ => value.clone(),
        };
        slices.insert(name.clone(), merged);
    }
    ResponseAspect {
        kind: a.kind,
        name: a.name.clone(),
        relative: a.relative,
        slices: slices.iter().map(|(k, v)| (k.clone(), normalize_response_value(v))).collect(),
    }
}

/// Collapses each slice to its mean.
pub fn flatten_response_aspect(aspect: &ResponseAspect) -> Aspect {
    Aspect {
        kind: AspectType::Breakdown,
        name: aspect.name.clone(),
        slices: aspect.slices.iter().map(|(k, v)| (k.clone(), response_value_mean(v))).collect(),
        relative: false,
    }
}

/// Expands merged splits into a flat sample list, repeating each value
/// proportionally to its frequency.
pub fn response_histogram_aggregation<'a>(responses: impl IntoIterator<Item = &'a ResponseNumberParam>) -> Vec<f64> {
    let mut merged = Vec::new();
    for r in responses {
        for entry in &r.value {
            add_entry(&mut merged, *entry);
        }
    }
    response_value_histogram(&merged)
}

pub fn response_value_histogram(value: &ResponseValue) -> Vec<f64> {
    let min = value
        .iter()
        .map(|e| e.freq)
        .filter(|f| *f >= 1.0)
        .fold(NORM_FREQ, f64::min);
    let mut out = Vec::new();
    for entry in value {
        let mut freq = entry.freq;
        while freq >= min {
            out.push(entry.value);
            freq -= min;
        }
    }
    out
}

type Reducer = fn(&[ResponseValue]) -> ResponseValue;

struct GroupCategory<'a> {
    response: &'a ResponseNumberParam,
    aspects: BTreeMap<&'a str, &'a ResponseAspect>,
}

fn aggregate_response_groups(
    groups: &[Vec<GraphParam>],
    op: Reducer,
    undefined_slice: &dyn Fn(&str, &str) -> Option<ResponseValue>,
) -> Vec<GraphParam> {
    // category -> (unit, aspect name -> slice names), in first-seen order
    let mut categories: Vec<(String, Option<String>, Vec<(String, Vec<String>)>)> = Vec::new();
    let mut per_group: Vec<BTreeMap<&str, GroupCategory>> = Vec::with_capacity(groups.len());

    for group in groups {
        let mut seen: BTreeMap<&str, GroupCategory> = BTreeMap::new();
        for response in group.iter().filter_map(GraphParam::as_response) {
            let idx = match categories.iter().position(|(c, _, _)| *c == response.category) {
                Some(i) => i,
                None => {
                    categories.push((response.category.clone(), response.unit.clone(), Vec::new()));
                    categories.len() - 1
                }
            };
            let mut entry = GroupCategory { response, aspects: BTreeMap::new() };
            for aspect in &response.aspects {
                let known = &mut categories[idx].2;
                let slot = match known.iter().position(|(n, _)| *n == aspect.name) {
                    Some(i) => i,
                    None => {
                        known.push((aspect.name.clone(), Vec::new()));
                        known.len() - 1
                    }
                };
                for slice in aspect.slices.keys() {
                    if !known[slot].1.contains(slice) {
                        known[slot].1.push(slice.clone());
                    }
                }
                entry.aspects.insert(aspect.name.as_str(), aspect);
            }
            seen.insert(response.category.as_str(), entry);
        }
        per_group.push(seen);
    }

    categories
        .into_iter()
        .map(|(category, unit, aspect_names)| {
            let values: Vec<ResponseValue> = per_group
                .iter()
                .map(|g| g.get(category.as_str()).map(|c| c.response.value.clone()).unwrap_or_else(zero_value))
                .collect();

            let aspects = aspect_names
                .into_iter()
                .map(|(aspect_name, slice_names)| {
                    let slices = slice_names
                        .into_iter()
                        .map(|slice| {
                            let mut slice_values = Vec::new();
                            for g in &per_group {
                                match g.get(category.as_str()) {
                                    Some(c) => match c.aspects.get(aspect_name.as_str()) {
                                        Some(a) => match a.slices.get(&slice) {
                                            Some(v) => slice_values.push(v.clone()),
                                            None => slice_values.extend(undefined_slice(&aspect_name, &slice)),
                                        },
                                        None => slice_values.push(c.response.value.clone()),
                                    },
                                    None => slice_values.push(zero_value()),
                                }
                            }
                            (slice, op(&slice_values))
                        })
                        .collect();
                    ResponseAspect { kind: ResponseAspectType::ResponseBreakdown, name: aspect_name, relative: false, slices }
                })
                .collect();

            GraphParam::ResponseNumber(ResponseNumberParam { value: op(&values), category, unit, aspects })
        })
        .collect()
}

fn zero_slice(_: &str, _: &str) -> Option<ResponseValue> {
    Some(zero_value())
}

/// Parallel branches: per category the slowest response wins.
pub fn max_response_groups(groups: &[Vec<GraphParam>]) -> Vec<GraphParam> {
    aggregate_response_groups(groups, max_response_values, &zero_slice)
}

/// Serial composition: per category responses add up.
pub fn add_response_groups(groups: &[Vec<GraphParam>]) -> Vec<GraphParam> {
    aggregate_response_groups(groups, add_response_values, &zero_slice)
}

/// Alternative branches: per category the splits are joined.
pub fn combine_response_groups(groups: &[Vec<GraphParam>]) -> Vec<GraphParam> {
    aggregate_response_groups(groups, combine_response_values, &zero_slice)
}

/// Joins response groups, scaling each group's values by its relative weight.
/// With all weights zero this is a plain combine.
pub fn combine_response_groups_weighted(
    groups: &[Vec<GraphParam>],
    weights: &[f64],
    undefined_slice: &dyn Fn(&str, &str) -> Option<ResponseValue>,
) -> Vec<GraphParam> {
    let weight_sum: f64 = weights.iter().sum();
    if weight_sum == 0.0 {
        return combine_response_groups(groups);
    }
    let weighted: Vec<Vec<GraphParam>> = groups
        .iter()
        .enumerate()
        .map(|(i, group)| {
            let w = weights.get(i).copied().unwrap_or(0.0) / weight_sum * groups.len() as f64;
            group.iter().map(|r| scale_response(r, w)).collect()
        })
        .collect();
    aggregate_response_groups(&weighted, combine_response_values, undefined_slice)
}

fn scale_response(param: &GraphParam, scale: f64) -> GraphParam {
    match param {
        GraphParam::ResponseNumber(r) => GraphParam::ResponseNumber(ResponseNumberParam {
            value: r.value.iter().map(|e| ResponseEntry { value: e.value * scale, freq: e.freq }).collect(),
            ..r.clone()
        }),
        other => other.clone(),
    }
}
