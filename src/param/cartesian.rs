//! cartesian.rs
//! Combination of response splits via their cartesian product.

use super::types::{ResponseEntry, ResponseValue, NORM_FREQ};

/// Upper bound of product groups and of entries in a combined split.
pub const CART_MAX_ENTRIES: usize = 1000;

#[derive(Debug, Clone)]
struct ProductGroup {
    combined_freq: f64,
    entries: Vec<ResponseEntry>,
}

/// All combinations of one entry per split, keeping only the
/// `CART_MAX_ENTRIES` most frequent ones.
fn cartesian_product(values: &[ResponseValue]) -> Vec<ProductGroup> {
    let mut groups: Vec<ProductGroup> = Vec::new();
    if values.is_empty() {
        return groups;
    }
    let mut min_freq = 1.0;
    let mut acc: Vec<ResponseEntry> = Vec::with_capacity(values.len());
    expand(values, 0, &mut acc, &mut groups, &mut min_freq);
    groups
}

fn expand(
    values: &[ResponseValue],
    depth: usize,
    acc: &mut Vec<ResponseEntry>,
    groups: &mut Vec<ProductGroup>,
    min_freq: &mut f64,
) {
    for entry in &values[depth] {
        acc.push(*entry);
        if depth == values.len() - 1 {
            let combined_freq: f64 = acc.iter().map(|e| e.freq).product();
            if combined_freq >= *min_freq {
                groups.push(ProductGroup { combined_freq, entries: acc.clone() });
                if groups.len() > CART_MAX_ENTRIES {
                    groups.sort_by(|a, b| b.combined_freq.total_cmp(&a.combined_freq));
                    groups.truncate(CART_MAX_ENTRIES);
                    if let Some(last) = groups.last() {
                        *min_freq = last.combined_freq;
                    }
                }
            }
        } else {
            expand(values, depth + 1, acc, groups, min_freq);
        }
        acc.pop();
    }
}

fn freq_correction(group: &ProductGroup) -> f64 {
    NORM_FREQ.powi(group.entries.len() as i32 - 1)
}

fn add_component(group: &ProductGroup) -> Vec<ResponseEntry> {
    let freq = (group.combined_freq / freq_correction(group)).round();
    vec![ResponseEntry { value: group.entries.iter().map(|e| e.value).sum(), freq }]
}

fn max_component(group: &ProductGroup) -> Vec<ResponseEntry> {
    let freq = (group.combined_freq / freq_correction(group)).round();
    let value = group.entries.iter().fold(0.0, |m: f64, e| if e.value > m { e.value } else { m });
    vec![ResponseEntry { value, freq }]
}

fn aggregate(values: &[ResponseValue], op: impl Fn(&ProductGroup) -> Vec<ResponseEntry>) -> ResponseValue {
    let mut merged: Vec<ResponseEntry> = Vec::new();
    let mut freq_sum = 0.0;
    for group in cartesian_product(values) {
        for entry in op(&group) {
            freq_sum += entry.freq;
            match merged.iter_mut().find(|e| e.value == entry.value) {
                Some(existing) => existing.freq += entry.freq,
                None => merged.push(entry),
            }
        }
    }
    if freq_sum == 0.0 {
        return Vec::new();
    }

    let mut result: ResponseValue = merged
        .into_iter()
        .map(|e| ResponseEntry { value: e.value, freq: (e.freq / freq_sum * NORM_FREQ).round() })
        .filter(|e| e.freq > 0.0)
        .collect();
    // equal frequencies stay ordered by value
    result.sort_by(|a, b| a.value.total_cmp(&b.value));
    result.sort_by(|a, b| b.freq.total_cmp(&a.freq));
    result.truncate(CART_MAX_ENTRIES);
    result
}

/// Serial composition: values add up.
pub fn add_response_values(values: &[ResponseValue]) -> ResponseValue {
    aggregate(values, add_component)
}

/// Parallel composition: the slowest branch wins.
pub fn max_response_values(values: &[ResponseValue]) -> ResponseValue {
    aggregate(values, max_component)
}

/// Joins all splits into one distribution.
pub fn combine_response_values(values: &[ResponseValue]) -> ResponseValue {
    aggregate(values, |g| g.entries.clone())
}
