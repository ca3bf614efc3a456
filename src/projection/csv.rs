//! CSV rendering of a projection: one row per variable (and per breakdown
//! slice), one column per month.

use super::error::ProjectionError;
use super::frame::Frame;
use super::month::get_months;
use super::render::render_projections;
use super::variable::{Variable, VariableType};
use std::fmt::Write;

pub const DEFAULT_PRECISION: u32 = 2;

/// Integers print plainly, fractional values with `precision` digits.
pub fn log_number(n: f64, precision: Option<u32>) -> String {
    let precision = precision.unwrap_or(DEFAULT_PRECISION) as usize;
    if n % 1.0 != 0.0 && !n.is_nan() {
        format!("{:.*}", precision, n)
    } else {
        format!("{}", n)
    }
}

pub fn render_projections_csv(
    variables: &[Variable],
    start: &str,
    end: &str,
    precision: Option<u32>,
) -> Result<String, ProjectionError> {
    let projections = render_projections(variables, start, end)?;

    let mut csv = String::from("Variable,Type,Breakdown,\"Actual/Projection\"");
    for month in get_months(start, end) {
        let _ = write!(csv, ",{}", month);
    }

    for v in variables {
        let Some(frames) = projections.get(&v.id) else { continue };
        let kind = v.variable_type.as_str().to_lowercase();
        let sub_frame_names = sub_frame_names(frames);

        if v.variable_type == VariableType::Breakdown {
            for sf in &sub_frame_names {
                let _ = write!(csv, "\n\"{}\",{},{},", v.name, kind, sf);
                for f in frames {
                    match f.subframe_value(sf) {
                        Some(value) => {
                            let _ = write!(csv, ", {}%", log_number(value * 100.0, precision));
                        }
                        None => csv.push(','),
                    }
                }
            }
            continue;
        }

        let precision = if v.variable_type == VariableType::Integer { Some(0) } else { precision };
        let has_actuals = frames.iter().any(|f| f.actual_value.is_some());

        // 1. Projection row
        let _ = write!(csv, "\n\"{}\",{},,projection", v.name, kind);
        for f in frames {
            if f.has_error() {
                csv.push_str(",Err");
            } else {
                push_value(&mut csv, f.projected_value, precision);
            }
        }

        // 2. Actual row
        if has_actuals {
            let _ = write!(csv, "\n\"{}\",{},,actual", v.name, kind);
            for f in frames {
                push_value(&mut csv, f.actual_value, precision);
            }
        }

        // 3. Slice rows; months with an actual go to the slice's actual row
        for sf in &sub_frame_names {
            let _ = write!(csv, "\n\"{}\",{},{},projection", v.name, kind, sf);
            let mut slice_has_actuals = false;
            for f in frames {
                if f.actual_value.is_some() {
                    slice_has_actuals = true;
                    csv.push(',');
                } else {
                    let value = f.projected_value.and_then(|_| f.subframe_value(sf));
                    push_value(&mut csv, value, precision);
                }
            }
            if slice_has_actuals {
                let _ = write!(csv, "\n\"{}\",{},{},actual", v.name, kind, sf);
                for f in frames {
                    let value = f.actual_value.and_then(|_| f.subframe_value(sf));
                    push_value(&mut csv, value, precision);
                }
            }
        }
    }
    Ok(csv)
}

fn push_value(csv: &mut String, value: Option<f64>, precision: Option<u32>) {
    match value {
        Some(v) => {
            let _ = write!(csv, ", {}", log_number(v, precision));
        }
        None => csv.push(','),
    }
}

/// Slice names across all frames, in first-seen order.
fn sub_frame_names(frames: &[Frame]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for s in frames.iter().filter_map(|f| f.sub_frames.as_ref()).flatten() {
        if !names.contains(&s.name) {
            names.push(s.name.clone());
        }
    }
    names
}
