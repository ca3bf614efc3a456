//! render.rs
//! Renders every variable for every month of a range, honoring
//! inter-variable dependencies within each month.

use super::error::ProjectionError;
use super::frame::{AssociatedBreakdown, DistributionType, Frame};
use super::month::get_months;
use super::segment::{SiblingValues, TimeSegment};
use super::variable::Variable;
use crate::expression::{IdentifierValues, DISTRIBUTION_SCOPE};
use crate::graph::dag::kahn_order;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Variable id -> one frame per month.
pub type VariableProjections = HashMap<String, Vec<Frame>>;

#[derive(Debug)]
struct RenderState<'a> {
    variable: &'a Variable,
    segment: Option<&'a TimeSegment>,
    frame: Option<Frame>,
    dependency_error: Option<ProjectionError>,
}

/// Render state of one month. Contexts are never shared across months.
#[derive(Debug)]
pub struct FrameRenderContext<'a> {
    month: String,
    states: Vec<RenderState<'a>>,
    index: HashMap<&'a str, usize>,
}

impl<'a> FrameRenderContext<'a> {
    pub fn new(variables: &'a [Variable], month: &str) -> Self {
        let mut states = Vec::with_capacity(variables.len());
        let mut index = HashMap::with_capacity(variables.len());
        for v in variables {
            if index.contains_key(v.id.as_str()) {
                warn!(variable = %v.id, name = %v.name, "duplicate variable id, keeping the first definition");
                continue;
            }
            index.insert(v.id.as_str(), states.len());
            states.push(RenderState {
                variable: v,
                segment: v.get_time_segment(month),
                frame: None,
                dependency_error: None,
            });
        }
        Self { month: month.to_string(), states, index }
    }

    /// Indices of the render states in dependency order. States that cannot
    /// be ordered are flagged and appended at the end.
    fn render_order(&mut self) -> Vec<usize> {
        let nodes = self.states.iter().enumerate().map(|(i, s)| {
            let mut deps: Vec<String> = s.variable.breakdown_ids().to_vec();
            if let Some(ts) = s.segment {
                for id in ts.needed_var_ids() {
                    if !deps.contains(&id) {
                        deps.push(id);
                    }
                }
            }
            (i.to_string(), deps)
        });
        // Dependencies are variable ids; map them to state keys.
        let nodes: Vec<(String, Vec<String>)> = nodes
            .map(|(k, deps)| {
                let deps = deps
                    .into_iter()
                    .map(|id| match self.index.get(id.as_str()) {
                        Some(i) => i.to_string(),
                        None => format!("missing:{}", id),
                    })
                    .collect();
                (k, deps)
            })
            .collect();

        let result = kahn_order(nodes);
        let mut order: Vec<usize> = result.order.iter().filter_map(|k| k.parse().ok()).collect();
        for key in &result.unresolved {
            if let Ok(i) = key.parse::<usize>() {
                self.states[i].dependency_error = Some(ProjectionError::Dependency);
                order.push(i);
            }
        }
        order
    }

    fn sibling_values(&self) -> SiblingValues {
        let mut projected = IdentifierValues::new();
        let mut std_devs = IdentifierValues::new();
        for s in &self.states {
            let Some(f) = &s.frame else { continue };
            if let Some(v) = f.projected_value {
                projected.insert(s.variable.id.clone(), v);
            }
            if let Some(d) = &f.distribution {
                if d.std_dev != 0.0 && !d.std_dev.is_nan() && d.distribution_type == DistributionType::Gaussian {
                    std_devs.insert(s.variable.id.clone(), d.std_dev);
                }
            }
        }
        let mut siblings = SiblingValues { projected, ..Default::default() };
        siblings.scoped.insert(DISTRIBUTION_SCOPE.to_string(), std_devs);
        siblings
    }

    fn render_frame(&self, state: &RenderState<'a>) -> Frame {
        let v = state.variable;
        let mut f = match state.segment {
            Some(ts) => ts.calculate(&self.month, v.unit.as_deref(), &self.sibling_values()),
            None => {
                let mut f = Frame::new(&self.month, v.unit.as_deref());
                if let (true, Some(default)) = (v.is_breakdown(), &v.default_breakdown) {
                    for (name, weight) in default {
                        f.add_subframe(name, *weight);
                    }
                }
                f
            }
        };

        f.actual_value = v.actual(&self.month);

        for bd_id in v.breakdown_ids() {
            let Some(bd_state) = self.index.get(bd_id.as_str()).map(|&i| &self.states[i]) else {
                continue;
            };
            let Some(sub_frames) = bd_state.frame.as_ref().and_then(|bf| bf.sub_frames.clone()) else {
                continue;
            };
            let mut associated = AssociatedBreakdown {
                id: bd_state.variable.id.clone(),
                name: bd_state.variable.name.clone(),
                slices: BTreeMap::new(),
            };
            for slice in sub_frames {
                associated.slices.insert(slice.name.clone(), slice.value);
                let scale = f.actual_value.or(f.projected_value).unwrap_or(0.0);
                let value = if f.actual_value.is_some() || f.projected_value.is_some() {
                    slice.value * scale
                } else {
                    0.0
                };
                f.add_subframe(&format!("{}.{}", bd_state.variable.name, slice.name), value);
            }
            f.associated_breakdowns.get_or_insert_with(Vec::new).push(associated);
        }
        f
    }

    /// Renders all variables of this month, returning (variable id, frame)
    /// pairs in render order.
    pub fn render(mut self) -> Vec<(String, Frame)> {
        let order = self.render_order();
        let mut out = Vec::with_capacity(order.len());
        for i in order {
            let f = match &self.states[i].dependency_error {
                Some(e) => Frame {
                    date: self.month.clone(),
                    frame_dependency_error: Some(e.to_string()),
                    ..Default::default()
                },
                None => self.render_frame(&self.states[i]),
            };
            out.push((self.states[i].variable.id.clone(), f.clone()));
            self.states[i].frame = Some(f);
        }
        out
    }
}

/// Projects every variable over the inclusive month range.
pub fn render_projections(
    variables: &[Variable],
    start: &str,
    end: &str,
) -> Result<VariableProjections, ProjectionError> {
    let months = get_months(start, end);
    if months.is_empty() {
        return Err(ProjectionError::Range);
    }

    let mut projections: VariableProjections =
        variables.iter().map(|v| (v.id.clone(), Vec::with_capacity(months.len()))).collect();

    for month in &months {
        debug!(month = %month, variables = variables.len(), "rendering projection month");
        for (id, frame) in FrameRenderContext::new(variables, month).render() {
            if let Some(frames) = projections.get_mut(&id) {
                frames.push(frame);
            }
        }
    }
    Ok(projections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{Expression, IdentifierReferences};
    use crate::projection::segment::{Breakdown, DistributionSource, GrowthType};
    use crate::projection::variable::VariableType;

    fn refs(vars: &[&Variable]) -> IdentifierReferences {
        vars.iter().map(|v| (v.name.clone(), v.id.clone())).collect()
    }

    fn basic_var(id: &str, name: &str, value: f64) -> Variable {
        let mut v = Variable::new(id, name, VariableType::Real, None);
        v.add_time_segment(TimeSegment::basic("2018-01", value, 0.0, GrowthType::Exponential)).unwrap();
        v
    }

    #[test]
    fn test_invalid_range() {
        let err = render_projections(&[], "2018-05", "2018-01").unwrap_err();
        assert_eq!(err.to_string(), "no valid date range given. expecting 2018-01, 2018-09");
    }

    #[test]
    fn test_empty_variable_list() {
        assert!(render_projections(&[], "2018-01", "2018-03").unwrap().is_empty());
    }

    #[test]
    fn test_one_frame_per_month() {
        let mut v = Variable::new("v", "users", VariableType::Integer, None);
        v.add_time_segment(TimeSegment::basic("2018-01", 3000.0, 0.5, GrowthType::Exponential)).unwrap();
        let p = render_projections(&[v], "2018-01", "2018-04").unwrap();
        let values: Vec<f64> = p["v"].iter().map(|f| f.projected_value.unwrap()).collect();
        assert_eq!(values, vec![3000.0, 4500.0, 6750.0, 10125.0]);
    }

    #[test]
    fn test_duplicate_ids_keep_first_definition() {
        let vars = [basic_var("v", "first", 1.0), basic_var("v", "second", 2.0)];
        let p = render_projections(&vars, "2018-01", "2018-02").unwrap();
        assert_eq!(p.len(), 1);
        assert_eq!(p["v"].len(), 2);
        assert_eq!(p["v"][0].projected_value, Some(1.0));
    }

    #[test]
    fn test_expression_sees_dependency_values() {
        let a = basic_var("a", "alpha", 10.0);
        let mut b = Variable::new("b", "beta", VariableType::Real, None);
        let e = Expression::parse("alpha * 2", &refs(&[&a])).unwrap();
        b.add_time_segment(TimeSegment::expression("2018-01", e, 0.0)).unwrap();
        // dependent listed first; ordering must still render `a` first
        let p = render_projections(&[b, a], "2018-01", "2018-02").unwrap();
        assert_eq!(p["b"][1].projected_value, Some(20.0));
    }

    #[test]
    fn test_static_distribution_expression() {
        let mut v = Variable::new("v", "users", VariableType::Real, None);
        let sd = Expression::parse("10", &IdentifierReferences::new()).unwrap();
        v.add_time_segment(
            TimeSegment::basic("2018-01", 1.0, 0.0, GrowthType::Exponential)
                .with_distribution(DistributionSource::Expression { expression: sd }),
        )
        .unwrap();
        let p = render_projections(&[v], "2018-01", "2018-03").unwrap();
        assert!(p["v"].iter().all(|f| f.std_dev() == Some(10.0)));
    }

    #[test]
    fn test_distribution_scope_via_d_call() {
        let mut a = basic_var("a", "alpha", 10.0);
        a.add_time_segment(
            TimeSegment::basic("2018-01", 10.0, 0.0, GrowthType::Exponential)
                .with_distribution(DistributionSource::Static { static_std_dev: 3.0 }),
        )
        .unwrap();
        let mut b = Variable::new("b", "beta", VariableType::Real, None);
        let value = Expression::parse("alpha", &refs(&[&a])).unwrap();
        let sd = Expression::parse("d(alpha) * 2", &refs(&[&a])).unwrap();
        b.add_time_segment(
            TimeSegment::expression("2018-01", value, 0.0)
                .with_distribution(DistributionSource::Expression { expression: sd }),
        )
        .unwrap();
        let p = render_projections(&[a, b], "2018-01", "2018-01").unwrap();
        assert_eq!(p["b"][0].std_dev(), Some(6.0));
    }

    #[test]
    fn test_cycles_and_missing_refs_are_flagged_not_dropped() {
        let x_ref: IdentifierReferences = [("y".to_string(), "y".to_string())].into_iter().collect();
        let y_ref: IdentifierReferences = [("x".to_string(), "x".to_string())].into_iter().collect();
        let ghost: IdentifierReferences = [("ghost".to_string(), "gone".to_string())].into_iter().collect();

        let mut x = Variable::new("x", "x", VariableType::Real, None);
        x.add_time_segment(TimeSegment::expression("2018-01", Expression::parse("y", &x_ref).unwrap(), 0.0)).unwrap();
        let mut y = Variable::new("y", "y", VariableType::Real, None);
        y.add_time_segment(TimeSegment::expression("2018-01", Expression::parse("x", &y_ref).unwrap(), 0.0)).unwrap();
        let mut z = Variable::new("z", "z", VariableType::Real, None);
        z.add_time_segment(TimeSegment::expression("2018-01", Expression::parse("ghost", &ghost).unwrap(), 0.0)).unwrap();
        let ok = basic_var("ok", "ok", 1.0);

        let p = render_projections(&[x, y, z, ok], "2018-01", "2018-02").unwrap();
        assert_eq!(p.len(), 4);
        for id in ["x", "y", "z"] {
            assert_eq!(p[id].len(), 2);
            assert_eq!(p[id][0].frame_dependency_error.as_deref(), Some("could not determine render order"));
        }
        assert_eq!(p["ok"][0].projected_value, Some(1.0));
    }

    #[test]
    fn test_associated_breakdown_scaled_by_value() {
        let mut mode = Variable::new("m", "mode", VariableType::Breakdown, None);
        mode.default_breakdown = Some(Breakdown::from([
            ("bus".to_string(), 0.2),
            ("train".to_string(), 0.5),
            ("car".to_string(), 0.3),
        ]));
        let mut trips = basic_var("t", "trips", 100.0);
        trips.add_breakdown_variable("m");

        let p = render_projections(&[trips, mode], "2018-01", "2018-01").unwrap();
        let f = &p["t"][0];
        let assoc = f.associated_breakdowns.as_ref().unwrap();
        assert_eq!(assoc.len(), 1);
        assert_eq!(assoc[0].slices.len(), 3);
        assert!((f.subframe_value("mode.train").unwrap() - 50.0).abs() < 1e-9);
        assert!((f.subframe_value("mode.bus").unwrap() - 20.0).abs() < 1e-9);
        // the breakdown variable itself emits its default slices
        assert_eq!(p["m"][0].subframe_value("car"), Some(0.3));
    }

    #[test]
    fn test_actual_scales_breakdown_before_projection() {
        let mut mode = Variable::new("m", "mode", VariableType::Breakdown, None);
        mode.add_time_segment(TimeSegment::breakdown("2018-01", Breakdown::from([("a".to_string(), 0.5)])))
            .unwrap();
        let mut v = basic_var("v", "v", 100.0);
        v.add_actual("2018-01", 40.0);
        v.add_breakdown_variable("m");
        let p = render_projections(&[v, mode], "2018-01", "2018-01").unwrap();
        assert_eq!(p["v"][0].actual_value, Some(40.0));
        assert_eq!(p["v"][0].subframe_value("mode.a"), Some(20.0));
    }
}
