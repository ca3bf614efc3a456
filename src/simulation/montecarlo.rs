//! montecarlo.rs
//! Turns resolved scenario inputs into the loads of one pass.

use crate::param::load_ops::make_breakdown_relative;
use crate::param::random::mean;
use crate::param::{Aspect, GraphParam, NumberParam, Sampler};
use std::collections::BTreeMap;

/// Which kind of pass the loads are drawn for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Deterministic: every distribution contributes its mean.
    Mean,
    MonteCarlo,
}

/// Relative breakdowns become absolute against `value`.
fn absolute_aspects(aspects: &[Aspect], value: f64) -> Vec<Aspect> {
    aspects
        .iter()
        .map(|aspect| {
            if !aspect.relative {
                return aspect.clone();
            }
            Aspect {
                slices: aspect.slices.iter().map(|(k, v)| (k.clone(), v * value.abs())).collect(),
                relative: false,
                ..aspect.clone()
            }
        })
        .collect()
}

/// Samples one input. Numbers with a standard deviation are drawn from a
/// normal distribution on Monte Carlo passes; random params contribute
/// their mean or a sample. Other params pass through unchanged.
pub fn sample_param(param: &GraphParam, sampler: &mut Sampler, pass: Pass) -> GraphParam {
    match param {
        GraphParam::AspectNumber(n) | GraphParam::NormalDistNumber(n) => {
            let mut sampled = NumberParam { aspects: Vec::new(), ..n.clone() };
            if pass == Pass::MonteCarlo {
                if let Some(sd) = n.std_dev.filter(|sd| *sd > 0.0) {
                    sampled.value = sampler.normal(n.value, sd);
                    sampled.std_dev = None;
                }
            }
            sampled.aspects = absolute_aspects(&n.aspects, sampled.value);
            match param {
                GraphParam::NormalDistNumber(_) => GraphParam::NormalDistNumber(sampled),
                _ => GraphParam::AspectNumber(sampled),
            }
        }
        GraphParam::Random(r) => {
            let value = match pass {
                Pass::Mean => mean(&r.distribution),
                Pass::MonteCarlo => sampler.sample(&r.distribution),
            };
            let relative: Vec<Aspect> = r.aspects.iter().map(make_breakdown_relative).collect();
            GraphParam::aspect_number(value, r.unit.as_deref(), absolute_aspects(&relative, value), None)
        }
        other => other.clone(),
    }
}

pub fn sample_inputs(
    inputs: &BTreeMap<String, GraphParam>,
    sampler: &mut Sampler,
    pass: Pass,
) -> BTreeMap<String, GraphParam> {
    inputs.iter().map(|(id, param)| (id.clone(), sample_param(param, sampler, pass))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::{RandomDistribution, RandomNumberParam};
    use rstest::rstest;

    #[test]
    fn test_mean_pass_keeps_value_and_scales_relative_aspects() {
        let aspect = Aspect::new("region", &[("eu", 0.25), ("us", 0.75)]).relative();
        let fixed = Aspect::new("tier", &[("gold", 3.0)]);
        let input = GraphParam::aspect_number(-40.0, Some("rps"), vec![aspect, fixed.clone()], Some(5.0));

        let out = sample_param(&input, &mut Sampler::new(Some(1)), Pass::Mean);
        let n = out.as_number().unwrap();
        assert_eq!(n.value, -40.0);
        assert_eq!(n.std_dev, Some(5.0));
        assert!(!n.aspects[0].relative);
        assert_eq!(n.aspects[0].slices["us"], 30.0);
        assert_eq!(n.aspects[1], fixed);
    }

    #[test]
    fn test_monte_carlo_pass_samples_and_scales_to_the_sample() {
        let aspect = Aspect::new("region", &[("eu", 0.5), ("us", 0.5)]).relative();
        let input = GraphParam::aspect_number(100.0, None, vec![aspect], Some(10.0));
        let mut sampler = Sampler::new(Some(11));

        let values: Vec<f64> = (0..200)
            .map(|_| {
                let out = sample_param(&input, &mut sampler, Pass::MonteCarlo);
                let n = out.as_number().unwrap();
                assert!((n.aspects[0].slice_sum() - n.value.abs()).abs() < 1e-9);
                assert_eq!(n.std_dev, None);
                n.value
            })
            .collect();
        assert!(values.iter().any(|v| *v != 100.0));
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        assert!((avg - 100.0).abs() < 3.0, "{}", avg);
    }

    #[rstest]
    #[case(Pass::Mean, 2.0)]
    #[case(Pass::MonteCarlo, 2.0)]
    fn test_random_param(#[case] pass: Pass, #[case] expected: f64) {
        let input = GraphParam::Random(RandomNumberParam {
            distribution: RandomDistribution::Uniform { a: 2.0, b: 2.0 },
            unit: Some("ms".into()),
            aspects: vec![Aspect::new("kind", &[("read", 3.0), ("write", 1.0)])],
        });
        let out = sample_param(&input, &mut Sampler::new(Some(3)), pass);
        let n = out.as_number().unwrap();
        assert_eq!(n.value, expected);
        assert_eq!(n.unit.as_deref(), Some("ms"));
        assert_eq!(n.aspects[0].slices["read"], 1.5);
    }

    #[test]
    fn test_other_params_pass_through() {
        let inputs = BTreeMap::from([
            ("a".to_string(), GraphParam::number(4.0, None)),
            ("b".to_string(), GraphParam::string("x")),
        ]);
        let out = sample_inputs(&inputs, &mut Sampler::new(None), Pass::MonteCarlo);
        assert_eq!(out, inputs);
    }
}
