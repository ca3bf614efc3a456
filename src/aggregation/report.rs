//! report.rs
//! Boils the raw samples of a node down to one report per scenario and
//! month.

use super::histogram::generate_histogram;
use super::stats::SampleStats;
use crate::param::response_ops::{merge_response_aspect, response_histogram_aggregation};
use crate::param::{Aspect, GraphParam, NumberParam, ResponseAspect};
use crate::simulation::SimulationError;
use crate::store::{
    Aggregate, AggregationMethod, MessageKind, MessageRate, RawNodeDataEntry, SimulationNode, StepAggregate, StepReport,
};
use std::collections::{BTreeMap, HashMap};

/// Number variant carrying only a value and a unit.
pub(crate) fn plain_number(value: f64, unit: Option<&str>) -> Aggregate {
    Aggregate::Number(NumberParam { value, unit: unit.map(str::to_string), ..Default::default() })
}

/// AVG, MIN, MAX, the percentiles and a histogram of `values`.
pub(crate) fn numeric_aggregates(values: &[f64], unit: Option<&str>, buckets: usize) -> StepAggregate {
    let stats = SampleStats::new(values);
    let mut step = StepAggregate::new();
    step.insert(
        AggregationMethod::Histogram,
        Aggregate::Histogram { buckets: generate_histogram(values, buckets), unit: unit.map(str::to_string) },
    );
    step.insert(AggregationMethod::Avg, plain_number(stats.mean(), unit));
    step.insert(AggregationMethod::Min, plain_number(stats.min(), unit));
    step.insert(AggregationMethod::Max, plain_number(stats.max(), unit));
    step.insert(AggregationMethod::Ninetieth, plain_number(stats.quantile(0.9), unit));
    step.insert(AggregationMethod::Ninetiefifth, plain_number(stats.quantile(0.95), unit));
    step.insert(AggregationMethod::Ninetieninth, plain_number(stats.quantile(0.99), unit));
    step
}

/// Same-named aspects of all samples, slices summed up.
fn merge_aspects<'a>(samples: impl Iterator<Item = &'a NumberParam>) -> Vec<Aspect> {
    let mut merged: Vec<Aspect> = Vec::new();
    for aspect in samples.flat_map(|n| n.aspects.iter()) {
        match merged.iter_mut().find(|m| m.name == aspect.name) {
            Some(m) => {
                for (slice, value) in &aspect.slices {
                    *m.slices.entry(slice.clone()).or_insert(0.0) += value;
                }
            }
            None => merged.push(Aspect { relative: false, ..aspect.clone() }),
        }
    }
    merged
}

fn merge_response_aspects<'a>(samples: impl Iterator<Item = &'a ResponseAspect>) -> Vec<ResponseAspect> {
    let mut merged: Vec<ResponseAspect> = Vec::new();
    for aspect in samples {
        match merged.iter_mut().find(|m| m.name == aspect.name) {
            Some(m) => *m = merge_response_aspect(m, aspect),
            None => merged.push(aspect.clone()),
        }
    }
    merged
}

/// Percentage of runs after the mean pass for which `hit` holds, floored.
/// A step with a single sample reports that sample.
fn rate<T>(samples: &[T], hit: impl Fn(&T) -> bool) -> f64 {
    let rate = match samples {
        [] => 0.0,
        [only] => f64::from(u8::from(hit(only))),
        [_, runs @ ..] => runs.iter().filter(|s| hit(s)).count() as f64 / runs.len() as f64,
    };
    (rate * 100.0).floor()
}

/// Aggregates the samples of one step. Numbers and responses yield
/// statistics, messages an occurrence rate, booleans a true rate.
pub fn aggregate_step(entries: &[&RawNodeDataEntry], buckets: usize) -> Result<StepAggregate, String> {
    let mut ordered: Vec<&RawNodeDataEntry> = entries.to_vec();
    ordered.sort_by_key(|e| e.mc_run);
    let params: Vec<&GraphParam> = ordered.iter().map(|e| &e.data).collect();
    let mut step = StepAggregate::new();

    // 1. Numbers and responses
    let numeric: Vec<&GraphParam> =
        params.iter().copied().filter(|p| p.is_number() || p.as_response().is_some()).collect();
    if let Some(base) = numeric.first() {
        let values: Vec<f64> = match base.as_response() {
            Some(_) => response_histogram_aggregation(numeric.iter().filter_map(|p| p.as_response())),
            None => numeric.iter().filter_map(|p| p.number_value()).collect(),
        };
        if values.iter().any(|v| v.is_nan()) {
            return Err("sample is not a number".to_string());
        }
        step.extend(numeric_aggregates(&values, base.unit(), buckets));

        let aspects = merge_aspects(numeric.iter().filter_map(|p| p.as_number()));
        if !aspects.is_empty() {
            step.insert(AggregationMethod::Aspects, Aggregate::Aspects { values: aspects });
        }
        let response_aspects =
            merge_response_aspects(numeric.iter().filter_map(|p| p.as_response()).flat_map(|r| r.aspects.iter()));
        if !response_aspects.is_empty() {
            step.insert(AggregationMethod::ResponseAspects, Aggregate::ResponseAspects { values: response_aspects });
        }
    }

    // 2. Messages; one kind per node
    let messages: Vec<&GraphParam> = params.iter().copied().filter(|p| p.as_message().is_some()).collect();
    if let Some(first) = messages.first() {
        let kind = match first {
            GraphParam::Error(_) => MessageKind::Error,
            _ => MessageKind::Warning,
        };
        let name = first.as_message().map(|m| m.name.clone()).unwrap_or_default();
        let rate = rate(&messages, |m| m.as_message().is_some_and(|m| !m.blank));
        step.insert(AggregationMethod::Messages, Aggregate::Messages { values: vec![MessageRate { kind, name, rate }] });
    }

    // 3. Booleans
    let booleans: Vec<bool> = params.iter().filter_map(|p| p.as_bool()).collect();
    if !booleans.is_empty() {
        step.insert(AggregationMethod::Rate, Aggregate::Rate { value: rate(&booleans, |b| *b) });
    }
    Ok(step)
}

fn group<'a>(entries: &'a [RawNodeDataEntry]) -> HashMap<(&'a str, &'a str), Vec<&'a RawNodeDataEntry>> {
    let mut groups: HashMap<(&str, &str), Vec<&RawNodeDataEntry>> = HashMap::new();
    for e in entries {
        groups.entry((e.scenario_id.as_str(), e.step_date.as_str())).or_default().push(e);
    }
    groups
}

/// Fills `aggregated_report` and `aggregation_methods` of `node` from
/// its raw samples. Steps without samples get no report.
pub fn aggregate_node(
    node: &mut SimulationNode,
    scenarios: &[String],
    months: &[String],
    buckets: usize,
) -> Result<(), SimulationError> {
    let failed = |reason: String| {
        SimulationError::Aggregation(format!("{}: {}", node.name.as_deref().unwrap_or(&node.object_id), reason))
    };
    let data = group(&node.raw_data);
    let responses = group(&node.raw_responses);

    let mut report: BTreeMap<String, BTreeMap<String, StepReport>> = BTreeMap::new();
    for scenario in scenarios {
        for month in months {
            let key = (scenario.as_str(), month.as_str());
            let step = StepReport {
                data: data.get(&key).map(|e| aggregate_step(e, buckets)).transpose().map_err(failed)?,
                response: responses.get(&key).map(|e| aggregate_step(e, buckets)).transpose().map_err(failed)?,
            };
            let data_empty = step.data.as_ref().map_or(true, |d| d.is_empty());
            let response_empty = step.response.as_ref().map_or(true, |r| r.is_empty());
            if !data_empty || !response_empty {
                report.entry(scenario.clone()).or_default().insert(month.clone(), step);
            }
        }
    }

    let methods: Vec<AggregationMethod> = report
        .values()
        .flat_map(|months| months.values())
        .flat_map(|step| step.data.iter().chain(step.response.iter()))
        .flat_map(|aggregate| aggregate.keys().copied())
        .collect();
    for method in methods {
        node.add_aggregation_method(method);
    }
    node.aggregated_report = report;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::response_ops::make_latency_response;
    use crate::param::MessageParam;
    use crate::store::NodeType;
    use rstest::rstest;

    fn entry(mc_run: Option<u32>, data: GraphParam) -> RawNodeDataEntry {
        RawNodeDataEntry { scenario_id: "s".into(), step_date: "2024-01".into(), mc_run, data }
    }

    fn aggregate(entries: Vec<RawNodeDataEntry>) -> StepAggregate {
        let refs: Vec<&RawNodeDataEntry> = entries.iter().collect();
        aggregate_step(&refs, 10).unwrap()
    }

    fn number(step: &StepAggregate, method: AggregationMethod) -> f64 {
        step[&method].as_number().map(|n| n.value).unwrap_or(f64::NAN)
    }

    #[test]
    fn test_number_statistics() {
        let step = aggregate(
            [(None, 5.0), (Some(0), 2.0), (Some(1), 4.0), (Some(2), 6.0), (Some(3), 8.0)]
                .into_iter()
                .map(|(run, v)| entry(run, GraphParam::number(v, Some("rps"))))
                .collect(),
        );
        assert_eq!(number(&step, AggregationMethod::Avg), 5.0);
        assert_eq!(number(&step, AggregationMethod::Min), 2.0);
        assert_eq!(number(&step, AggregationMethod::Max), 8.0);
        assert_eq!(step[&AggregationMethod::Avg].as_number().unwrap().unit.as_deref(), Some("rps"));
        match &step[&AggregationMethod::Histogram] {
            Aggregate::Histogram { buckets, .. } => assert_eq!(buckets.iter().map(|b| b.count).sum::<usize>(), 5),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!step.contains_key(&AggregationMethod::Aspects));
    }

    #[test]
    fn test_aspects_are_summed_per_slice() {
        let sample = |eu: f64, us: f64| {
            GraphParam::aspect_number(eu + us, None, vec![Aspect::new("region", &[("eu", eu), ("us", us)])], None)
        };
        let step = aggregate(vec![entry(None, sample(1.0, 3.0)), entry(Some(0), sample(2.0, 2.0))]);
        match &step[&AggregationMethod::Aspects] {
            Aggregate::Aspects { values } => {
                assert_eq!(values.len(), 1);
                assert_eq!(values[0].slices["eu"], 3.0);
                assert_eq!(values[0].slices["us"], 5.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[rstest]
    #[case(vec![false, true, false, false], 33.0)]
    #[case(vec![true, false, false], 0.0)]
    #[case(vec![true], 100.0)]
    #[case(vec![false], 0.0)]
    fn test_message_rate_skips_mean_pass(#[case] triggered: Vec<bool>, #[case] expected: f64) {
        let entries = triggered
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let run = if i == 0 { None } else { Some(i as u32 - 1) };
                entry(run, GraphParam::Warning(MessageParam { name: "Overload".into(), blank: !t }))
            })
            .collect();
        let step = aggregate(entries);
        assert_eq!(
            step[&AggregationMethod::Messages],
            Aggregate::Messages {
                values: vec![MessageRate { kind: MessageKind::Warning, name: "Overload".into(), rate: expected }]
            }
        );
    }

    #[test]
    fn test_boolean_rate_orders_by_run() {
        // the mean pass lands first even when stored last
        let step = aggregate(vec![
            entry(Some(0), GraphParam::boolean(true)),
            entry(Some(1), GraphParam::boolean(false)),
            entry(None, GraphParam::boolean(true)),
        ]);
        assert_eq!(step[&AggregationMethod::Rate], Aggregate::Rate { value: 50.0 });
    }

    #[test]
    fn test_responses_expand_into_samples() {
        let step = aggregate(vec![
            entry(None, make_latency_response(10.0, &[])),
            entry(Some(0), make_latency_response(30.0, &[])),
        ]);
        assert_eq!(number(&step, AggregationMethod::Avg), 20.0);
        assert_eq!(number(&step, AggregationMethod::Max), 30.0);
    }

    #[test]
    fn test_nan_sample_fails() {
        let refs = [entry(None, GraphParam::number(f64::NAN, None))];
        let refs: Vec<&RawNodeDataEntry> = refs.iter().collect();
        assert!(aggregate_step(&refs, 10).is_err());
    }

    #[test]
    fn test_node_report_per_scenario_and_month() {
        let mut node = SimulationNode::new("n", NodeType::ProcessOutport, "Out");
        node.raw_data.push(entry(None, GraphParam::number(1.0, None)));
        node.raw_data.push(RawNodeDataEntry { step_date: "2024-02".into(), ..entry(None, GraphParam::boolean(true)) });

        let months = vec!["2024-01".to_string(), "2024-02".to_string(), "2024-03".to_string()];
        aggregate_node(&mut node, &["s".to_string()], &months, 10).unwrap();

        let scenario = &node.aggregated_report["s"];
        assert_eq!(scenario.len(), 2);
        assert!(scenario["2024-01"].response.is_none());
        assert!(scenario["2024-02"].data.as_ref().unwrap().contains_key(&AggregationMethod::Rate));
        assert!(node.aggregation_methods.contains(&AggregationMethod::Avg));
        assert!(node.aggregation_methods.contains(&AggregationMethod::Rate));
    }
}
