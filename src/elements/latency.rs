//! latency.rs
//! Elements that add to the response travelling back to the caller.

use super::description::ProcessInterfaceDescription;
use super::element::{ElementCore, ElementKind};
use crate::graph::description::{InportDescription, OutportDescription, ResponsePolicy};
use crate::param::response_ops::{add_response_groups, is_latency_response, make_hop_response, make_latency_response};
use crate::param::{GraphParam, ParamType, ResponseAspect, ResponseEntry, NORM_FREQ};
use crate::simulation::env::SampleSink;

/// Prefix of the response aspect recording what an element added.
pub const SOURCE_ASPECT_PREFIX: &str = "__source__";

fn load_aspects(core: &ElementCore, inport: &str) -> Vec<crate::param::Aspect> {
    core.inport(inport).and_then(|p| p.yield_load()).map(|l| l.aspects().to_vec()).unwrap_or_default()
}

fn outport_response(core: &mut ElementCore, outport: &str, sink: &mut dyn SampleSink) -> Option<Vec<GraphParam>> {
    let idx = core.outport_index(outport)?;
    core.outport_response(idx, sink)
}

pub const ADD_LATENCY_ID: &str = "acbb16d9-1c4c-4930-a3b4-28a7c33b54e4";
const AL_IN: &str = "38563813-210b-4458-8172-4138186966a8";
const AL_IN_MEAN: &str = "edc9a0e8-2ed1-4a8d-9944-b4b11a95ddd4";
const AL_IN_STDDEV: &str = "fd8cf9bd-0390-4152-9db2-f3c63bee2124";
const AL_OUT: &str = "8421bb7b-908b-44e6-879e-b3b32c8815d3";

pub fn add_latency_description() -> ProcessInterfaceDescription {
    let param = |id: &str, name: &str| {
        InportDescription::new(id, name, &[ParamType::Number], ResponsePolicy::Never).with_units(&["ms"])
    };
    ProcessInterfaceDescription::new(ADD_LATENCY_ID, "Add Latency")
        .with_description("Adds a normally distributed latency to the response.")
        .with_inport(
            InportDescription::new(AL_IN, "In", &[ParamType::Number], ResponsePolicy::Always).with_units(&["tps"]),
        )
        .with_inport(param(AL_IN_MEAN, "Mean"))
        .with_inport(param(AL_IN_STDDEV, "StdDev"))
        .with_outport(OutportDescription::new(AL_OUT, "Out", &[ParamType::Number], Some("tps")))
}

/// Forwards the load; on the way back adds `Mean` milliseconds to the
/// latency. Monte Carlo runs draw from `normal(Mean, StdDev)` instead.
pub struct AddLatency;

impl AddLatency {
    fn latency(core: &ElementCore, sink: &mut dyn SampleSink) -> Option<f64> {
        let value = |id: &str| core.inport(id).and_then(|p| p.yield_load()).and_then(GraphParam::number_value);
        let mean = value(AL_IN_MEAN)?;
        match value(AL_IN_STDDEV) {
            Some(sd) if sd > 0.0 && !sink.step().is_mean_run() => Some(sink.sampler().normal(mean, sd)),
            _ => Some(mean),
        }
    }
}

impl ElementKind for AddLatency {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        core.take_input(AL_IN_MEAN, sink);
        core.take_input(AL_IN_STDDEV, sink);
        if let Some(load) = core.take_input(AL_IN, sink) {
            core.emit(AL_OUT, load, sink);
        }
    }

    fn process_response(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let incoming = outport_response(core, AL_OUT, sink);
        let has_latency = incoming.as_ref().is_some_and(|r| r.iter().any(is_latency_response));
        let mean = Self::latency(core, sink);
        if mean.is_none() && !has_latency {
            return;
        }
        let latency = mean.unwrap_or(0.0);

        let own = vec![make_latency_response(latency, &load_aspects(core, AL_IN))];
        let mut response = match incoming {
            Some(incoming) if has_latency => add_response_groups(&[own, incoming]),
            _ => own,
        };
        if let Some(GraphParam::ResponseNumber(r)) = response.iter_mut().find(|r| is_latency_response(r)) {
            r.aspects.push(ResponseAspect {
                kind: Default::default(),
                name: format!("{}{}", SOURCE_ASPECT_PREFIX, core.sim_id),
                relative: false,
                slices: [("added".to_string(), vec![ResponseEntry { value: latency, freq: NORM_FREQ }])]
                    .into_iter()
                    .collect(),
            });
        }
        core.respond(AL_IN, response, sink);
    }
}

pub const ADD_HOP_ID: &str = "f68eef3d-ac8c-4e0e-9c0d-b541c7c7915b";
const AH_IN: &str = "24c2198c-57be-4b24-b113-93aa782d0626";
const AH_OUT: &str = "9f1b8dfd-fda6-40f2-90cc-3bcbaf576a31";

pub fn add_hop_description() -> ProcessInterfaceDescription {
    ProcessInterfaceDescription::new(ADD_HOP_ID, "Add Hop")
        .with_description("Counts one network hop in the response.")
        .with_inport(InportDescription::new(AH_IN, "In", &[ParamType::Number], ResponsePolicy::Always))
        .with_outport(OutportDescription::new(AH_OUT, "Out", &[ParamType::Number], None))
}

pub struct AddHop;

impl ElementKind for AddHop {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        if let Some(load) = core.take_input(AH_IN, sink) {
            core.emit(AH_OUT, load, sink);
        }
    }

    fn process_response(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let mut groups = vec![vec![make_hop_response(1.0, &load_aspects(core, AH_IN))]];
        groups.extend(outport_response(core, AH_OUT, sink));
        core.respond(AH_IN, add_response_groups(&groups), sink);
    }
}
