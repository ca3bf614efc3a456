//! aspect.rs
//! Elements creating, splitting and dropping breakdowns of loads.

use super::description::{PortTemplate, ProcessInterfaceDescription};
use super::element::{ElementCore, ElementKind};
use crate::graph::description::{InportDescription, OutportDescription, ResponsePolicy};
use crate::param::load_ops::{filter_by_breakdown_slice, scale_breakdown, scale_breakdowns};
use crate::param::response_ops::{combine_response_groups_weighted, zero_value};
use crate::param::{Aspect, GraphParam, NumberParam, ParamType, UNKNOWN_SLICE};
use crate::simulation::env::SampleSink;
use crate::store::MessageCode;
use std::collections::BTreeMap;
use tracing::debug;

fn load_in(id: &str) -> InportDescription {
    InportDescription::new(id, "Load", &[ParamType::Number], ResponsePolicy::Passthrough)
}

fn number_out(id: &str, name: &str) -> OutportDescription {
    OutportDescription::new(id, name, &[ParamType::Number], None)
}

pub const SPLIT_BY_ASPECT_ID: &str = "c6a9bfed-4949-4692-b5c3-3906f48bc9ad";
const SPLIT_IN_LOAD: &str = "07638ad0-7e36-4392-82e0-e90b5898dede";
const SPLIT_IN_NAME: &str = "836a53ce-2a9f-4592-a93c-e9d85e94bc57";
const SPLIT_OUT_UNDEFINED: &str = "34703d60-4c73-446a-b7c6-40e4ce92b1b3";
const SPLIT_TMPL: &str = "965261aa-e0a6-46a0-aa82-33defa2d4efc";
const SPLIT_TMPL_OUT: &str = "8cdf6ffc-d33c-4aee-b6cc-571a8f44f0e3";

pub fn split_by_aspect_description() -> ProcessInterfaceDescription {
    ProcessInterfaceDescription::new(SPLIT_BY_ASPECT_ID, "Split By Aspect")
        .with_description("Routes each slice of a breakdown to its own outport.")
        .with_inport(load_in(SPLIT_IN_LOAD))
        .with_inport(InportDescription::new(SPLIT_IN_NAME, "Aspect Name", &[ParamType::String], ResponsePolicy::Never))
        .with_outport(number_out(SPLIT_OUT_UNDEFINED, "Undefined"))
        .with_template(
            PortTemplate::new(SPLIT_TMPL, "Slice Output")
                .with_outport(number_out(SPLIT_TMPL_OUT, "Slice Out").with_config(ParamType::String)),
        )
}

/// Splits an aspect number by the slices of one named breakdown. Slice
/// outports name their slice in the port config; the Undefined outport
/// receives the "unknown" slice, or the whole load when it cannot be split.
#[derive(Default)]
pub struct SplitByAspect {
    slice_outports: BTreeMap<String, usize>,
    active_aspect: Option<Aspect>,
}

impl SplitByAspect {
    fn aspect_name(core: &mut ElementCore, sink: &mut dyn SampleSink) -> Option<String> {
        let name = core
            .take_input(SPLIT_IN_NAME, sink)
            .and_then(|p| p.as_str().map(str::to_string))
            .filter(|n| !n.trim().is_empty());
        if name.is_none() {
            if let Some(port) = core.inport(SPLIT_IN_NAME) {
                port.warn(sink, MessageCode::InportParamMissing, Some("aspect name needs to be set"));
            }
        }
        name
    }
}

impl ElementKind for SplitByAspect {
    fn configure(&mut self, core: &mut ElementCore) {
        if let Some(idx) = core.outport_index(SPLIT_OUT_UNDEFINED) {
            self.slice_outports.insert(UNKNOWN_SLICE.to_string(), idx);
        }
        for idx in core.template_outports(SPLIT_TMPL_OUT) {
            let Some(outport) = core.outport_at_mut(idx) else { continue };
            let Some(slice) = outport.config().and_then(GraphParam::as_str).map(str::to_string) else {
                continue;
            };
            outport.label = format!("Slice '{}'", slice);
            self.slice_outports.insert(slice, idx);
        }
    }

    fn reset(&mut self) {
        self.active_aspect = None;
    }

    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let load = core.take_input(SPLIT_IN_LOAD, sink);
        let name = Self::aspect_name(core, sink);
        let Some(load) = load else { return };

        let split = match (name, &load) {
            (Some(name), GraphParam::AspectNumber(number)) if !number.aspects.is_empty() => Some((name, number.clone())),
            _ => None,
        };
        let Some((name, number)) = split else {
            core.emit(SPLIT_OUT_UNDEFINED, load, sink);
            return;
        };

        self.active_aspect = number.aspects.iter().rev().find(|a| a.name == name).cloned();
        for (slice, &idx) in &self.slice_outports {
            if let Some(part) = filter_by_breakdown_slice(&number, &name, slice) {
                core.emit_at(idx, GraphParam::AspectNumber(part), sink);
            }
        }
    }

    /// Slice responses are joined, weighted by the slice sizes of the last
    /// split. Without a split only the Undefined response goes back.
    fn process_response(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let mut responses: Vec<(&str, Vec<GraphParam>)> = Vec::new();
        for (slice, &idx) in &self.slice_outports {
            if let Some(response) = core.outport_response(idx, sink).filter(|r| !r.is_empty()) {
                responses.push((slice.as_str(), response));
            }
        }

        let aggregated = match &self.active_aspect {
            Some(active) if !responses.is_empty() => {
                let weights: Vec<f64> =
                    responses.iter().map(|(slice, _)| active.slices.get(*slice).copied().unwrap_or(0.0)).collect();
                let groups: Vec<Vec<GraphParam>> = responses.into_iter().map(|(_, r)| r).collect();
                let undefined = |aspect: &str, _: &str| if aspect == active.name { None } else { Some(zero_value()) };
                combine_response_groups_weighted(&groups, &weights, &undefined)
            }
            _ => match responses.into_iter().find(|(slice, _)| *slice == UNKNOWN_SLICE) {
                Some((_, response)) => response,
                None => return,
            },
        };
        core.respond(SPLIT_IN_LOAD, aggregated, sink);
    }
}

pub const ADD_ASPECT_ID: &str = "5a615ab0-8960-42e7-a99c-78e5c548bfda";
const ADD_IN_LOAD: &str = "d5490871-414c-4b80-8502-5e39721e8feb";
const ADD_IN_ASPECT: &str = "301d502f-d421-44c5-a917-864c19b0f008";
const ADD_OUT: &str = "b93ad313-aea6-4acb-8162-d5338274a92b";

pub fn add_aspect_description() -> ProcessInterfaceDescription {
    ProcessInterfaceDescription::new(ADD_ASPECT_ID, "Add Aspect")
        .with_inport(load_in(ADD_IN_LOAD))
        .with_inport(InportDescription::new(ADD_IN_ASPECT, "Aspect", &[ParamType::Breakdown], ResponsePolicy::Never))
        .with_outport(number_out(ADD_OUT, "Out"))
}

/// Attaches a breakdown, scaled to the load, next to the existing ones.
pub struct AddAspect;

impl ElementKind for AddAspect {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let load = core.take_input(ADD_IN_LOAD, sink);
        let aspect = core.take_input(ADD_IN_ASPECT, sink);
        let Some(load) = load else { return };

        let out = match (load.to_aspect_number(), aspect) {
            (Some(mut number), Some(GraphParam::Aspect { value })) => {
                number.aspects.push(scale_breakdown(number.value, &value));
                GraphParam::AspectNumber(number)
            }
            _ => load,
        };
        core.emit(ADD_OUT, out, sink);
    }
}

pub const REPLACE_ASPECT_ID: &str = "7cd08bf0-da46-4a51-9e3e-61a81921f1a7";
const REPL_IN_LOAD: &str = "7f31dd1c-855e-4bb4-9868-8f083c1beb57";
const REPL_IN_ASPECT: &str = "ec7e2dbb-79ce-4dbe-b6e6-54e111f11d95";
const REPL_OUT: &str = "5a6f3142-70ea-4af2-8a18-eb821ef47cea";

pub fn replace_aspect_description() -> ProcessInterfaceDescription {
    ProcessInterfaceDescription::new(REPLACE_ASPECT_ID, "Replace Aspect")
        .with_inport(load_in(REPL_IN_LOAD))
        .with_inport(InportDescription::new(
            REPL_IN_ASPECT,
            "Aspect",
            &[ParamType::Breakdown, ParamType::Number],
            ResponsePolicy::Never,
        ))
        .with_outport(number_out(REPL_OUT, "Out"))
}

/// Replaces all breakdowns of a number: by a single breakdown, by the
/// breakdowns of another aspect number, or by none.
pub struct ReplaceAspect;

impl ElementKind for ReplaceAspect {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let load = core.take_input(REPL_IN_LOAD, sink);
        let aspect = core.take_input(REPL_IN_ASPECT, sink);
        let Some(load) = load else { return };
        let Some(number) = load.as_number() else {
            core.emit(REPL_OUT, load, sink);
            return;
        };

        let base = NumberParam { value: number.value, unit: number.unit.clone(), ..Default::default() };
        let out = match &aspect {
            Some(GraphParam::Aspect { value }) => {
                GraphParam::AspectNumber(NumberParam { aspects: vec![scale_breakdown(base.value, value)], ..base })
            }
            Some(other) if other.is_aspect_number() => {
                GraphParam::AspectNumber(NumberParam { aspects: scale_breakdowns(base.value, other.aspects()), ..base })
            }
            _ => GraphParam::Number(base),
        };
        core.emit(REPL_OUT, out, sink);
    }
}

pub const REMOVE_ASPECT_ID: &str = "bda55420-1bd1-4e4e-bceb-da993d3040cc";
const RMA_IN: &str = "dba4d0fa-2717-4c67-8357-0a1351ad278d";
const RMA_OUT: &str = "e3ee82f7-dfbc-42ca-bc76-3b8d1537c3b2";

pub fn remove_aspect_description() -> ProcessInterfaceDescription {
    ProcessInterfaceDescription::new(REMOVE_ASPECT_ID, "Remove Aspect")
        .with_inport(InportDescription::new(RMA_IN, "In", &[ParamType::Number], ResponsePolicy::Passthrough))
        .with_outport(number_out(RMA_OUT, "Out"))
}

pub struct RemoveAspect;

impl ElementKind for RemoveAspect {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let Some(load) = core.take_input(RMA_IN, sink) else { return };
        let out = match load {
            GraphParam::AspectNumber(n) => GraphParam::Number(NumberParam { value: n.value, unit: n.unit, ..Default::default() }),
            other => other,
        };
        core.emit(RMA_OUT, out, sink);
    }
}

pub const EXTRACT_BREAKDOWN_ID: &str = "ebf77855-9624-46a6-a1d9-7eb756343c66";
const EXT_IN_LOAD: &str = "ce00c1e2-0677-4c3e-8e58-e7bce8c1b088";
const EXT_IN_NAME: &str = "9fd695a2-6830-11e9-a923-1681be663d3e";
const EXT_OUT: &str = "71646d47-3371-4579-bd12-50dfb262b425";

pub fn extract_breakdown_description() -> ProcessInterfaceDescription {
    ProcessInterfaceDescription::new(EXTRACT_BREAKDOWN_ID, "Extract Breakdown")
        .with_inport(load_in(EXT_IN_LOAD))
        .with_inport(InportDescription::new(EXT_IN_NAME, "Aspect Name", &[ParamType::String], ResponsePolicy::Never))
        .with_outport(OutportDescription::new(EXT_OUT, "Aspect", &[ParamType::Breakdown], None))
}

/// Emits one breakdown of an aspect number: the named one, or the first
/// when no name is given.
pub struct ExtractBreakdown;

impl ElementKind for ExtractBreakdown {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let load = core.take_input(EXT_IN_LOAD, sink);
        let name = core.take_input(EXT_IN_NAME, sink);
        let Some(load) = load.filter(GraphParam::is_aspect_number) else { return };

        let aspect = match name.as_ref().and_then(GraphParam::as_str) {
            Some(name) => load.aspects().iter().find(|a| a.name == name),
            None => load.aspects().first(),
        };
        match aspect {
            Some(aspect) => core.emit(EXT_OUT, GraphParam::Aspect { value: aspect.clone() }, sink),
            None => debug!(element = %core.label, "no matching breakdown"),
        }
    }
}
