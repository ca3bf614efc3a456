//! flow.rs
//! Elements routing loads between branches.

use super::description::{PortTemplate, ProcessInterfaceDescription};
use super::element::{ElementCore, ElementKind};
use crate::graph::description::{InportDescription, OutportDescription, ResponsePolicy};
use crate::param::response_ops::add_response_groups;
use crate::param::{GraphParam, ParamType};
use crate::simulation::env::SampleSink;

pub const PARALLEL_ID: &str = "51c9c02a-21ce-45f6-be6c-512f01aa0d32";
const PAR_IN: &str = "2c09be68-f259-4be5-85e9-9fbbcd048108";
const PAR_OUT_A: &str = "2ff959c2-422b-4be3-902b-ca659d690fc1";
const PAR_OUT_B: &str = "94b5851d-9364-4c90-8497-700a20fb5178";
const PAR_TMPL: &str = "1a09acf7-3dd5-4ebf-9f01-1872d505512c";
const PAR_TMPL_OUT: &str = "df9e60c2-169c-4d30-a4f7-58564432a261";

pub fn parallel_description() -> ProcessInterfaceDescription {
    let tps = |id: &str, name: &str| OutportDescription::new(id, name, &[ParamType::Number], Some("tps"));
    ProcessInterfaceDescription::new(PARALLEL_ID, "Parallel Execution")
        .with_description("Executes all outgoing requests in parallel; the slowest branch determines the response.")
        .with_inport(
            InportDescription::new(PAR_IN, "In", &[ParamType::Number], ResponsePolicy::Always).with_units(&["tps"]),
        )
        .with_outport(tps(PAR_OUT_A, "Out-A"))
        .with_outport(tps(PAR_OUT_B, "Out-B"))
        .with_template(PortTemplate::new(PAR_TMPL, "Parallel Output").with_outport(tps(PAR_TMPL_OUT, "Out-X")))
}

/// Forwards the load to every outport.
pub struct Parallel;

impl ElementKind for Parallel {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        if let Some(load) = core.take_input(PAR_IN, sink) {
            core.emit_all(&load, sink);
        }
    }
}

pub const SERIAL_ID: &str = "23b4f3ff-1e7c-4fb9-b8b0-a98611f58573";
const SER_IN: &str = "7bd20c1f-3b00-40a6-a978-2c3f72e34f47";
const SER_OUT_A: &str = "2562449c-9f98-443b-803c-a2e2ba998d98";
const SER_OUT_B: &str = "6f3fd23e-9566-42bc-877e-e72b2fc5dd3e";
const SER_TMPL: &str = "3f0a3bc0-fe55-4947-a4a8-998205798368";
const SER_TMPL_OUT: &str = "900afc02-881d-42b2-8632-0d468c4e1137";

pub fn serial_description() -> ProcessInterfaceDescription {
    let out = |id: &str, name: &str| OutportDescription::new(id, name, &[ParamType::Number], None);
    ProcessInterfaceDescription::new(SERIAL_ID, "Serial Execution")
        .with_description("Executes all outgoing requests one after another; responses add up.")
        .with_inport(InportDescription::new(SER_IN, "In", &[ParamType::Number], ResponsePolicy::Passthrough))
        .with_outport(out(SER_OUT_A, "Out-A"))
        .with_outport(out(SER_OUT_B, "Out-B"))
        .with_template(PortTemplate::new(SER_TMPL, "Serial Output").with_outport(out(SER_TMPL_OUT, "Out-X")))
}

/// Same loads as [`Parallel`], but responses are added.
pub struct Serial;

impl ElementKind for Serial {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        if let Some(load) = core.take_input(SER_IN, sink) {
            core.emit_all(&load, sink);
        }
    }

    fn process_response(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let groups: Vec<Vec<GraphParam>> =
            (0..core.outport_count()).filter_map(|idx| core.outport_response(idx, sink)).collect();
        if !groups.is_empty() {
            core.respond(SER_IN, add_response_groups(&groups), sink);
        }
    }
}

pub const CONDITIONAL_ID: &str = "1bc3082b-a2b2-4192-9016-4ad1177130b5";
const COND_IN_SWITCH: &str = "ed1ce2ff-0121-49f4-8ec1-f26be3566d83";
const COND_IN_TRUE: &str = "f44946cd-b292-49f9-9770-af00530d769d";
const COND_IN_FALSE: &str = "eb40dad4-e3e1-44df-9dc1-f23f060476ee";
const COND_OUT: &str = "3ec84792-1305-4fa2-a52a-39310810eb38";

pub fn conditional_description() -> ProcessInterfaceDescription {
    ProcessInterfaceDescription::new(CONDITIONAL_ID, "Conditional")
        .with_inport(InportDescription::new(COND_IN_SWITCH, "Switch", &[ParamType::Boolean], ResponsePolicy::Never))
        .with_inport(InportDescription::new(COND_IN_TRUE, "True", &[], ResponsePolicy::Passthrough))
        .with_inport(InportDescription::new(COND_IN_FALSE, "False", &[], ResponsePolicy::Passthrough))
        .with_outport(OutportDescription::new(COND_OUT, "Out", &[], None))
}

/// Emits the True or False input depending on a boolean switch. Anything
/// but a boolean switch emits nothing.
pub struct Conditional;

impl ElementKind for Conditional {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let switch = core.take_input(COND_IN_SWITCH, sink);
        let on_true = core.take_input(COND_IN_TRUE, sink);
        let on_false = core.take_input(COND_IN_FALSE, sink);

        let selected = match switch.as_ref().and_then(GraphParam::as_bool) {
            Some(true) => on_true,
            Some(false) => on_false,
            None => None,
        };
        if let Some(load) = selected {
            core.emit(COND_OUT, load, sink);
        }
    }
}

pub const REMOVE_RESPONSE_ID: &str = "a6b4b5d8-5175-4ae5-8e14-af439a4d6fc9";
const RMR_IN: &str = "5408de79-a9c5-4ccb-b322-ce3d6b6a1a86";
const RMR_OUT: &str = "c071deeb-ef08-44b3-8e00-bb0bdaab3a20";

pub fn remove_response_description() -> ProcessInterfaceDescription {
    ProcessInterfaceDescription::new(REMOVE_RESPONSE_ID, "Remove Response")
        .with_description("Forwards the load and drops every response coming back.")
        .with_inport(InportDescription::new(RMR_IN, "In", &[], ResponsePolicy::Never))
        .with_outport(OutportDescription::new(RMR_OUT, "Out", &[], None))
}

pub struct RemoveResponse;

impl ElementKind for RemoveResponse {
    fn accepts_responses(&self) -> bool {
        false
    }

    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        if let Some(load) = core.take_input(RMR_IN, sink) {
            core.emit(RMR_OUT, load, sink);
        }
    }

    fn process_response(&mut self, _core: &mut ElementCore, _sink: &mut dyn SampleSink) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::testing::{run_element, Harness};
    use crate::param::response_ops::{make_latency_response, response_value_mean};
    use rstest::rstest;

    fn latency_of(response: &[GraphParam]) -> f64 {
        response_value_mean(&response[0].as_response().unwrap().value)
    }

    #[test]
    fn test_parallel_feeds_every_branch() {
        let mut h = Harness::new(PARALLEL_ID)
            .input(PAR_IN, GraphParam::number(12.0, Some("tps")))
            .template_output(PAR_TMPL, PAR_TMPL_OUT, None);
        h.run();
        for port in [PAR_OUT_A, PAR_OUT_B, "df9e60c2-169c-4d30-a4f7-58564432a261#1"] {
            assert_eq!(h.load(port).and_then(|l| l.number_value()), Some(12.0));
        }
    }

    #[rstest]
    #[case(PARALLEL_ID, PAR_IN, [PAR_OUT_A, PAR_OUT_B], 20.0)]
    #[case(SERIAL_ID, SER_IN, [SER_OUT_A, SER_OUT_B], 30.0)]
    fn test_branch_responses(#[case] id: &str, #[case] inport: &str, #[case] outs: [&str; 2], #[case] expected: f64) {
        let mut h = Harness::new(id).input(inport, GraphParam::number(1.0, None));
        h.run();
        h.respond(vec![
            (outs[0], vec![make_latency_response(10.0, &[])]),
            (outs[1], vec![make_latency_response(20.0, &[])]),
        ]);
        let response = h.response(inport).unwrap();
        assert!((latency_of(&response) - expected).abs() < 1e-9);
    }

    #[rstest]
    #[case(Some(true), Some(1.0))]
    #[case(Some(false), Some(2.0))]
    #[case(None, None)]
    fn test_conditional(#[case] switch: Option<bool>, #[case] expected: Option<f64>) {
        let mut h = Harness::new(CONDITIONAL_ID)
            .input(COND_IN_TRUE, GraphParam::number(1.0, None))
            .input(COND_IN_FALSE, GraphParam::number(2.0, None));
        if let Some(switch) = switch {
            h = h.input(COND_IN_SWITCH, GraphParam::boolean(switch));
        }
        assert_eq!(run_element(&mut h, COND_OUT).and_then(|l| l.number_value()), expected);
    }

    #[test]
    fn test_remove_response_drops_responses() {
        let mut h = Harness::new(REMOVE_RESPONSE_ID).input(RMR_IN, GraphParam::number(5.0, None));
        assert_eq!(run_element(&mut h, RMR_OUT).and_then(|l| l.number_value()), Some(5.0));
        h.respond(vec![(RMR_OUT, vec![make_latency_response(10.0, &[])])]);
        assert!(h.response(RMR_IN).is_none());
    }
}
