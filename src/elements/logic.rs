//! logic.rs
//! Boolean elements.

use super::description::{PortTemplate, ProcessInterfaceDescription};
use super::element::{ElementCore, ElementKind};
use crate::graph::description::{InportDescription, OutportDescription, ResponsePolicy};
use crate::param::{GraphParam, ParamType};
use crate::simulation::env::SampleSink;

pub const NOT_ID: &str = "43ec72f1-14a9-4434-916c-a12c2e230947";
const NOT_IN: &str = "a3714110-1fba-4b01-a1b7-8a8ed7310384";
const NOT_OUT: &str = "7ff3e382-e058-44f3-9293-d1a8d805bfd8";

pub fn not_description() -> ProcessInterfaceDescription {
    ProcessInterfaceDescription::new(NOT_ID, "Not")
        .with_inport(InportDescription::new(NOT_IN, "In", &[ParamType::Boolean], ResponsePolicy::Passthrough))
        .with_outport(OutportDescription::new(NOT_OUT, "Out", &[ParamType::Boolean], None))
}

pub struct Not;

impl ElementKind for Not {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        if let Some(value) = core.take_input(NOT_IN, sink).as_ref().and_then(GraphParam::as_bool) {
            core.emit(NOT_OUT, GraphParam::boolean(!value), sink);
        }
    }
}

pub const GREATER_THAN_ID: &str = "b06160a3-1573-4568-93f1-6e4473efcd9b";
const GT_IN_A: &str = "f7ab1ebe-0869-4738-ac23-6eecb41072ff";
const GT_IN_B: &str = "d65dde8e-6785-41ed-b2db-7f2a11ad3afa";
const GT_OUT: &str = "499023d0-81e8-4eaf-b424-0f8230efa876";

pub fn greater_than_description() -> ProcessInterfaceDescription {
    let number = |id: &str, name: &str| InportDescription::new(id, name, &[ParamType::Number], ResponsePolicy::Never);
    ProcessInterfaceDescription::new(GREATER_THAN_ID, "Test Greater Than")
        .with_inport(number(GT_IN_A, "In-A"))
        .with_inport(number(GT_IN_B, "In-B"))
        .with_outport(OutportDescription::new(GT_OUT, "A > B", &[ParamType::Boolean], None))
}

/// Emits `A > B` when both inputs are numbers.
pub struct TestGreaterThan;

impl ElementKind for TestGreaterThan {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let a = core.take_input(GT_IN_A, sink).and_then(|a| a.number_value());
        let b = core.take_input(GT_IN_B, sink).and_then(|b| b.number_value());
        if let (Some(a), Some(b)) = (a, b) {
            core.emit(GT_OUT, GraphParam::boolean(a > b), sink);
        }
    }
}

pub const SAME_UNIT_ID: &str = "752583fd-bc36-4604-9d5f-a276e9974c46";
const SU_IN_A: &str = "92f778c4-4004-4c27-999a-b5964eee5911";
const SU_IN_B: &str = "58e3d41f-49f5-413c-a0c6-4a1a960d6f81";
const SU_OUT: &str = "46271475-2356-45b9-b32a-317130f733e9";
const SU_TMPL: &str = "a1c3068b-d519-4b50-bffb-11e77c227596";
const SU_TMPL_IN: &str = "2da68923-81de-49f2-9e75-5936420135ab";

pub fn same_unit_description() -> ProcessInterfaceDescription {
    let input = |id: &str, name: &str| InportDescription::new(id, name, &[], ResponsePolicy::Never);
    ProcessInterfaceDescription::new(SAME_UNIT_ID, "Test Same Unit")
        .with_inport(input(SU_IN_A, "In-A"))
        .with_inport(input(SU_IN_B, "In-B"))
        .with_outport(OutportDescription::new(SU_OUT, "Out", &[ParamType::Boolean], None))
        .with_template(PortTemplate::new(SU_TMPL, "In-X").with_inport(input(SU_TMPL_IN, "In-X")))
}

/// Always emits a boolean: whether every connected input carries the
/// unit of In-A.
pub struct TestSameUnit;

impl ElementKind for TestSameUnit {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let a = core.take_input(SU_IN_A, sink);
        let mut others = vec![core.take_input(SU_IN_B, sink)];
        others.extend(core.take_template_inputs(SU_TMPL_IN, sink));

        let unit = a.as_ref().and_then(GraphParam::unit);
        let same = others.iter().flatten().all(|o| o.unit() == unit);
        core.emit(SU_OUT, GraphParam::boolean(same), sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::testing::{run_element, Harness};
    use rstest::rstest;

    #[rstest]
    #[case(GraphParam::boolean(true), Some(false))]
    #[case(GraphParam::boolean(false), Some(true))]
    #[case(GraphParam::number(1.0, None), None)]
    fn test_not(#[case] input: GraphParam, #[case] expected: Option<bool>) {
        let mut h = Harness::new(NOT_ID).input(NOT_IN, input);
        assert_eq!(run_element(&mut h, NOT_OUT).and_then(|l| l.as_bool()), expected);
    }

    #[rstest]
    #[case(3.0, 2.0, Some(true))]
    #[case(2.0, 2.0, Some(false))]
    fn test_greater_than(#[case] a: f64, #[case] b: f64, #[case] expected: Option<bool>) {
        let mut h = Harness::new(GREATER_THAN_ID)
            .input(GT_IN_A, GraphParam::number(a, None))
            .input(GT_IN_B, GraphParam::dist_number(b, None, Some(1.0)));
        assert_eq!(run_element(&mut h, GT_OUT).and_then(|l| l.as_bool()), expected);
    }

    #[test]
    fn test_greater_than_needs_numbers() {
        let mut h = Harness::new(GREATER_THAN_ID)
            .input(GT_IN_A, GraphParam::number(1.0, None))
            .input(GT_IN_B, GraphParam::string("x"));
        assert!(run_element(&mut h, GT_OUT).is_none());
    }

    #[rstest]
    #[case(Some("tps"), Some("tps"), Some("tps"), true)]
    #[case(Some("tps"), Some("tps"), Some("rps"), false)]
    #[case(None, None, None, true)]
    fn test_same_unit(#[case] a: Option<&str>, #[case] b: Option<&str>, #[case] x: Option<&str>, #[case] expected: bool) {
        let mut h = Harness::new(SAME_UNIT_ID)
            .input(SU_IN_A, GraphParam::number(1.0, a))
            .input(SU_IN_B, GraphParam::number(1.0, b))
            .template_input(SU_TMPL, SU_TMPL_IN, GraphParam::number(1.0, x));
        assert_eq!(run_element(&mut h, SU_OUT).and_then(|l| l.as_bool()), Some(expected));
    }
}
