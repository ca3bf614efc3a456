//! arith.rs
//! Numeric elements: sum, product, extremes and rounded division.

use super::description::{PortTemplate, ProcessInterfaceDescription};
use super::element::{ElementCore, ElementKind};
use crate::graph::description::{InportDescription, OutportDescription, ResponsePolicy};
use crate::param::load_ops::{add_aspects, scale_breakdown, scale_breakdowns};
use crate::param::math_ops::{add, max, min, multiply};
use crate::param::{Aspect, GraphParam, ParamError, ParamType};
use crate::simulation::env::SampleSink;
use tracing::debug;

const NUMBER: &[ParamType] = &[ParamType::Number];

fn number_in(id: &str, name: &str) -> InportDescription {
    InportDescription::new(id, name, NUMBER, ResponsePolicy::Passthrough)
}

fn number_out(id: &str, name: &str) -> OutportDescription {
    OutportDescription::new(id, name, NUMBER, None)
}

/// Two fixed number inports, one outport and a template adding more inports.
fn binary_description(ids: [&str; 6], name: &str, template_name: &str, template_text: &str) -> ProcessInterfaceDescription {
    let [id, in_a, in_b, out, template, template_in] = ids;
    ProcessInterfaceDescription::new(id, name)
        .with_inport(number_in(in_a, "In-A"))
        .with_inport(number_in(in_b, "In-B"))
        .with_outport(number_out(out, "Out"))
        .with_template(
            PortTemplate { description: Some(template_text.to_string()), ..PortTemplate::new(template, template_name) }
                .with_inport(number_in(template_in, template_name)),
        )
}

/// Loads of the two fixed inports followed by the template instances.
fn collect_inputs(core: &mut ElementCore, in_a: &str, in_b: &str, template_in: &str, sink: &mut dyn SampleSink) -> Vec<Option<GraphParam>> {
    let mut loads = vec![core.take_input(in_a, sink), core.take_input(in_b, sink)];
    loads.extend(core.take_template_inputs(template_in, sink));
    loads
}

pub const SUM_ID: &str = "bd96eec1-483b-44fe-a07b-11bb9141f02f";
const SUM_IN_A: &str = "f37c3cf8-881d-46ba-8715-de76904365c5";
const SUM_IN_B: &str = "e4b97aaa-bd31-421a-9948-c30ac1a396c1";
const SUM_OUT: &str = "8f4c41e4-f501-4374-a34c-62744996349a";
const SUM_TMPL: &str = "8be3030f-50b1-4a5a-9a51-417d205974bb";
const SUM_TMPL_IN: &str = "ca210892-da31-4066-8657-55786ffb3642";

pub fn sum_description() -> ProcessInterfaceDescription {
    binary_description([SUM_ID, SUM_IN_A, SUM_IN_B, SUM_OUT, SUM_TMPL, SUM_TMPL_IN], "Sum", "Summand", "Add an additional summand inport.")
}

/// Adds all inputs; the unit follows the first operand.
pub struct Sum;

impl ElementKind for Sum {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let a = core.take_input(SUM_IN_A, sink);
        let b = core.take_input(SUM_IN_B, sink);
        let summands = core.take_template_inputs(SUM_TMPL_IN, sink);

        let result = add(a.as_ref(), b.as_ref()).and_then(|first| {
            summands.iter().flatten().try_fold(first, |sum, summand| add(Some(&sum), Some(summand)))
        });
        match result {
            Ok(mut sum) => {
                if let (Some(unit), Some(n)) = (a.as_ref().and_then(|a| a.unit()), sum.as_number_mut()) {
                    n.unit = Some(unit.to_string());
                }
                core.emit(SUM_OUT, sum, sink);
            }
            Err(e) => debug!(element = %core.label, error = %e, "failed to calculate sum"),
        }
    }
}

pub const MULTIPLY_ID: &str = "59b677a7-ac5d-40cf-acd5-16a97db17719";
const MULT_IN_A: &str = "92665c3d-9dde-471d-9413-8e59ca17f383";
const MULT_IN_B: &str = "2863c566-fe47-47bb-99ef-76a5939c7e96";
const MULT_OUT: &str = "b1a554bd-1572-4e8e-ba8f-1a1fa519be72";
const MULT_OUT_CUSTOM_UNIT: &str = "cac91c55-68d9-4859-bb5b-151717572bec";
const MULT_TMPL: &str = "772e3300-5e8f-4cce-a5d9-95116d591d48";
const MULT_TMPL_IN: &str = "72e1614c-8075-42a6-a407-37b08b5e691d";

pub fn multiply_description() -> ProcessInterfaceDescription {
    binary_description(
        [MULTIPLY_ID, MULT_IN_A, MULT_IN_B, MULT_OUT, MULT_TMPL, MULT_TMPL_IN],
        "Multiply",
        "Multiplicand",
        "Add an additional multiplicand inport.",
    )
    .with_outport(number_out(MULT_OUT_CUSTOM_UNIT, "Out (Custom Unit)").with_config(ParamType::String))
}

/// Product of all inputs. The custom unit outport, when instantiated,
/// carries the same product with the unit from its port config.
pub struct Multiply;

impl Multiply {
    fn product(a: Option<&GraphParam>, b: Option<&GraphParam>, rest: &[Option<GraphParam>]) -> Result<GraphParam, ParamError> {
        let (Some(a), Some(b)) = (a, b) else {
            return Err(ParamError::EmptyInput);
        };
        rest.iter()
            .flatten()
            .filter(|m| m.is_number())
            .try_fold(multiply(a, b)?, |product, m| multiply(&product, m))
    }
}

impl ElementKind for Multiply {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let a = core.take_input(MULT_IN_A, sink);
        let b = core.take_input(MULT_IN_B, sink);
        let multiplicands = core.take_template_inputs(MULT_TMPL_IN, sink);

        let product = match Self::product(a.as_ref(), b.as_ref(), &multiplicands) {
            Ok(product) => product,
            Err(e) => {
                debug!(element = %core.label, error = %e, "failed to calculate product");
                return;
            }
        };
        core.emit(MULT_OUT, product.clone(), sink);

        if let Some(custom) = core.outport(MULT_OUT_CUSTOM_UNIT) {
            let unit = custom.config().and_then(|c| c.as_str()).map(str::to_string);
            let mut product = product;
            if let Some(n) = product.as_number_mut() {
                n.unit = unit;
            }
            core.emit(MULT_OUT_CUSTOM_UNIT, product, sink);
        }
    }
}

pub const MAX_ID: &str = "afe75ba2-2530-4fa7-82e6-a2e0bdc3f5d6";
const MAX_IN_A: &str = "cfad3400-064a-47eb-a18b-2e325161e43b";
const MAX_IN_B: &str = "62fecc4a-042c-4043-b8f5-82e2c7dd06df";
const MAX_OUT: &str = "66622dbf-0d69-4a02-8954-0cbbf418eb72";
const MAX_TMPL: &str = "71249ab1-e530-48b3-9073-69f0d5256312";
const MAX_TMPL_IN: &str = "49400269-2a72-4e30-9455-3ef3d8fd8072";

pub fn max_description() -> ProcessInterfaceDescription {
    binary_description(
        [MAX_ID, MAX_IN_A, MAX_IN_B, MAX_OUT, MAX_TMPL, MAX_TMPL_IN],
        "Max",
        "In-X",
        "Add an additional inport for the comparison.",
    )
}

fn numbers(loads: Vec<Option<GraphParam>>) -> Vec<GraphParam> {
    loads.into_iter().flatten().filter(GraphParam::is_number).collect()
}

pub struct Max;

impl ElementKind for Max {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let loads = numbers(collect_inputs(core, MAX_IN_A, MAX_IN_B, MAX_TMPL_IN, sink));
        match max(&loads) {
            Ok(result) => core.emit(MAX_OUT, result, sink),
            Err(e) => debug!(element = %core.label, error = %e, "failed to get max"),
        }
    }
}

pub const MIN_ID: &str = "4642ea8a-1c77-4b08-96a8-73eb8d204ae2";
const MIN_IN_A: &str = "3e2b3e71-b36e-4a28-9264-4d1d833f3a71";
const MIN_IN_B: &str = "66717e9c-44ef-47f2-8a53-7d7494af501b";
const MIN_OUT: &str = "bc2f6b1f-3a3f-43c7-8dc1-4755e562362f";
const MIN_TMPL: &str = "27149017-e3fc-42f1-93c5-a8766dbe344d";
const MIN_TMPL_IN: &str = "56d36a1f-b98d-4336-a1a0-1c2c6fd9fc61";

pub fn min_description() -> ProcessInterfaceDescription {
    binary_description(
        [MIN_ID, MIN_IN_A, MIN_IN_B, MIN_OUT, MIN_TMPL, MIN_TMPL_IN],
        "Min",
        "In-X",
        "Add an additional inport for the comparison.",
    )
}

pub struct Min;

impl ElementKind for Min {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let loads = numbers(collect_inputs(core, MIN_IN_A, MIN_IN_B, MIN_TMPL_IN, sink));
        match min(&loads) {
            Ok(result) => core.emit(MIN_OUT, result, sink),
            Err(e) => debug!(element = %core.label, error = %e, "failed to get min"),
        }
    }
}

pub const MAX_WEIGHTED_ID: &str = "f7bc3e3e-7719-4662-93ba-fbc7f79481e1";
const MAXW_IN_A: &str = "98af41f8-7cd6-4f98-8e2c-97acdce1db82";
const MAXW_IN_B: &str = "f87575d3-303f-40df-9d01-02fad14ec285";
const MAXW_OUT: &str = "380b54db-2e52-4292-8c67-c372113b9100";
const MAXW_TMPL: &str = "dc352282-694b-41c9-a066-57e1c9d0a77d";
const MAXW_TMPL_IN: &str = "e590105a-1e30-403e-be01-9f64b16de156";

pub fn max_weighted_description() -> ProcessInterfaceDescription {
    binary_description(
        [MAX_WEIGHTED_ID, MAXW_IN_A, MAXW_IN_B, MAXW_OUT, MAXW_TMPL, MAXW_TMPL_IN],
        "Max (Weighted)",
        "In-X",
        "Add an additional inport for the comparison.",
    )
}

/// Max whose winner carries the breakdowns of every input, rescaled to
/// the winning value.
pub struct MaxWeighted;

impl ElementKind for MaxWeighted {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let loads = numbers(collect_inputs(core, MAXW_IN_A, MAXW_IN_B, MAXW_TMPL_IN, sink));
        let result = match max(&loads) {
            Ok(result) => result,
            Err(e) => {
                debug!(element = %core.label, error = %e, "failed to get max");
                return;
            }
        };

        let mut value = 0.0;
        let mut aspects: Vec<Aspect> = Vec::new();
        for load in loads.iter().filter(|l| l.is_aspect_number()) {
            if let Some(n) = load.as_number() {
                aspects = add_aspects(value, &aspects, n.value, &n.aspects);
                value += n.value;
            }
        }
        if value == 0.0 && aspects.is_empty() {
            core.emit(MAXW_OUT, result, sink);
            return;
        }
        let mut winner = result.to_aspect_number().unwrap_or_default();
        winner.aspects = scale_breakdowns(winner.value, &aspects);
        core.emit(MAXW_OUT, GraphParam::AspectNumber(winner), sink);
    }
}

pub const DIVIDE_ROUNDUP_ID: &str = "26ec17f3-cce9-4854-a139-49d65ed6dc0e";
const DIV_IN_NUMERATOR: &str = "6634faf4-9d9f-4ec8-be06-fa1e65ce05ff";
const DIV_IN_DIVISOR: &str = "81332654-3a4a-4b79-b7ee-a86e7b568b1a";
const DIV_OUT: &str = "3c175cbd-2dd4-4ef6-8e31-bddb90e1f61c";
const DIV_TMPL: &str = "26e6f598-b27e-4f10-80e2-43e5e6964bb5";
const DIV_TMPL_IN: &str = "7dae1a52-193e-40cd-b1d1-686bcace8bbe";

pub fn divide_roundup_description() -> ProcessInterfaceDescription {
    ProcessInterfaceDescription::new(DIVIDE_ROUNDUP_ID, "Divide and Round Up")
        .with_inport(number_in(DIV_IN_NUMERATOR, "Numerator"))
        .with_inport(number_in(DIV_IN_DIVISOR, "Divisor"))
        .with_outport(number_out(DIV_OUT, "Out"))
        .with_template(
            PortTemplate::new(DIV_TMPL, "Divisor Multiplier").with_inport(number_in(DIV_TMPL_IN, "Divisor Multiplier")),
        )
}

/// `ceil(numerator / (divisor * multipliers...))`; zero multipliers are
/// skipped, a zero divisor yields nothing.
pub struct DivideRoundup;

impl ElementKind for DivideRoundup {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let numerator = core.take_input(DIV_IN_NUMERATOR, sink);
        let divisor = core.take_input(DIV_IN_DIVISOR, sink);
        let multipliers = core.take_template_inputs(DIV_TMPL_IN, sink);

        let (Some(numerator), Some(divisor)) = (numerator, divisor.as_ref().and_then(|d| d.number_value())) else {
            return;
        };
        if divisor == 0.0 || !numerator.is_number() {
            return;
        }
        let div = multipliers
            .iter()
            .flatten()
            .filter_map(|m| m.number_value())
            .filter(|v| *v != 0.0)
            .fold(divisor, |acc, v| acc * v);

        let is_aspect_number = numerator.is_aspect_number();
        let mut result = numerator;
        if let Some(n) = result.as_number_mut() {
            n.value = (n.value / div).ceil();
            if is_aspect_number {
                n.aspects = n.aspects.iter().map(|a| scale_breakdown(n.value, a)).collect();
            }
        }
        core.emit(DIV_OUT, result, sink);
    }
}
