//! catalog.rs
//! The built-in processing elements, addressed by description id.

use super::arith::*;
use super::aspect::*;
use super::description::ProcessInterfaceDescription;
use super::element::{ElementKind, ProcessingElement};
use super::flow::*;
use super::latency::*;
use super::logic::*;
use super::signal::*;
use super::unit::*;
use crate::graph::description::Process;
use crate::simulation::SimulationError;
use tracing::warn;

/// Descriptions of every element, in catalog order.
pub fn catalog() -> Vec<ProcessInterfaceDescription> {
    vec![
        sum_description(),
        multiply_description(),
        max_description(),
        min_description(),
        max_weighted_description(),
        divide_roundup_description(),
        parallel_description(),
        serial_description(),
        conditional_description(),
        not_description(),
        greater_than_description(),
        same_unit_description(),
        add_latency_description(),
        add_hop_description(),
        remove_response_description(),
        split_by_aspect_description(),
        add_aspect_description(),
        replace_aspect_description(),
        remove_aspect_description(),
        extract_breakdown_description(),
        set_unit_description(),
        remove_unit_description(),
        warning_description(),
        error_description(),
        simulation_date_description(),
        simulation_interval_description(),
    ]
}

pub fn description(id: &str) -> Option<ProcessInterfaceDescription> {
    catalog().into_iter().find(|d| d.object_id == id)
}

fn kind(id: &str) -> Option<Box<dyn ElementKind>> {
    let kind: Box<dyn ElementKind> = match id {
        SUM_ID => Box::new(Sum),
        MULTIPLY_ID => Box::new(Multiply),
        MAX_ID => Box::new(Max),
        MIN_ID => Box::new(Min),
        MAX_WEIGHTED_ID => Box::new(MaxWeighted),
        DIVIDE_ROUNDUP_ID => Box::new(DivideRoundup),
        PARALLEL_ID => Box::new(Parallel),
        SERIAL_ID => Box::new(Serial),
        CONDITIONAL_ID => Box::new(Conditional),
        NOT_ID => Box::new(Not),
        GREATER_THAN_ID => Box::new(TestGreaterThan),
        SAME_UNIT_ID => Box::new(TestSameUnit),
        ADD_LATENCY_ID => Box::new(AddLatency),
        ADD_HOP_ID => Box::new(AddHop),
        REMOVE_RESPONSE_ID => Box::new(RemoveResponse),
        SPLIT_BY_ASPECT_ID => Box::<SplitByAspect>::default(),
        ADD_ASPECT_ID => Box::new(AddAspect),
        REPLACE_ASPECT_ID => Box::new(ReplaceAspect),
        REMOVE_ASPECT_ID => Box::new(RemoveAspect),
        EXTRACT_BREAKDOWN_ID => Box::new(ExtractBreakdown),
        SET_UNIT_ID => Box::new(SetUnit),
        REMOVE_UNIT_ID => Box::new(RemoveUnit),
        WARNING_ID => Box::new(Trigger::new(Severity::Warning)),
        ERROR_ID => Box::new(Trigger::new(Severity::Error)),
        SIMULATION_DATE_ID => Box::new(SimulationDate),
        SIMULATION_INTERVAL_ID => Box::new(SimulationInterval),
        _ => return None,
    };
    Some(kind)
}

/// Builds the element a process refers to. Ports are created on init.
pub fn build_element(process: &Process, parent_path: &[String]) -> Result<ProcessingElement, SimulationError> {
    match (description(&process.reference), kind(&process.reference)) {
        (Some(description), Some(kind)) => Ok(ProcessingElement::new(process.clone(), description, kind, parent_path)),
        _ => {
            warn!(reference = %process.reference, "unknown processing element");
            Err(SimulationError::InitFailed(format!("unknown processing element '{}'", process.reference)))
        }
    }
}
