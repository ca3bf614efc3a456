//! unit.rs
//! Elements relabelling the unit of a number.

use super::description::ProcessInterfaceDescription;
use super::element::{ElementCore, ElementKind};
use crate::graph::description::{InportDescription, OutportDescription, ResponsePolicy};
use crate::param::{GraphParam, ParamType};
use crate::simulation::env::SampleSink;

pub const SET_UNIT_ID: &str = "bf195969-ca1a-4924-91ce-57fbe6da371f";
const SET_IN_LOAD: &str = "df042fe4-b146-4725-ae1c-d4f6c5a4dc6f";
const SET_IN_UNIT: &str = "19333fd7-278b-4e28-9d5d-c849f489fa58";
const SET_OUT: &str = "0cf3bb07-bd23-4aab-b65d-6912105cb463";

pub fn set_unit_description() -> ProcessInterfaceDescription {
    ProcessInterfaceDescription::new(SET_UNIT_ID, "Set Unit")
        .with_inport(InportDescription::new(SET_IN_LOAD, "Load", &[ParamType::Number], ResponsePolicy::Passthrough))
        .with_inport(InportDescription::new(SET_IN_UNIT, "Unit", &[ParamType::String], ResponsePolicy::Never))
        .with_outport(OutportDescription::new(SET_OUT, "Out", &[ParamType::Number], None))
}

/// Forwards the load; numbers take the unit given as string.
pub struct SetUnit;

impl ElementKind for SetUnit {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let load = core.take_input(SET_IN_LOAD, sink);
        let unit = core.take_input(SET_IN_UNIT, sink);
        let Some(mut load) = load else { return };
        if let (Some(unit), Some(n)) = (unit.as_ref().and_then(GraphParam::as_str), load.as_number_mut()) {
            n.unit = Some(unit.to_string());
        }
        core.emit(SET_OUT, load, sink);
    }
}

pub const REMOVE_UNIT_ID: &str = "bdc9e038-2d18-40a4-ae71-4a707e1f08c7";
const RMU_IN: &str = "30f50f34-e265-4add-98d8-0142be665d9d";
const RMU_OUT: &str = "68b7b805-1e9f-438c-be73-29b9a1dc88fb";

pub fn remove_unit_description() -> ProcessInterfaceDescription {
    ProcessInterfaceDescription::new(REMOVE_UNIT_ID, "Remove Unit")
        .with_inport(InportDescription::new(RMU_IN, "In", &[ParamType::Number], ResponsePolicy::Passthrough))
        .with_outport(OutportDescription::new(RMU_OUT, "Out", &[ParamType::Number], None))
}

pub struct RemoveUnit;

impl ElementKind for RemoveUnit {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let Some(mut load) = core.take_input(RMU_IN, sink) else { return };
        if let Some(n) = load.as_number_mut() {
            n.unit = None;
        }
        core.emit(RMU_OUT, load, sink);
    }
}
