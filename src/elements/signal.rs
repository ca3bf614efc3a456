//! signal.rs
//! Elements raising messages or reading the simulation clock.

use super::description::ProcessInterfaceDescription;
use super::element::{ElementCore, ElementKind};
use crate::graph::description::{InportDescription, OutportDescription, ResponsePolicy};
use crate::param::{GraphParam, MessageParam, ParamType};
use crate::projection::month::days_in_month;
use crate::simulation::env::SampleSink;
use tracing::debug;

pub const WARNING_ID: &str = "e3cc50a9-795c-4a47-8643-6d0aee39b49c";
const WARN_IN_TRIGGER: &str = "a3cbcc81-fb06-4bd2-87cd-31c6665de9ce";

pub const ERROR_ID: &str = "41c22bcb-f966-406a-8814-a7b8e187b508";
const ERR_IN_TRIGGER: &str = "694dacf2-7a7c-4bbb-89eb-6bb3a7461677";

fn trigger_description(id: &str, name: &str, trigger: &str, hint: &str) -> ProcessInterfaceDescription {
    ProcessInterfaceDescription::new(id, name)
        .with_description("Raises a message named after the element whenever a load other than false arrives.")
        .with_inport(InportDescription::new(trigger, "Trigger", &[], ResponsePolicy::Never))
        .with_hint(hint)
}

pub fn warning_description() -> ProcessInterfaceDescription {
    trigger_description(WARNING_ID, "Warning", WARN_IN_TRIGGER, "WARNING")
}

pub fn error_description() -> ProcessInterfaceDescription {
    trigger_description(ERROR_ID, "Error", ERR_IN_TRIGGER, "ERROR")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Records a message sample per step: the element label when triggered,
/// a blank one otherwise, so rates can be computed over all runs.
pub struct Trigger {
    severity: Severity,
    triggered: bool,
}

impl Trigger {
    pub fn new(severity: Severity) -> Self {
        Self { severity, triggered: false }
    }

    fn message(&self, name: &str, blank: bool) -> GraphParam {
        let message = MessageParam { name: name.to_string(), blank };
        match self.severity {
            Severity::Warning => GraphParam::Warning(message),
            Severity::Error => GraphParam::Error(message),
        }
    }
}

impl ElementKind for Trigger {
    fn reset(&mut self) {
        self.triggered = false;
    }

    fn accept_load(&mut self, core: &mut ElementCore, load: &GraphParam, sink: &mut dyn SampleSink) -> bool {
        if load.as_bool() != Some(false) && !self.triggered {
            debug!(element = %core.label, severity = ?self.severity, "triggered");
            sink.store_raw_data(&core.sim_id, &self.message(&core.label, false));
            self.triggered = true;
        }
        true
    }

    fn accepts_responses(&self) -> bool {
        false
    }

    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        if !self.triggered {
            sink.store_raw_data(&core.sim_id, &self.message(&core.label, true));
        }
    }

    fn process_response(&mut self, _core: &mut ElementCore, _sink: &mut dyn SampleSink) {}
}

pub const SIMULATION_DATE_ID: &str = "595fddc9-5684-4a4a-a71e-14ed9885b995";
const DATE_OUT_YEAR: &str = "5b9b238a-fbbb-44c0-b31e-e8e1cff8cb3d";
const DATE_OUT_MONTH: &str = "ba5ff363-0e26-49fc-9322-5674ee95728d";

pub fn simulation_date_description() -> ProcessInterfaceDescription {
    ProcessInterfaceDescription::new(SIMULATION_DATE_ID, "Simulation Date")
        .with_outport(OutportDescription::new(DATE_OUT_YEAR, "Year", &[ParamType::Number], Some("Y")))
        .with_outport(OutportDescription::new(DATE_OUT_MONTH, "Months", &[ParamType::Number], Some("M")))
}

/// Year and month of the current step.
pub struct SimulationDate;

impl ElementKind for SimulationDate {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let date = sink.step().date.clone();
        let year = date.get(..4).and_then(|y| y.parse::<f64>().ok());
        let month = date.get(5..).and_then(|m| m.parse::<f64>().ok());
        if let (Some(year), Some(month)) = (year, month) {
            core.emit(DATE_OUT_YEAR, GraphParam::number(year, Some("Y")), sink);
            core.emit(DATE_OUT_MONTH, GraphParam::number(month, Some("M")), sink);
        }
    }
}

pub const SIMULATION_INTERVAL_ID: &str = "498a73a6-a046-43bf-9f59-3847daa52296";
const INTERVAL_OUT_DAYS: &str = "c4983ca6-322f-4a8d-9ddf-6bd80aad9ee7";
const INTERVAL_OUT_HOURS: &str = "5e883248-3547-48fa-98df-9e04c513d23a";
const INTERVAL_OUT_MINUTES: &str = "c40b53e7-e5f5-47f6-896e-dd90c09277d4";
const INTERVAL_OUT_SECONDS: &str = "3c254e49-6910-454a-bc28-ba7338716ed0";

pub fn simulation_interval_description() -> ProcessInterfaceDescription {
    let out = |id: &str, name: &str, unit: &str| OutportDescription::new(id, name, &[ParamType::Number], Some(unit));
    ProcessInterfaceDescription::new(SIMULATION_INTERVAL_ID, "Simulation Interval")
        .with_description("Length of the simulated month.")
        .with_outport(out(INTERVAL_OUT_DAYS, "Days", "d"))
        .with_outport(out(INTERVAL_OUT_HOURS, "Hours", "h"))
        .with_outport(out(INTERVAL_OUT_MINUTES, "Minutes", "m"))
        .with_outport(out(INTERVAL_OUT_SECONDS, "Seconds", "s"))
}

pub struct SimulationInterval;

impl ElementKind for SimulationInterval {
    fn process(&mut self, core: &mut ElementCore, sink: &mut dyn SampleSink) {
        let Some(days) = days_in_month(&sink.step().date) else {
            debug!(element = %core.label, date = %sink.step().date, "not a month");
            return;
        };
        let days = f64::from(days);
        core.emit(INTERVAL_OUT_DAYS, GraphParam::number(days, Some("d")), sink);
        core.emit(INTERVAL_OUT_HOURS, GraphParam::number(days * 24.0, Some("h")), sink);
        core.emit(INTERVAL_OUT_MINUTES, GraphParam::number(days * 1440.0, Some("m")), sink);
        core.emit(INTERVAL_OUT_SECONDS, GraphParam::number(days * 86400.0, Some("s")), sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::testing::Harness;
    use rstest::rstest;

    fn samples(h: &mut Harness) -> Vec<GraphParam> {
        let id = h.element().core().sim_id.clone();
        h.ctx.registry.get(&id).unwrap().raw_data.iter().map(|e| e.data.clone()).collect()
    }

    #[rstest]
    #[case(Some(GraphParam::boolean(true)), false)]
    #[case(Some(GraphParam::number(0.0, None)), false)]
    #[case(Some(GraphParam::boolean(false)), true)]
    #[case(None, true)]
    fn test_warning_trigger(#[case] trigger: Option<GraphParam>, #[case] blank: bool) {
        let mut h = Harness::new(WARNING_ID);
        if let Some(trigger) = trigger {
            h = h.input(WARN_IN_TRIGGER, trigger.clone()).input(WARN_IN_TRIGGER, trigger);
        }
        h.run();
        let samples = samples(&mut h);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0], GraphParam::Warning(MessageParam { name: "Warning".into(), blank }));
    }

    #[test]
    fn test_error_trigger_resets_per_step() {
        let mut h = Harness::new(ERROR_ID).input(ERR_IN_TRIGGER, GraphParam::boolean(true));
        h.run();
        h.run();
        let samples = samples(&mut h);
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| matches!(s, GraphParam::Error(m) if !m.blank)));
    }

    #[test]
    fn test_simulation_date() {
        let mut h = Harness::new(SIMULATION_DATE_ID);
        h.run();
        assert_eq!(h.load(DATE_OUT_YEAR), Some(GraphParam::number(2024.0, Some("Y"))));
        assert_eq!(h.load(DATE_OUT_MONTH), Some(GraphParam::number(1.0, Some("M"))));
    }

    #[test]
    fn test_simulation_interval() {
        let mut h = Harness::new(SIMULATION_INTERVAL_ID);
        h.ctx.enter_step("scenario", "2024-02", None);
        h.run();
        assert_eq!(h.load(INTERVAL_OUT_DAYS).and_then(|l| l.number_value()), Some(29.0));
        assert_eq!(h.load(INTERVAL_OUT_SECONDS).and_then(|l| l.number_value()), Some(29.0 * 86400.0));
    }
}
