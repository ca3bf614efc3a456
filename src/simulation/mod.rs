//! Running a simulation configuration: fetching models and forecast
//! sheets, resolving scenario inputs and driving the root graph model
//! through the mean and Monte Carlo passes.
pub mod config;
pub mod env;
pub mod error;
pub mod fetch;
pub mod harness;
pub mod inputs;
pub mod montecarlo;

pub use config::{EngineOptions, ForecastSheetRef, ForecastVarRef, ScenarioInput, SimulationConfiguration, SimulationScenario};
pub use env::{NodeRegistry, ProcessFactory, RunContext, SampleSink};
pub use error::SimulationError;
pub use fetch::{ForecastSource, ModelLibrary, ModelSource, SheetLibrary, SourceError};
pub use harness::{ErrorDetails, Harness, SimulationResult, SimulationState};
