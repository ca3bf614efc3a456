//! Capacity planning core: forecast projection and Monte Carlo simulation
//! of graph models.
//!
//! The crate is organized bottom-up:
//! - `expression` and `projection` turn forecast sheets into monthly frames.
//! - `param` holds the values flowing through a graph and their algebra.
//! - `graph` and `elements` build and execute graph models.
//! - `simulation` drives a configuration run; `aggregation` condenses its
//!   samples into reports held by `store` nodes.

pub mod aggregation;
pub mod elements;
pub mod expression;
pub mod graph;
pub mod param;
pub mod projection;
pub mod simulation;
pub mod store;

pub use simulation::{
    EngineOptions, Harness, SimulationConfiguration, SimulationError, SimulationResult, SimulationScenario,
    SimulationState,
};
