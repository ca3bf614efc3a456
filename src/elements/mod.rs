//! Processing elements: the built-in building blocks of graph models.
pub mod arith;
pub mod aspect;
pub mod catalog;
pub mod description;
pub mod element;
pub mod flow;
pub mod latency;
pub mod logic;
pub mod signal;
pub mod unit;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{build_element, catalog, description};
pub use description::{PortTemplate, ProcessInterfaceDescription};
pub use element::{ElementCore, ElementKind, ProcessingElement};
