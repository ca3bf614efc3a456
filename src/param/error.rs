//! error.rs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("null input")]
    EmptyInput,
    #[error("can only {op} numbers")]
    NotANumber { op: &'static str },
    #[error("invalid {distribution} distribution parameters")]
    InvalidDistribution { distribution: &'static str },
}
