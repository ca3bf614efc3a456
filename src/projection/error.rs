use crate::expression::ExpressionError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("no valid date range given. expecting 2018-01, 2018-09")]
    Range,
    #[error("could not determine render order")]
    Dependency,
    #[error("time segment method {method} does not fit variable type {variable_type}")]
    TypeMismatch { method: String, variable_type: String },
    #[error(transparent)]
    Expression(#[from] ExpressionError),
}
