//! Error types for parsing and evaluating expressions.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("failed to parse expression")]
    Parse { detail: String },
    #[error("missing reference for identifier")]
    MissingReference,
    #[error("expression uses unavailable subexpressions")]
    Unavailable,
    #[error("expression uses unbound subexpressions")]
    Unbound,
    #[error("identifier value is missing")]
    MissingValue,
    #[error("can't resolve d() expression without values")]
    MissingScope,
    #[error("no value found for identifier")]
    NoValue,
    #[error("literal not a number")]
    NotANumber,
    #[error("unresolvable expression")]
    Unresolvable,
}

impl ExpressionError {
    pub(crate) fn parse(detail: impl Into<String>) -> Self {
        Self::Parse { detail: detail.into() }
    }
}
