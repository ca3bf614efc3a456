//! Restricted arithmetic expressions over referenced variables.
//!
//! Identifiers are bound to stable references (variable ids) when an
//! expression is built, so the serialized form survives variable renames.
pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;

pub use ast::{IdentifierValues, Node, ScopedIdentifierValues, DISTRIBUTION_SCOPE};
pub use error::ExpressionError;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier name -> stable reference.
pub type IdentifierReferences = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    ast: Node,
}

impl Expression {
    /// Parses `text` and binds every identifier through `refs`.
    pub fn parse(text: &str, refs: &IdentifierReferences) -> Result<Self, ExpressionError> {
        let node = parser::parse(text)?;
        Self::create(node, refs)
    }

    /// Validates an already parsed tree and attaches references.
    pub fn create(mut node: Node, refs: &IdentifierReferences) -> Result<Self, ExpressionError> {
        let mut missing = false;
        node.for_each_identifier(&mut |name, _| {
            if !refs.get(name).map_or(false, |r| !r.is_empty()) {
                missing = true;
            }
        });
        if missing {
            return Err(ExpressionError::MissingReference);
        }
        if node.has_unavailable() {
            return Err(ExpressionError::Unavailable);
        }
        if node.has_unbound_unary() {
            return Err(ExpressionError::Unbound);
        }
        node.bind_identifiers(refs);
        Ok(Self { ast: node })
    }

    pub fn ast(&self) -> &Node {
        &self.ast
    }

    /// References needed to evaluate the expression, in source order.
    pub fn needed_refs(&self) -> Vec<String> {
        let mut refs = Vec::new();
        self.ast.for_each_identifier(&mut |_, reference| {
            if let Some(r) = reference {
                refs.push(r.to_string());
            }
        });
        refs
    }

    /// Name -> reference for every bound identifier.
    pub fn needed_refs_ext(&self) -> IdentifierReferences {
        let mut refs = IdentifierReferences::new();
        self.ast.for_each_identifier(&mut |name, reference| {
            if let Some(r) = reference {
                refs.insert(name.to_string(), r.to_string());
            }
        });
        refs
    }

    pub fn is_static(&self) -> bool {
        self.needed_refs().is_empty()
    }

    /// Evaluates the expression. Every identifier, including the argument of
    /// `d(..)`, must have a value in `values`.
    pub fn calculate(
        &self,
        values: &IdentifierValues,
        scoped: Option<&ScopedIdentifierValues>,
    ) -> Result<f64, ExpressionError> {
        let mut missing = false;
        self.ast.for_each_identifier(&mut |_, reference| {
            if reference.and_then(|r| values.get(r)).is_none() {
                missing = true;
            }
        });
        if missing {
            return Err(ExpressionError::MissingValue);
        }
        if self.ast.has_unavailable() {
            return Err(ExpressionError::Unavailable);
        }
        self.ast.resolve(values, scoped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn refs(pairs: &[(&str, &str)]) -> IdentifierReferences {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn values(pairs: &[(&str, f64)]) -> IdentifierValues {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[rstest]
    #[case("1 + 2 * 3", 7.0)]
    #[case("(1 + 2) * 3", 9.0)]
    #[case("10 % 4", 2.0)]
    #[case("-3 + +5", 2.0)]
    #[case("2 - -2", 4.0)]
    #[case("7 / 2", 3.5)]
    fn test_static_arithmetic(#[case] text: &str, #[case] expected: f64) {
        let e = Expression::parse(text, &IdentifierReferences::new()).unwrap();
        assert!(e.is_static());
        assert_eq!(e.calculate(&IdentifierValues::new(), None).unwrap(), expected);
    }

    #[test]
    fn test_division_by_zero_is_infinite() {
        let e = Expression::parse("1/0", &IdentifierReferences::new()).unwrap();
        assert_eq!(e.calculate(&IdentifierValues::new(), None).unwrap(), f64::INFINITY);
        let e = Expression::parse("-1/0", &IdentifierReferences::new()).unwrap();
        assert_eq!(e.calculate(&IdentifierValues::new(), None).unwrap(), f64::NEG_INFINITY);
    }

    #[rstest]
    #[case("a == b", "failed to parse expression")]
    #[case("a || b", "failed to parse expression")]
    #[case("!a", "failed to parse expression")]
    #[case("a ? a : b", "expression uses unavailable subexpressions")]
    #[case("a.b", "expression uses unavailable subexpressions")]
    #[case("[a, b]", "expression uses unavailable subexpressions")]
    #[case("max(a)", "missing reference for identifier")]
    #[case("d(a, b)", "expression uses unavailable subexpressions")]
    #[case("d(d(a))", "expression uses unavailable subexpressions")]
    #[case("c + 1", "missing reference for identifier")]
    #[case("true", "missing reference for identifier")]
    fn test_build_errors(#[case] text: &str, #[case] expected: &str) {
        let err = Expression::parse(text, &refs(&[("a", "id-a"), ("b", "id-b")])).unwrap_err();
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn test_references_survive_serialization() {
        let e = Expression::parse("users * rate", &refs(&[("users", "v1"), ("rate", "v2")])).unwrap();
        assert_eq!(e.needed_refs(), vec!["v1".to_string(), "v2".to_string()]);
        let json = serde_json::to_string(&e).unwrap();
        let back: Expression = serde_json::from_str(&json).unwrap();
        assert_eq!(back.calculate(&values(&[("v1", 10.0), ("v2", 0.5)]), None).unwrap(), 5.0);
    }

    #[test]
    fn test_missing_value() {
        let e = Expression::parse("a + b", &refs(&[("a", "id-a"), ("b", "id-b")])).unwrap();
        let err = e.calculate(&values(&[("id-a", 1.0)]), None).unwrap_err();
        assert_eq!(err, ExpressionError::MissingValue);
    }

    #[test]
    fn test_distribution_call() {
        let e = Expression::parse("d(a) * 2", &refs(&[("a", "id-a")])).unwrap();
        assert_eq!(e.needed_refs(), vec!["id-a".to_string()]);
        let main = values(&[("id-a", 100.0)]);

        assert_eq!(e.calculate(&main, None).unwrap_err(), ExpressionError::MissingScope);

        let mut scoped = ScopedIdentifierValues::new();
        scoped.insert(DISTRIBUTION_SCOPE.to_string(), IdentifierValues::new());
        assert_eq!(e.calculate(&main, Some(&scoped)).unwrap_err(), ExpressionError::NoValue);

        scoped.insert(DISTRIBUTION_SCOPE.to_string(), values(&[("id-a", 4.0)]));
        assert_eq!(e.calculate(&main, Some(&scoped)).unwrap(), 8.0);
    }

    #[test]
    fn test_unbound_unary_from_document() {
        let node = Node::Unary { operator: '-', argument: None };
        assert_eq!(
            Expression::create(node, &IdentifierReferences::new()).unwrap_err(),
            ExpressionError::Unbound
        );
    }
}
