//! Syntax tree for parsed expressions and its evaluator.
//!
//! The tree keeps constructs the evaluator refuses (arrays, conditionals,
//! member access, ...) so that validation can report them precisely.

use super::error::ExpressionError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier reference -> value.
pub type IdentifierValues = HashMap<String, f64>;
/// Scope name -> identifier values. `d(x)` reads from the "distribution" scope.
pub type ScopedIdentifierValues = HashMap<String, IdentifierValues>;

pub const DISTRIBUTION_SCOPE: &str = "distribution";
pub const DISTRIBUTION_CALL: &str = "d";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Number(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Node {
    Literal {
        value: Literal,
    },
    Identifier {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference: Option<String>,
    },
    Unary {
        operator: char,
        #[serde(default)]
        argument: Option<Box<Node>>,
    },
    Binary {
        operator: char,
        left: Box<Node>,
        right: Box<Node>,
    },
    Call {
        callee: Box<Node>,
        arguments: Vec<Node>,
    },
    Array {
        elements: Vec<Node>,
    },
    Conditional {
        test: Box<Node>,
        consequent: Box<Node>,
        alternate: Box<Node>,
    },
    Member {
        object: Box<Node>,
        property: Box<Node>,
        computed: bool,
    },
    This,
    Compound {
        body: Vec<Node>,
    },
}

impl Node {
    /// Visits every sub-node depth first, passing the parent along.
    pub fn walk<'a>(&'a self, parent: Option<&'a Node>, f: &mut dyn FnMut(&'a Node, Option<&'a Node>)) {
        f(self, parent);
        match self {
            Node::Literal { .. } | Node::Identifier { .. } | Node::This => {}
            Node::Unary { argument, .. } => {
                if let Some(arg) = argument {
                    arg.walk(Some(self), f);
                }
            }
            Node::Binary { left, right, .. } => {
                left.walk(Some(self), f);
                right.walk(Some(self), f);
            }
            Node::Call { callee, arguments } => {
                callee.walk(Some(self), f);
                for a in arguments {
                    a.walk(Some(self), f);
                }
            }
            Node::Array { elements } => elements.iter().for_each(|e| e.walk(Some(self), f)),
            Node::Conditional { test, consequent, alternate } => {
                test.walk(Some(self), f);
                consequent.walk(Some(self), f);
                alternate.walk(Some(self), f);
            }
            Node::Member { object, property, .. } => {
                object.walk(Some(self), f);
                property.walk(Some(self), f);
            }
            Node::Compound { body } => body.iter().for_each(|e| e.walk(Some(self), f)),
        }
    }

    /// Visits identifiers, skipping the callee name of a `d(...)` call.
    pub fn for_each_identifier<'a>(&'a self, f: &mut dyn FnMut(&'a str, Option<&'a str>)) {
        self.walk(None, &mut |node, parent| {
            if let Node::Identifier { name, reference } = node {
                let is_callee = name == DISTRIBUTION_CALL && matches!(parent, Some(Node::Call { .. }));
                if !is_callee {
                    f(name.as_str(), reference.as_deref());
                }
            }
        });
    }

    /// Mutable variant used to attach references after parsing.
    pub(crate) fn bind_identifiers(&mut self, refs: &HashMap<String, String>) {
        match self {
            Node::Identifier { name, reference } => {
                if let Some(r) = refs.get(name.as_str()) {
                    *reference = Some(r.clone());
                }
            }
            Node::Call { callee, arguments } => {
                let is_d = matches!(callee.as_ref(), Node::Identifier { name, .. } if name == DISTRIBUTION_CALL);
                if !is_d {
                    callee.bind_identifiers(refs);
                }
                arguments.iter_mut().for_each(|a| a.bind_identifiers(refs));
            }
            Node::Unary { argument, .. } => {
                if let Some(a) = argument {
                    a.bind_identifiers(refs);
                }
            }
            Node::Binary { left, right, .. } => {
                left.bind_identifiers(refs);
                right.bind_identifiers(refs);
            }
            Node::Array { elements } | Node::Compound { body: elements } => {
                elements.iter_mut().for_each(|e| e.bind_identifiers(refs))
            }
            Node::Conditional { test, consequent, alternate } => {
                test.bind_identifiers(refs);
                consequent.bind_identifiers(refs);
                alternate.bind_identifiers(refs);
            }
            Node::Member { object, property, .. } => {
                object.bind_identifiers(refs);
                property.bind_identifiers(refs);
            }
            Node::Literal { .. } | Node::This => {}
        }
    }

    pub fn has_unavailable(&self) -> bool {
        let mut found = false;
        self.walk(None, &mut |node, _| match node {
            Node::Array { .. }
            | Node::Conditional { .. }
            | Node::Member { .. }
            | Node::This
            | Node::Compound { .. } => found = true,
            Node::Call { .. } if !node.is_distribution_call() => found = true,
            _ => {}
        });
        found
    }

    pub fn has_unbound_unary(&self) -> bool {
        let mut found = false;
        self.walk(None, &mut |node, _| {
            if let Node::Unary { argument: None, .. } = node {
                found = true;
            }
        });
        found
    }

    fn is_distribution_call(&self) -> bool {
        match self {
            Node::Call { callee, arguments } => {
                matches!(callee.as_ref(), Node::Identifier { name, .. } if name == DISTRIBUTION_CALL)
                    && arguments.len() == 1
                    && matches!(arguments[0], Node::Identifier { .. })
            }
            _ => false,
        }
    }

    pub fn resolve(
        &self,
        values: &IdentifierValues,
        scoped: Option<&ScopedIdentifierValues>,
    ) -> Result<f64, ExpressionError> {
        match self {
            Node::Literal { value: Literal::Number(n) } => Ok(*n),
            Node::Literal { value: Literal::Str(_) } => Err(ExpressionError::NotANumber),
            Node::Identifier { reference, .. } => lookup(Some(values), reference.as_deref()),
            Node::Unary { operator, argument } => {
                let arg = argument.as_ref().ok_or(ExpressionError::Unbound)?;
                let v = arg.resolve(values, scoped)?;
                match operator {
                    '-' => Ok(-v),
                    '+' => Ok(v),
                    _ => Err(ExpressionError::Unresolvable),
                }
            }
            Node::Binary { operator, left, right } => {
                let l = left.resolve(values, scoped)?;
                let r = right.resolve(values, scoped)?;
                match operator {
                    '+' => Ok(l + r),
                    '-' => Ok(l - r),
                    '*' => Ok(l * r),
                    '/' => Ok(l / r),
                    '%' => Ok(l % r),
                    _ => Err(ExpressionError::Unresolvable),
                }
            }
            Node::Call { arguments, .. } if self.is_distribution_call() => {
                let scoped = scoped.ok_or(ExpressionError::MissingScope)?;
                let reference = match &arguments[0] {
                    Node::Identifier { reference, .. } => reference.as_deref(),
                    _ => None,
                };
                lookup(scoped.get(DISTRIBUTION_SCOPE), reference)
            }
            _ => Err(ExpressionError::Unresolvable),
        }
    }
}

fn lookup(values: Option<&IdentifierValues>, reference: Option<&str>) -> Result<f64, ExpressionError> {
    values
        .zip(reference)
        .and_then(|(vals, r)| vals.get(r).copied())
        .ok_or(ExpressionError::NoValue)
}
