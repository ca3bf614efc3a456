//! parser.rs
//! Recursive descent parser producing an untyped `Node` tree.

use super::ast::{Literal, Node};
use super::error::ExpressionError;
use super::lexer::{tokenize, Token};

pub fn parse(input: &str) -> Result<Node, ExpressionError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_compound()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExpressionError> {
        match self.next() {
            Some(t) if t == expected => Ok(()),
            other => Err(ExpressionError::parse(format!("expected {:?}, found {:?}", expected, other))),
        }
    }

    /// Top level: comma separated or juxtaposed expressions become a compound.
    fn parse_compound(&mut self) -> Result<Node, ExpressionError> {
        let mut body = Vec::new();
        while let Some(t) = self.peek() {
            if *t == Token::Comma {
                self.pos += 1;
                continue;
            }
            body.push(self.parse_expression()?);
        }
        if body.len() == 1 {
            Ok(body.remove(0))
        } else {
            Ok(Node::Compound { body })
        }
    }

    fn parse_expression(&mut self) -> Result<Node, ExpressionError> {
        let test = self.parse_binary(0)?;
        if self.peek() == Some(&Token::Question) {
            self.pos += 1;
            let consequent = self.parse_expression()?;
            self.expect(Token::Colon)?;
            let alternate = self.parse_expression()?;
            return Ok(Node::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            });
        }
        Ok(test)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Node, ExpressionError> {
        let mut left = self.parse_unary()?;
        while let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            let prec = precedence(op);
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let right = self.parse_binary(prec + 1)?;
            left = Node::Binary { operator: op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Node, ExpressionError> {
        match self.peek() {
            Some(Token::Op(op)) if *op == '-' || *op == '+' => {
                let op = *op;
                self.pos += 1;
                if self.peek().is_none() {
                    return Err(ExpressionError::parse("missing unary operator argument"));
                }
                let argument = self.parse_unary()?;
                Ok(Node::Unary { operator: op, argument: Some(Box::new(argument)) })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Node, ExpressionError> {
        let mut node = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.next() {
                        Some(Token::Ident(name)) => {
                            node = Node::Member {
                                object: Box::new(node),
                                property: Box::new(Node::Identifier { name, reference: None }),
                                computed: false,
                            };
                        }
                        other => return Err(ExpressionError::parse(format!("unexpected {:?} after '.'", other))),
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let property = self.parse_expression()?;
                    self.expect(Token::RBracket)?;
                    node = Node::Member { object: Box::new(node), property: Box::new(property), computed: true };
                }
                Some(Token::LParen) => {
                    self.pos += 1;
                    let arguments = self.parse_list(Token::RParen)?;
                    node = Node::Call { callee: Box::new(node), arguments };
                }
                _ => return Ok(node),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Node, ExpressionError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Node::Literal { value: Literal::Number(n) }),
            Some(Token::Str(s)) => Ok(Node::Literal { value: Literal::Str(s) }),
            Some(Token::Ident(name)) if name == "this" => Ok(Node::This),
            Some(Token::Ident(name)) => Ok(Node::Identifier { name, reference: None }),
            Some(Token::LParen) => {
                let inner = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                let elements = self.parse_list(Token::RBracket)?;
                Ok(Node::Array { elements })
            }
            other => Err(ExpressionError::parse(format!("unexpected {:?}", other))),
        }
    }

    fn parse_list(&mut self, close: Token) -> Result<Vec<Node>, ExpressionError> {
        let mut items = Vec::new();
        if self.peek() == Some(&close) {
            self.pos += 1;
            return Ok(items);
        }
        loop {
            items.push(self.parse_expression()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(t) if t == close => return Ok(items),
                other => return Err(ExpressionError::parse(format!("unexpected {:?} in list", other))),
            }
        }
    }
}

fn precedence(op: char) -> u8 {
    match op {
        '*' | '/' | '%' => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Box<Node> {
        Box::new(Node::Identifier { name: name.into(), reference: None })
    }

    #[test]
    fn test_precedence_and_associativity() {
        // a - b - c * d  =>  (a - b) - (c * d)
        let node = parse("a - b - c * d").unwrap();
        let expected = Node::Binary {
            operator: '-',
            left: Box::new(Node::Binary { operator: '-', left: ident("a"), right: ident("b") }),
            right: Box::new(Node::Binary { operator: '*', left: ident("c"), right: ident("d") }),
        };
        assert_eq!(node, expected);
    }

    #[test]
    fn test_parses_disallowed_constructs_for_validation() {
        assert!(matches!(parse("a ? b : c").unwrap(), Node::Conditional { .. }));
        assert!(matches!(parse("a.b").unwrap(), Node::Member { .. }));
        assert!(matches!(parse("[1, 2]").unwrap(), Node::Array { .. }));
        assert!(matches!(parse("a, b").unwrap(), Node::Compound { .. }));
        assert!(matches!(parse("").unwrap(), Node::Compound { .. }));
    }

    #[test]
    fn test_unbalanced_parentheses_fail() {
        let err = parse("(a + b").unwrap_err();
        assert_eq!(err.to_string(), "failed to parse expression");
        assert!(parse("a +").is_err());
    }
}
