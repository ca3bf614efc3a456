//! lexer.rs
//! Tokenizer for the arithmetic grammar. Operators outside `+ - * / %`
//! are rejected here, which surfaces as a parse failure.

use super::error::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Question,
    Colon,
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' => {
                let (n, next) = read_number(&chars, i)?;
                tokens.push(Token::Number(n));
                i = next;
            }
            '.' if chars.get(i + 1).map_or(false, |d| d.is_ascii_digit()) => {
                let (n, next) = read_number(&chars, i)?;
                tokens.push(Token::Number(n));
                i = next;
            }
            '"' | '\'' => {
                let (s, next) = read_string(&chars, i)?;
                tokens.push(Token::Str(s));
                i = next;
            }
            c if is_ident_start(c) => {
                let start = i;
                while i < chars.len() && is_ident_part(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '+' | '-' | '*' | '/' | '%' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            '(' => { tokens.push(Token::LParen); i += 1; }
            ')' => { tokens.push(Token::RParen); i += 1; }
            '[' => { tokens.push(Token::LBracket); i += 1; }
            ']' => { tokens.push(Token::RBracket); i += 1; }
            ',' => { tokens.push(Token::Comma); i += 1; }
            '.' => { tokens.push(Token::Dot); i += 1; }
            '?' => { tokens.push(Token::Question); i += 1; }
            ':' => { tokens.push(Token::Colon); i += 1; }
            other => {
                return Err(ExpressionError::parse(format!("unexpected '{}' at {}", other, i)));
            }
        }
    }
    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c == '$' || c == '_' || c.is_ascii_alphabetic() || (c as u32) >= 128
}

fn is_ident_part(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

fn read_number(chars: &[char], start: usize) -> Result<(f64, usize), ExpressionError> {
    let mut i = start;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' {
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
        i += 1;
        if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
            i += 1;
        }
        let exp_start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        if exp_start == i {
            return Err(ExpressionError::parse(format!("expected exponent at {}", i)));
        }
    }
    // "1x" is not a number followed by an identifier
    if i < chars.len() && is_ident_start(chars[i]) {
        return Err(ExpressionError::parse(format!("variable names cannot start with a number at {}", i)));
    }
    let text: String = chars[start..i].iter().collect();
    let value = text
        .parse::<f64>()
        .map_err(|e| ExpressionError::parse(e.to_string()))?;
    Ok((value, i))
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize), ExpressionError> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            c if c == quote => return Ok((out, i + 1)),
            '\\' if i + 1 < chars.len() => {
                out.push(chars[i + 1]);
                i += 2;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(ExpressionError::parse("unclosed quote"))
}
