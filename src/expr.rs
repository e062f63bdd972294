//! Safe expression sublanguage for composite argument values
//!
//! Grammar (whitespace ignored):
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := '-' unary | primary
//! primary := number | string | reference | '(' expr ')'
//! ```
//!
//! Numbers are integers or decimals, strings are single- or double-quoted,
//! references are `$<id>` tokens naming an action of the current plan.
//! `+` adds numbers or concatenates strings; `-`, `*` and `/` are numeric only.
//! `/` always yields a decimal.

use serde_json::{Number, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("numeric overflow")]
    Overflow,

    #[error("reference ${id}: {reason}")]
    Reference { id: String, reason: String },
}

/// Runtime value inside an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Operand {
    /// Convert a stored result into an operand
    pub fn from_value(id: &str, value: &Value) -> Result<Self, ExprError> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Self::Int(i)),
                None => n
                    .as_f64()
                    .map(Self::Float)
                    .ok_or(ExprError::Overflow),
            },
            Value::String(s) => Ok(Self::Str(s.clone())),
            other => Err(ExprError::Type(format!(
                "result of ${} is {}, only numbers and strings can be combined",
                id,
                kind(other)
            ))),
        }
    }

    pub fn into_value(self) -> Result<Value, ExprError> {
        match self {
            Self::Int(i) => Ok(Value::from(i)),
            Self::Float(f) => Number::from_f64(f).map(Value::Number).ok_or(ExprError::Overflow),
            Self::Str(s) => Ok(Value::String(s)),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) | Self::Float(_) => "number",
            Self::Str(_) => "string",
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Str(_) => None,
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ref(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Length of the reference id at the start of `rest` (the text after a `$`)
///
/// Picks the longest id accepted by `is_ref`. Ids may contain `-` and `.`,
/// but a match must not stop in the middle of a word, so with ids `1` and
/// `step-1` the text `step-1 + 1` names `step-1` while `10` names nothing.
pub fn reference_len(rest: &str, is_ref: impl Fn(&str) -> bool) -> Option<usize> {
    let run = rest
        .find(|c: char| !(is_id_char(c) || c == '-' || c == '.'))
        .unwrap_or(rest.len());

    (1..=run).rev().find(|&end| {
        let boundary = rest[end..].chars().next().map_or(true, |c| !is_id_char(c));
        boundary && is_ref(&rest[..end])
    })
}

/// Tokenize `text`; `None` when it contains anything outside the sublanguage
///
/// `is_ref` decides which `$<id>` tokens are references.
pub fn lex(text: &str, is_ref: impl Fn(&str) -> bool) -> Option<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' => { tokens.push(Token::Plus); i += 1; }
            '-' => { tokens.push(Token::Minus); i += 1; }
            '*' => { tokens.push(Token::Star); i += 1; }
            '/' => { tokens.push(Token::Slash); i += 1; }
            '(' => { tokens.push(Token::LParen); i += 1; }
            ')' => { tokens.push(Token::RParen); i += 1; }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                if literal.contains('.') {
                    tokens.push(Token::Float(literal.parse().ok()?));
                } else {
                    tokens.push(Token::Int(literal.parse().ok()?));
                }
            }
            '"' | '\'' => {
                let quote = c;
                let mut literal = String::new();
                i += 1;
                loop {
                    let ch = *chars.get(i)?;
                    i += 1;
                    match ch {
                        '\\' => {
                            literal.push(*chars.get(i)?);
                            i += 1;
                        }
                        ch if ch == quote => break,
                        ch => literal.push(ch),
                    }
                }
                tokens.push(Token::Str(literal));
            }
            '$' => {
                let rest: String = chars[i + 1..].iter().collect();
                let len = reference_len(&rest, &is_ref)?;
                tokens.push(Token::Ref(rest[..len].to_string()));
                i += 1 + len;
            }
            _ => return None,
        }
    }

    Some(tokens)
}

/// Evaluate a token stream, looking references up through `lookup`
pub fn evaluate<F>(tokens: &[Token], lookup: F) -> Result<Value, ExprError>
where
    F: Fn(&str) -> Result<Value, ExprError>,
{
    if tokens.is_empty() {
        return Err(ExprError::Syntax("empty expression".to_string()));
    }

    let mut parser = Parser { tokens, pos: 0, lookup: &lookup };
    let result = parser.expr()?;

    if let Some(extra) = tokens.get(parser.pos) {
        return Err(ExprError::Syntax(format!("unexpected token {:?}", extra)));
    }

    result.into_value()
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    lookup: &'a dyn Fn(&str) -> Result<Value, ExprError>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<Operand, ExprError> {
        let mut lhs = self.term()?;
        while let Some(op) = self.peek().cloned() {
            match op {
                Token::Plus | Token::Minus => {
                    self.pos += 1;
                    let rhs = self.term()?;
                    lhs = binary(&op, lhs, rhs)?;
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Operand, ExprError> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.peek().cloned() {
            match op {
                Token::Star | Token::Slash => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    lhs = binary(&op, lhs, rhs)?;
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Operand, ExprError> {
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            return match self.unary()? {
                Operand::Int(i) => i.checked_neg().map(Operand::Int).ok_or(ExprError::Overflow),
                Operand::Float(f) => Ok(Operand::Float(-f)),
                Operand::Str(_) => Err(ExprError::Type("cannot negate a string".to_string())),
            };
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Operand, ExprError> {
        match self.next().cloned() {
            Some(Token::Int(i)) => Ok(Operand::Int(i)),
            Some(Token::Float(f)) => Ok(Operand::Float(f)),
            Some(Token::Str(s)) => Ok(Operand::Str(s)),
            Some(Token::Ref(id)) => {
                let value = (self.lookup)(&id)?;
                Operand::from_value(&id, &value)
            }
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ExprError::Syntax("missing ')'".to_string())),
                }
            }
            Some(other) => Err(ExprError::Syntax(format!("unexpected token {:?}", other))),
            None => Err(ExprError::Syntax("unexpected end of expression".to_string())),
        }
    }
}

fn binary(op: &Token, lhs: Operand, rhs: Operand) -> Result<Operand, ExprError> {
    use Operand::*;

    match (op, lhs, rhs) {
        (Token::Plus, Str(a), Str(b)) => Ok(Str(a + &b)),
        (Token::Plus, Int(a), Int(b)) => a.checked_add(b).map(Int).ok_or(ExprError::Overflow),
        (Token::Minus, Int(a), Int(b)) => a.checked_sub(b).map(Int).ok_or(ExprError::Overflow),
        (Token::Star, Int(a), Int(b)) => a.checked_mul(b).map(Int).ok_or(ExprError::Overflow),
        (op, lhs, rhs) => {
            let (a, b) = match (lhs.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    return Err(ExprError::Type(format!(
                        "unsupported operand types for {:?}: {} and {}",
                        op,
                        lhs.type_name(),
                        rhs.type_name()
                    )))
                }
            };
            let result = match op {
                Token::Plus => a + b,
                Token::Minus => a - b,
                Token::Star => a * b,
                Token::Slash if b == 0.0 => return Err(ExprError::DivisionByZero),
                Token::Slash => a / b,
                other => return Err(ExprError::Syntax(format!("{:?} is not an operator", other))),
            };
            if result.is_finite() {
                Ok(Float(result))
            } else {
                Err(ExprError::Overflow)
            }
        }
    }
}
