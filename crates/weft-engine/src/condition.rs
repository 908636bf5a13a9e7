//! Sandboxed boolean expressions for `condition` nodes.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr       := or
//! or         := and ( "||" and )*
//! and        := equality ( "&&" equality )*
//! equality   := comparison ( ( "==" | "!=" | "===" | "!==" ) comparison )*
//! comparison := unary ( ( "<" | "<=" | ">" | ">=" | "contains" ) unary )*
//! unary      := ( "!" | "-" ) unary | primary
//! primary    := number | string | true | false | null | ${path} | path | "(" expr ")"
//! ```
//!
//! `${path}` and bare dotted paths resolve against the run scope with their
//! JSON type intact. String literals may embed `${...}` references, which are
//! rendered as templates. Nothing is ever executed as code. Conditions longer
//! than [`MAX_TOKENS`] or nested deeper than [`MAX_DEPTH`] are rejected.

use serde_json::Value;
use thiserror::Error;

use weft_core::context::Scope;

use crate::expression::{display, lookup, render_template};

/// Deepest allowed nesting of parentheses and unary operators.
pub const MAX_DEPTH: usize = 128;

/// Longest allowed condition, in tokens. Bounds the depth of operator chains.
pub const MAX_TOKENS: usize = 1024;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConditionError {
    #[error("empty condition")]
    Empty,
    #[error("unexpected character '{0}' at offset {1}")]
    UnexpectedChar(char, usize),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated ${{...}} reference")]
    UnterminatedReference,
    #[error("unexpected token {0}")]
    UnexpectedToken(String),
    #[error("unexpected end of condition")]
    UnexpectedEnd,
    #[error("cannot negate {0}")]
    NotANumber(String),
    #[error("condition nested deeper than {0} levels")]
    TooDeep(usize),
    #[error("condition longer than {0} tokens")]
    TooLong(usize),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Reference(String),
    Ident(String),
    True,
    False,
    Null,
    LParen,
    RParen,
    Not,
    Minus,
    And,
    Or,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    And,
    Or,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Template(String),
    Variable(String),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

/// Evaluate a condition string to a boolean.
pub fn evaluate(source: &str, scope: Scope<'_>) -> Result<bool, ConditionError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ConditionError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_or()?;
    if let Some(tok) = parser.peek() {
        return Err(ConditionError::UnexpectedToken(format!("{:?}", tok)));
    }
    Ok(truthy(&eval(&expr, scope)?))
}

fn tokenize(source: &str) -> Result<Vec<Token>, ConditionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '$' if chars.get(i + 1) == Some(&'{') => {
                let start = i + 2;
                let end = (start..chars.len())
                    .find(|&j| chars[j] == '}')
                    .ok_or(ConditionError::UnterminatedReference)?;
                let path: String = chars[start..end].iter().collect();
                tokens.push(Token::Reference(path.trim().to_string()));
                i = end + 1;
            }
            '"' | '\'' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(ConditionError::UnterminatedString),
                        Some('\\') => {
                            if let Some(&escaped) = chars.get(i + 1) {
                                text.push(escaped);
                            }
                            i += 2;
                        }
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            text.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(text));
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| ConditionError::UnexpectedToken(text.clone()))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" | "undefined" => Token::Null,
                    "contains" => Token::Contains,
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(word),
                });
            }
            _ => {
                let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
                let (tok, len) = if rest.starts_with("===") {
                    (Token::StrictEq, 3)
                } else if rest.starts_with("!==") {
                    (Token::StrictNotEq, 3)
                } else if rest.starts_with("==") {
                    (Token::Eq, 2)
                } else if rest.starts_with("!=") {
                    (Token::NotEq, 2)
                } else if rest.starts_with("<=") {
                    (Token::Le, 2)
                } else if rest.starts_with(">=") {
                    (Token::Ge, 2)
                } else if rest.starts_with("&&") {
                    (Token::And, 2)
                } else if rest.starts_with("||") {
                    (Token::Or, 2)
                } else {
                    match c {
                        '<' => (Token::Lt, 1),
                        '>' => (Token::Gt, 1),
                        '!' => (Token::Not, 1),
                        '-' => (Token::Minus, 1),
                        _ => return Err(ConditionError::UnexpectedChar(c, i)),
                    }
                };
                tokens.push(tok);
                i += len;
            }
        }
        if tokens.len() > MAX_TOKENS {
            return Err(ConditionError::TooLong(MAX_TOKENS));
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// Run `f` one nesting level deeper.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ConditionError>,
    ) -> Result<T, ConditionError> {
        if self.depth >= MAX_DEPTH {
            return Err(ConditionError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn parse_or(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.parse_equality()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_equality()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                Some(Token::StrictEq) => BinaryOp::StrictEq,
                Some(Token::StrictNotEq) => BinaryOp::StrictNotEq,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                Some(Token::Contains) => BinaryOp::Contains,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ConditionError> {
        match self.peek() {
            Some(Token::Not) => {
                self.pos += 1;
                let inner = self.nested(Self::parse_unary)?;
                Ok(Expr::Not(Box::new(inner)))
            }
            Some(Token::Minus) => {
                self.pos += 1;
                let inner = self.nested(Self::parse_unary)?;
                Ok(Expr::Neg(Box::new(inner)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ConditionError> {
        match self.next().ok_or(ConditionError::UnexpectedEnd)? {
            Token::Number(n) => Ok(Expr::Literal(number(n))),
            Token::Str(s) if s.contains("${") => Ok(Expr::Template(s)),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::Reference(path) | Token::Ident(path) => Ok(Expr::Variable(path)),
            Token::LParen => {
                let inner = self.nested(Self::parse_or)?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    Some(other) => Err(ConditionError::UnexpectedToken(format!("{:?}", other))),
                    None => Err(ConditionError::UnexpectedEnd),
                }
            }
            other => Err(ConditionError::UnexpectedToken(format!("{:?}", other))),
        }
    }
}

fn eval(expr: &Expr, scope: Scope<'_>) -> Result<Value, ConditionError> {
    Ok(match expr {
        Expr::Literal(v) => v.clone(),
        Expr::Template(t) => Value::String(render_template(t, scope)),
        Expr::Variable(path) => lookup(path, scope).unwrap_or(Value::Null),
        Expr::Not(inner) => Value::Bool(!truthy(&eval(inner, scope)?)),
        Expr::Neg(inner) => {
            let v = eval(inner, scope)?;
            match as_number(&v) {
                Some(n) => number(-n),
                None => return Err(ConditionError::NotANumber(display(&v))),
            }
        }
        Expr::Binary(op, l, r) => Value::Bool(match op {
            BinaryOp::And => truthy(&eval(l, scope)?) && truthy(&eval(r, scope)?),
            BinaryOp::Or => truthy(&eval(l, scope)?) || truthy(&eval(r, scope)?),
            op => compare_values(*op, &eval(l, scope)?, &eval(r, scope)?),
        }),
    })
}

/// Apply a non-logical binary operator to two evaluated operands.
fn compare_values(op: BinaryOp, a: &Value, b: &Value) -> bool {
    match op {
        BinaryOp::Eq => loose_eq(a, b),
        BinaryOp::NotEq => !loose_eq(a, b),
        BinaryOp::StrictEq => strict_eq(a, b),
        BinaryOp::StrictNotEq => !strict_eq(a, b),
        BinaryOp::Lt => compare(a, b).is_some_and(|o| o.is_lt()),
        BinaryOp::Le => compare(a, b).is_some_and(|o| o.is_le()),
        BinaryOp::Gt => compare(a, b).is_some_and(|o| o.is_gt()),
        BinaryOp::Ge => compare(a, b).is_some_and(|o| o.is_ge()),
        BinaryOp::Contains => contains(a, b),
        BinaryOp::And => truthy(a) && truthy(b),
        BinaryOp::Or => truthy(a) || truthy(b),
    }
}

fn number(n: f64) -> Value {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// JavaScript-style truthiness.
pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), _) | (_, Value::Number(_)) | (Value::Bool(_), _) | (_, Value::Bool(_))
            if !a.is_null() && !b.is_null() =>
        {
            match (as_number(a), as_number(b)) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            }
        }
        _ => a == b,
    }
}

fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => as_number(a)?.partial_cmp(&as_number(b)?),
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(s) => s.contains(&display(needle)),
        Value::Array(items) => items.iter().any(|item| loose_eq(item, needle)),
        Value::Object(map) => map.contains_key(&display(needle)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use weft_core::types::Outputs;

    fn check(expr: &str) -> Result<bool, ConditionError> {
        let mut inputs = Outputs::new();
        inputs.insert("n".into(), json!(5));
        inputs.insert("name".into(), json!("weft"));
        let mut outputs = Outputs::new();
        outputs.insert("status".into(), json!("ok"));
        outputs.insert("count".into(), json!("10"));
        outputs.insert("tags".into(), json!(["a", "b"]));
        outputs.insert("empty".into(), json!(""));
        let state = Outputs::new();
        evaluate(
            expr,
            Scope {
                inputs: &inputs,
                outputs: &outputs,
                state: &state,
            },
        )
    }

    #[test]
    fn test_numeric_comparisons() {
        assert_eq!(check("${inputs.n} > 3"), Ok(true));
        assert_eq!(check("${inputs.n} <= 4"), Ok(false));
        assert_eq!(check("${inputs.n} >= 5 && ${inputs.n} < 6"), Ok(true));
        assert_eq!(check("-${inputs.n} < 0"), Ok(true));
        // numeric string compared as number
        assert_eq!(check("${outputs.count} > 9"), Ok(true));
    }

    #[test]
    fn test_equality_forms() {
        assert_eq!(check("${outputs.status} == \"ok\""), Ok(true));
        assert_eq!(check("'${outputs.status}' === 'ok'"), Ok(true));
        assert_eq!(check("${outputs.status} != 'ok'"), Ok(false));
        assert_eq!(check("${outputs.count} == 10"), Ok(true));
        assert_eq!(check("${outputs.count} === 10"), Ok(false));
        assert_eq!(check("${outputs.missing} == null"), Ok(true));
    }

    #[test]
    fn test_bare_paths_and_keywords() {
        assert_eq!(check("inputs.name == 'weft' and not outputs.empty"), Ok(true));
        assert_eq!(check("status == 'ok' or false"), Ok(true));
    }

    #[test]
    fn test_contains() {
        assert_eq!(check("${outputs.tags} contains 'b'"), Ok(true));
        assert_eq!(check("${inputs.name} contains 'ef'"), Ok(true));
        assert_eq!(check("${outputs.tags} contains 'z'"), Ok(false));
    }

    #[test]
    fn test_grouping_and_precedence() {
        assert_eq!(check("true || false && false"), Ok(true));
        assert_eq!(check("(true || false) && false"), Ok(false));
        assert_eq!(check("!(${inputs.n} > 3)"), Ok(false));
    }

    #[test]
    fn test_truthiness_of_single_values() {
        assert_eq!(check("${outputs.status}"), Ok(true));
        assert_eq!(check("${outputs.empty}"), Ok(false));
        assert_eq!(check("0"), Ok(false));
    }

    #[test]
    fn test_malformed_conditions() {
        assert_eq!(check(""), Err(ConditionError::Empty));
        assert_eq!(check("'open"), Err(ConditionError::UnterminatedString));
        assert_eq!(check("${inputs.n"), Err(ConditionError::UnterminatedReference));
        assert_eq!(check("1 >"), Err(ConditionError::UnexpectedEnd));
        assert!(matches!(check("1 2"), Err(ConditionError::UnexpectedToken(_))));
        assert!(matches!(check("a ; b"), Err(ConditionError::UnexpectedChar(';', _))));
        assert!(matches!(check("(1 > 0"), Err(ConditionError::UnexpectedEnd)));
    }

    #[test]
    fn test_nesting_limit() {
        assert_eq!(check(&"(".repeat(MAX_DEPTH + 1)), Err(ConditionError::TooDeep(MAX_DEPTH)));
        assert_eq!(check(&"!".repeat(MAX_DEPTH + 1)), Err(ConditionError::TooDeep(MAX_DEPTH)));

        let nested = format!("{}true{}", "(".repeat(MAX_DEPTH - 1), ")".repeat(MAX_DEPTH - 1));
        assert_eq!(check(&nested), Ok(true));
    }

    #[test]
    fn test_length_limit() {
        assert_eq!(check(&"(".repeat(200_000)), Err(ConditionError::TooLong(MAX_TOKENS)));
        assert_eq!(check(&"!".repeat(200_000)), Err(ConditionError::TooLong(MAX_TOKENS)));

        let chain = vec!["true"; MAX_TOKENS].join(" || ");
        assert_eq!(check(&chain), Err(ConditionError::TooLong(MAX_TOKENS)));

        let short_chain = vec!["false"; 200].join(" || ");
        assert_eq!(check(&short_chain), Ok(false));
    }

    #[test]
    fn test_no_code_execution() {
        // Function-call syntax is rejected instead of being interpreted.
        assert!(check("process.exit(1)").is_err());
    }
}
