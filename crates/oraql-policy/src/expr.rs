//! Sandboxed boolean-expression evaluator.
//!
//! Ruleset conditions are tenant-authored and partially session-influenced,
//! so they are never handed to a general interpreter. After placeholder
//! substitution an expression contains only literals; this module parses
//! and evaluates the fixed grammar:
//!
//! ```text
//! expr       := or
//! or         := and ( "or" and )*
//! and        := not ( "and" not )*
//! not        := "not" not | comparison
//! comparison := operand ( ("=="|"="|"!="|"<"|"<="|">"|">=") operand
//!                       | ["not"] "in" operand )?
//! operand    := string | number | "true" | "false" | "null"
//!             | "(" expr ")" | "[" [expr ("," expr)*] "]"
//! ```
//!
//! No identifiers other than the keywords are accepted; an unresolved
//! variable name is a hard error.

use crate::error::PolicyError;

/// A literal value in the expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    /// Boolean interpretation of an evaluation result. `null` is false;
    /// anything other than a boolean or null is an error.
    pub fn truthy(&self) -> Result<bool, PolicyError> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Null => Ok(false),
            other => Err(PolicyError::InvalidCondition(format!(
                "expression did not evaluate to a boolean: {:?}",
                other
            ))),
        }
    }
}

/// Evaluate a fully-resolved expression to a boolean.
pub fn evaluate(input: &str) -> Result<bool, PolicyError> {
    let tokens = lex(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.or_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(PolicyError::InvalidCondition(format!(
            "unexpected trailing input in expression: {input}"
        )));
    }
    value.truthy()
}

/// Normalize operator casing before evaluation: `AND`/`OR`/`IN`/`NOT` are
/// lowercased, boolean and null keywords are canonicalized. Quoted string
/// literals are left untouched.
pub fn normalize_operators(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c == '\'' || c == '"' {
            // Copy the string literal through, honoring doubled quotes.
            let quote = c;
            out.push(c);
            chars.next();
            while let Some(&c) = chars.peek() {
                out.push(c);
                chars.next();
                if c == quote {
                    if chars.peek() == Some(&quote) {
                        out.push(quote);
                        chars.next();
                    } else {
                        break;
                    }
                }
            }
        } else if c.is_ascii_alphabetic() || c == '_' {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    word.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            match word.to_ascii_lowercase().as_str() {
                "and" | "or" | "in" | "not" | "true" | "false" => {
                    out.push_str(&word.to_ascii_lowercase())
                }
                "null" | "none" => out.push_str("null"),
                _ => out.push_str(&word),
            }
        } else {
            out.push(c);
            chars.next();
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Str(String),
    Num(f64),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    In,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

fn lex(input: &str) -> Result<Vec<Tok>, PolicyError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    if c == quote {
                        // A doubled quote is an escaped literal quote.
                        if chars.peek() == Some(&quote) {
                            s.push(quote);
                            chars.next();
                        } else {
                            closed = true;
                            break;
                        }
                    } else {
                        s.push(c);
                    }
                }
                if !closed {
                    return Err(PolicyError::InvalidCondition(
                        "unterminated string literal".to_string(),
                    ));
                }
                tokens.push(Tok::Str(s));
            }
            '(' => {
                chars.next();
                tokens.push(Tok::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Tok::RParen);
            }
            '[' => {
                chars.next();
                tokens.push(Tok::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Tok::RBracket);
            }
            ',' => {
                chars.next();
                tokens.push(Tok::Comma);
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                }
                tokens.push(Tok::Eq);
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Tok::Ne);
                } else {
                    return Err(PolicyError::InvalidCondition(
                        "unexpected '!' in expression".to_string(),
                    ));
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Tok::Le);
                } else {
                    tokens.push(Tok::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Tok::Ge);
                } else {
                    tokens.push(Tok::Gt);
                }
            }
            '-' | '0'..='9' => {
                let mut num = String::new();
                if c == '-' {
                    num.push(c);
                    chars.next();
                }
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        num.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let parsed = num.parse::<f64>().map_err(|_| {
                    PolicyError::InvalidCondition(format!("invalid number literal: {num}"))
                })?;
                tokens.push(Tok::Num(parsed));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match word.to_ascii_lowercase().as_str() {
                    "and" => tokens.push(Tok::And),
                    "or" => tokens.push(Tok::Or),
                    "not" => tokens.push(Tok::Not),
                    "in" => tokens.push(Tok::In),
                    "true" => tokens.push(Tok::True),
                    "false" => tokens.push(Tok::False),
                    "null" | "none" => tokens.push(Tok::Null),
                    _ => {
                        return Err(PolicyError::InvalidCondition(format!(
                            "unresolved identifier in expression: {word}"
                        )))
                    }
                }
            }
            other => {
                return Err(PolicyError::InvalidCondition(format!(
                    "unexpected character in expression: {other}"
                )))
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn or_expr(&mut self) -> Result<Value, PolicyError> {
        let mut left = self.and_expr()?;
        while self.eat(&Tok::Or) {
            // The right side is always parsed, but short-circuiting skips
            // its truthiness check when the left already decides.
            let right = self.and_expr()?;
            let decided = left.truthy()?;
            left = Value::Bool(decided || right.truthy()?);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Value, PolicyError> {
        let mut left = self.not_expr()?;
        while self.eat(&Tok::And) {
            let right = self.not_expr()?;
            let decided = left.truthy()?;
            left = Value::Bool(decided && right.truthy()?);
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Value, PolicyError> {
        // `not` followed by `in` is handled inside comparison, so only
        // treat it as negation when it isn't part of `not in`.
        if self.peek() == Some(&Tok::Not) {
            self.pos += 1;
            let value = self.not_expr()?;
            return Ok(Value::Bool(!value.truthy()?));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Value, PolicyError> {
        let left = self.operand()?;

        let negate_membership = if self.peek() == Some(&Tok::Not) {
            // Only valid as `not in`.
            if self.tokens.get(self.pos + 1) == Some(&Tok::In) {
                self.pos += 1;
                true
            } else {
                return Ok(left);
            }
        } else {
            false
        };

        let op = match self.peek() {
            Some(Tok::Eq) => Cmp::Eq,
            Some(Tok::Ne) => Cmp::Ne,
            Some(Tok::Lt) => Cmp::Lt,
            Some(Tok::Le) => Cmp::Le,
            Some(Tok::Gt) => Cmp::Gt,
            Some(Tok::Ge) => Cmp::Ge,
            Some(Tok::In) => Cmp::In,
            _ if negate_membership => {
                return Err(PolicyError::InvalidCondition(
                    "expected 'in' after 'not'".to_string(),
                ))
            }
            _ => return Ok(left),
        };
        self.pos += 1;

        let right = self.operand()?;
        let result = compare(&left, op, &right)?;
        Ok(Value::Bool(if negate_membership { !result } else { result }))
    }

    fn operand(&mut self) -> Result<Value, PolicyError> {
        match self.peek().cloned() {
            Some(Tok::Str(s)) => {
                self.pos += 1;
                Ok(Value::Str(s))
            }
            Some(Tok::Num(n)) => {
                self.pos += 1;
                Ok(Value::Number(n))
            }
            Some(Tok::True) => {
                self.pos += 1;
                Ok(Value::Bool(true))
            }
            Some(Tok::False) => {
                self.pos += 1;
                Ok(Value::Bool(false))
            }
            Some(Tok::Null) => {
                self.pos += 1;
                Ok(Value::Null)
            }
            Some(Tok::LParen) => {
                self.pos += 1;
                let value = self.or_expr()?;
                if !self.eat(&Tok::RParen) {
                    return Err(PolicyError::InvalidCondition(
                        "expected ')' in expression".to_string(),
                    ));
                }
                Ok(value)
            }
            Some(Tok::LBracket) => {
                self.pos += 1;
                let mut items = Vec::new();
                if !self.eat(&Tok::RBracket) {
                    loop {
                        items.push(self.or_expr()?);
                        if self.eat(&Tok::Comma) {
                            continue;
                        }
                        if self.eat(&Tok::RBracket) {
                            break;
                        }
                        return Err(PolicyError::InvalidCondition(
                            "expected ',' or ']' in list literal".to_string(),
                        ));
                    }
                }
                Ok(Value::List(items))
            }
            other => Err(PolicyError::InvalidCondition(format!(
                "expected a value in expression, found {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

fn compare(left: &Value, op: Cmp, right: &Value) -> Result<bool, PolicyError> {
    match op {
        Cmp::Eq => Ok(left == right),
        Cmp::Ne => Ok(left != right),
        Cmp::In => membership(left, right),
        Cmp::Lt | Cmp::Le | Cmp::Gt | Cmp::Ge => {
            let ordering = match (left, right) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => None,
            };
            let Some(ordering) = ordering else {
                return Err(PolicyError::InvalidCondition(format!(
                    "cannot order {:?} against {:?}",
                    left, right
                )));
            };
            Ok(match op {
                Cmp::Lt => ordering.is_lt(),
                Cmp::Le => ordering.is_le(),
                Cmp::Gt => ordering.is_gt(),
                Cmp::Ge => ordering.is_ge(),
                _ => unreachable!(),
            })
        }
    }
}

fn membership(left: &Value, right: &Value) -> Result<bool, PolicyError> {
    match right {
        Value::List(items) => Ok(items.contains(left)),
        Value::Str(haystack) => match left {
            Value::Str(needle) => Ok(haystack.contains(needle.as_str())),
            _ => Err(PolicyError::InvalidCondition(
                "'in' against a string requires a string needle".to_string(),
            )),
        },
        _ => Err(PolicyError::InvalidCondition(
            "'in' requires a list or string on the right-hand side".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_and_boolean_operators() {
        assert!(evaluate("'customer' == 'customer'").unwrap());
        assert!(!evaluate("'customer' == 'admin'").unwrap());
        assert!(evaluate("1 == 1 and 2 != 3").unwrap());
        assert!(evaluate("false or true").unwrap());
        assert!(evaluate("not false").unwrap());
    }

    #[test]
    fn test_membership() {
        assert!(evaluate("'emea' in ['emea', 'apac']").unwrap());
        assert!(!evaluate("'amer' in ['emea', 'apac']").unwrap());
        assert!(evaluate("'amer' not in ['emea', 'apac']").unwrap());
        assert!(evaluate("'der' in 'orders'").unwrap());
    }

    #[test]
    fn test_comparisons() {
        assert!(evaluate("2 < 3").unwrap());
        assert!(evaluate("3 >= 3").unwrap());
        assert!(evaluate("'a' < 'b'").unwrap());
        assert!(evaluate("(1 == 1) and (2 <= 2)").unwrap());
    }

    #[test]
    fn test_boolean_operators_short_circuit() {
        // A non-boolean right side is never truthiness-checked when the
        // left side already decides the result.
        assert!(!evaluate("false and 'x'").unwrap());
        assert!(evaluate("true or 'x'").unwrap());
        // The left side always is.
        assert!(evaluate("'x' and true").is_err());
        assert!(evaluate("true and 'x'").is_err());
    }

    #[test]
    fn test_null_is_false() {
        assert!(!evaluate("null").unwrap());
        assert!(!evaluate("null == 'customer'").unwrap());
        assert!(evaluate("null == null").unwrap());
    }

    #[test]
    fn test_unresolved_identifier_is_an_error() {
        let err = evaluate("role == 'customer'").unwrap_err();
        assert!(matches!(err, PolicyError::InvalidCondition(_)));
    }

    #[test]
    fn test_case_normalization() {
        let normalized = normalize_operators("'x' IN ['x'] AND TRUE OR None");
        assert_eq!(normalized, "'x' in ['x'] and true or null");
        assert!(evaluate(&normalized).unwrap());
    }

    #[test]
    fn test_normalization_preserves_string_literals() {
        let normalized = normalize_operators("'AND OR TRUE' == 'AND OR TRUE'");
        assert_eq!(normalized, "'AND OR TRUE' == 'AND OR TRUE'");
        assert!(evaluate(&normalized).unwrap());
    }

    #[test]
    fn test_escaped_quote_in_string() {
        assert!(evaluate("'o''brien' == 'o''brien'").unwrap());
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        assert!(evaluate("true true").is_err());
        assert!(evaluate("'a' ==").is_err());
    }
}
