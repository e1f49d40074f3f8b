//! Placeholder resolution for conditions and filter templates.
//!
//! Expressions reference session claims as `${jwt.PATH}` and named ruleset
//! conditions as `${conditions.NAME}`. Resolution parses the input into a
//! typed token list and substitutes in two passes: condition references
//! first (recursively, since a named condition may itself reference
//! claims), then claim references. Working on tokens rather than repeated
//! string replacement guarantees termination and rules out partial or
//! overlapping substitutions.
//!
//! Strict mode fails closed: an undefined condition name or an absent
//! claim raises [`PolicyError::InvalidCondition`]. Advisory mode is used
//! for look-ahead matching (group criteria, injector conditions): an
//! absent claim becomes the null literal and any evaluation error is
//! logged and treated as false, so a malformed group policy fails to match
//! instead of denying the request outright.

use std::collections::HashMap;

use oraql_core::Session;
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::error::PolicyError;
use crate::expr;

/// Maximum depth of nested `${conditions.*}` references.
const MAX_CONDITION_DEPTH: usize = 16;

/// How unresolvable references are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Fail closed: unresolved references are errors.
    Strict,
    /// Degrade: absent claims become null, evaluation errors become false.
    Advisory,
}

/// How resolved claim values are rendered into the output string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralFormat {
    /// SQL literals: strings single-quoted with `'` doubled, `NULL`,
    /// `TRUE`/`FALSE`, lists as parenthesized tuples.
    Sql,
    /// Expression-language literals: strings quoted, `null`,
    /// `true`/`false`, lists bracketed.
    Expression,
}

/// One piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Verbatim text.
    Literal(String),
    /// A `${jwt.PATH}` claim reference.
    JwtRef(String),
    /// A `${conditions.NAME}` reference.
    ConditionRef(String),
}

/// Resolves and evaluates condition expressions for one session.
pub struct ConditionResolver<'a> {
    session: &'a Session,
    conditions: &'a HashMap<String, String>,
}

impl<'a> ConditionResolver<'a> {
    /// Create a resolver over a session and the ruleset's named conditions.
    pub fn new(session: &'a Session, conditions: &'a HashMap<String, String>) -> Self {
        Self {
            session,
            conditions,
        }
    }

    /// Substitute all placeholders in `input`, returning the resolved
    /// string. Condition references are resolved first (recursively), then
    /// claim references are formatted per `format`.
    pub fn resolve(
        &self,
        input: &str,
        mode: ResolveMode,
        format: LiteralFormat,
    ) -> Result<String, PolicyError> {
        let expanded = self.expand_conditions(input, mode, 0)?;
        let tokens = tokenize(&expanded)?;

        let mut out = String::with_capacity(expanded.len());
        for token in tokens {
            match token {
                Token::Literal(text) => out.push_str(&text),
                Token::ConditionRef(name) => {
                    // expand_conditions left this behind only in advisory
                    // mode; render it as the unmatched token.
                    debug_assert!(mode == ResolveMode::Advisory, "condition ref survived expansion");
                    debug!(condition = %name, "undefined condition treated as null");
                    out.push_str(null_literal(format));
                }
                Token::JwtRef(path) => match self.session.lookup_claim(&path) {
                    Some(value) => out.push_str(&format_json(value, format)?),
                    None => match mode {
                        ResolveMode::Strict => {
                            return Err(PolicyError::InvalidCondition(format!(
                                "session claim not found: jwt.{path}"
                            )))
                        }
                        ResolveMode::Advisory => {
                            debug!(path = %path, "absent claim treated as null");
                            out.push_str(null_literal(format));
                        }
                    },
                },
            }
        }
        Ok(out)
    }

    /// Resolve and evaluate `input` as a boolean expression.
    ///
    /// In strict mode any resolution or evaluation failure propagates. In
    /// advisory mode failures are logged and the condition is false.
    pub fn evaluate(&self, input: &str, mode: ResolveMode) -> Result<bool, PolicyError> {
        let result = self
            .resolve(input, mode, LiteralFormat::Expression)
            .and_then(|resolved| {
                let normalized = expr::normalize_operators(&resolved);
                debug!(condition = %input, resolved = %normalized, "evaluating condition");
                expr::evaluate(&normalized)
            });

        match (result, mode) {
            (Ok(value), _) => Ok(value),
            (Err(err), ResolveMode::Strict) => Err(err),
            (Err(err), ResolveMode::Advisory) => {
                warn!(condition = %input, error = %err, "condition failed to evaluate, treating as false");
                Ok(false)
            }
        }
    }

    /// Replace `${conditions.NAME}` references with their bodies, which may
    /// themselves reference further conditions. Depth-limited so that a
    /// cyclic ruleset terminates with an error rather than recursing.
    fn expand_conditions(
        &self,
        input: &str,
        mode: ResolveMode,
        depth: usize,
    ) -> Result<String, PolicyError> {
        if depth > MAX_CONDITION_DEPTH {
            return Err(PolicyError::InvalidCondition(
                "condition references nested too deeply (cycle?)".to_string(),
            ));
        }

        let tokens = tokenize(input)?;
        if !tokens.iter().any(|t| matches!(t, Token::ConditionRef(_))) {
            return Ok(input.to_string());
        }

        let mut out = String::with_capacity(input.len());
        for token in tokens {
            match token {
                Token::Literal(text) => out.push_str(&text),
                Token::JwtRef(path) => {
                    // Left for the claim pass.
                    out.push_str("${jwt.");
                    out.push_str(&path);
                    out.push('}');
                }
                Token::ConditionRef(name) => match self.conditions.get(&name) {
                    Some(body) => {
                        let expanded = self.expand_conditions(body, mode, depth + 1)?;
                        out.push_str(&expanded);
                    }
                    None => match mode {
                        ResolveMode::Strict => {
                            return Err(PolicyError::InvalidCondition(format!(
                                "named condition not defined: {name}"
                            )))
                        }
                        ResolveMode::Advisory => {
                            // Preserve the token; the claim pass renders it
                            // as null.
                            out.push_str("${conditions.");
                            out.push_str(&name);
                            out.push('}');
                        }
                    },
                },
            }
        }
        Ok(out)
    }
}

/// Parse a template into literal text and placeholder tokens.
fn tokenize(input: &str) -> Result<Vec<Token>, PolicyError> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        literal.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(PolicyError::InvalidCondition(format!(
                "unterminated placeholder in: {input}"
            )));
        };
        let body = &after[..end];

        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(&mut literal)));
        }
        if let Some(path) = body.strip_prefix("jwt.") {
            tokens.push(Token::JwtRef(path.to_string()));
        } else if let Some(name) = body.strip_prefix("conditions.") {
            tokens.push(Token::ConditionRef(name.to_string()));
        } else {
            return Err(PolicyError::InvalidCondition(format!(
                "unknown placeholder namespace: ${{{body}}}"
            )));
        }
        rest = &after[end + 1..];
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    Ok(tokens)
}

fn null_literal(format: LiteralFormat) -> &'static str {
    match format {
        LiteralFormat::Sql => "NULL",
        LiteralFormat::Expression => "null",
    }
}

/// Render a claim value as a literal in the requested format.
fn format_json(value: &Json, format: LiteralFormat) -> Result<String, PolicyError> {
    match value {
        Json::Null => Ok(null_literal(format).to_string()),
        Json::Bool(b) => Ok(match format {
            LiteralFormat::Sql => {
                if *b {
                    "TRUE".to_string()
                } else {
                    "FALSE".to_string()
                }
            }
            LiteralFormat::Expression => b.to_string(),
        }),
        Json::Number(n) => Ok(n.to_string()),
        Json::String(s) => Ok(quote_str(s)),
        Json::Array(items) => {
            let rendered: Result<Vec<String>, PolicyError> =
                items.iter().map(|v| format_json(v, format)).collect();
            let rendered = rendered?;
            Ok(match format {
                LiteralFormat::Sql => format!("({})", rendered.join(", ")),
                LiteralFormat::Expression => format!("[{}]", rendered.join(", ")),
            })
        }
        Json::Object(_) => Err(PolicyError::InvalidCondition(
            "cannot substitute an object-valued claim into a condition".to_string(),
        )),
    }
}

/// Single-quote a string with embedded quotes doubled (SQL-style). The
/// expression lexer understands the same escaping.
fn quote_str(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
