//! Injector resolution: conditional rewriting of generated SQL.

use oraql_core::{Ruleset, ScopeSettings, Session};
use oraql_policy::{ConditionResolver, LiteralFormat, ResolveMode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::InjectionError;

/// Applies ruleset injectors to generated SQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct InjectorResolver;

/// Result of injector application. Serializable for audit records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionResult {
    /// The SQL handed in.
    pub original_sql: String,
    /// The rewritten SQL.
    pub sql: String,
    /// The combined clause that was appended, for audit and response
    /// purposes. `None` when no injector applied.
    pub injected_clause: Option<String>,
}

impl InjectorResolver {
    /// Create a new injector resolver.
    pub fn new() -> Self {
        Self
    }

    /// Apply the ruleset's injectors to `sql` for this session.
    ///
    /// With dynamic injection disabled, any existing WHERE clause is
    /// stripped and nothing is injected. Otherwise each enabled injector
    /// whose condition holds contributes the filter templates of every
    /// table that appears in the SQL text; all clauses are joined with
    /// `AND` and appended.
    pub fn apply(
        &self,
        sql: &str,
        ruleset: &Ruleset,
        session: &Session,
        settings: &ScopeSettings,
    ) -> Result<InjectionResult, InjectionError> {
        if !settings.dynamic_injection {
            let stripped = strip_where_clause(sql);
            if stripped != sql {
                debug!("dynamic injection disabled, stripped WHERE clause");
            }
            return Ok(InjectionResult {
                original_sql: sql.to_string(),
                sql: stripped,
                injected_clause: None,
            });
        }

        let resolver = ConditionResolver::new(session, &ruleset.conditions);
        let mut clauses: Vec<String> = Vec::new();

        for (name, injector) in &ruleset.injectors {
            if !injector.enabled {
                continue;
            }
            let applies = match &injector.condition {
                None => true,
                Some(condition) => resolver.evaluate(condition, ResolveMode::Advisory)?,
            };
            if !applies {
                debug!(injector = %name, "injector condition false, skipping");
                continue;
            }

            for (table, filter) in &injector.tables {
                // Deliberately a raw text check, not a parse: the table
                // must literally appear in the SQL.
                if !sql.contains(table.as_str()) {
                    continue;
                }
                let clause =
                    resolver.resolve(&filter.filters, ResolveMode::Strict, LiteralFormat::Sql)?;
                debug!(injector = %name, table = %table, clause = %clause, "injector matched");
                clauses.push(clause);
            }
        }

        if clauses.is_empty() {
            return Ok(InjectionResult {
                original_sql: sql.to_string(),
                sql: sql.to_string(),
                injected_clause: None,
            });
        }

        let combined = clauses.join(" AND ");
        let rewritten = append_clause(sql, &combined);
        Ok(InjectionResult {
            original_sql: sql.to_string(),
            sql: rewritten,
            injected_clause: Some(combined),
        })
    }
}

/// Remove everything from `WHERE` (case-insensitive) to the trailing
/// semicolon, keeping the semicolon.
fn strip_where_clause(sql: &str) -> String {
    let Some(pos) = find_keyword(sql, "where") else {
        return sql.to_string();
    };
    let head = sql[..pos].trim_end();
    if sql.trim_end().ends_with(';') {
        format!("{head};")
    } else {
        head.to_string()
    }
}

/// Append a filter clause: `AND` onto an existing WHERE, otherwise a new
/// WHERE. A trailing semicolon stays trailing.
fn append_clause(sql: &str, clause: &str) -> String {
    let trimmed = sql.trim_end();
    let (body, terminator) = match trimmed.strip_suffix(';') {
        Some(body) => (body.trim_end(), ";"),
        None => (trimmed, ""),
    };
    let keyword = if find_keyword(body, "where").is_some() {
        "AND"
    } else {
        "WHERE"
    };
    format!("{body} {keyword} {clause}{terminator}")
}

/// Find a standalone SQL keyword, case-insensitively. A match inside an
/// identifier (`wherehouse`) does not count.
fn find_keyword(haystack: &str, keyword: &str) -> Option<usize> {
    let lower = haystack.to_ascii_lowercase();
    let keyword = keyword.to_ascii_lowercase();
    let mut from = 0;
    while let Some(offset) = lower[from..].find(&keyword) {
        let pos = from + offset;
        let end = pos + keyword.len();
        let bounded_left = pos == 0 || !is_ident_char(lower.as_bytes()[pos - 1]);
        let bounded_right = end == lower.len() || !is_ident_char(lower.as_bytes()[end]);
        if bounded_left && bounded_right {
            return Some(pos);
        }
        from = pos + 1;
    }
    None
}

fn is_ident_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}
