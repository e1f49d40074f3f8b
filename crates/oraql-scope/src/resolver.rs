//! Query-scope correction and normalization.
//!
//! Before matching, table names get a heuristic plural/singular fix
//! against the full candidate list. After a schema is matched, the scope
//! is normalized against it: sensitive columns stripped, unresolvable
//! columns dropped (synonyms count as resolvable), wildcards expanded or
//! discarded. Normalization must never proceed with an empty column set.

use std::collections::BTreeSet;

use oraql_core::schema::Schema;
use oraql_core::scope::{split_column_ref, QueryScope};
use oraql_core::ScopeSettings;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ScopeError;

/// One applied table-name correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftFix {
    /// The table name as requested.
    pub from: String,
    /// The table name substituted.
    pub to: String,
}

/// Result of post-match normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedScope {
    /// The normalized scope.
    pub scope: QueryScope,
    /// Columns dropped because they didn't resolve against the schema.
    pub dropped_missing: Vec<String>,
    /// Columns stripped because the schema flags them sensitive.
    pub dropped_sensitive: Vec<String>,
}

/// Heuristically correct table names against the candidate schemas.
///
/// For each requested table not found verbatim in any candidate, try
/// appending `s`, then stripping a trailing `s`; the first spelling that
/// resolves is substituted and column references are rewritten to match.
/// An exact name is never altered; a name with no correction passes
/// through unchanged for downstream validation to reject.
pub fn soft_correct_tables(
    scope: &QueryScope,
    candidates: &[Schema],
) -> (QueryScope, Vec<SoftFix>) {
    let known: BTreeSet<&str> = candidates
        .iter()
        .flat_map(|s| s.tables.keys())
        .map(String::as_str)
        .collect();

    let mut fixes = Vec::new();
    let mut tables = Vec::with_capacity(scope.entities.tables.len());
    for name in &scope.entities.tables {
        if known.contains(name.as_str()) {
            tables.push(name.clone());
            continue;
        }
        match soft_fix(name, &known) {
            Some(fixed) => {
                debug!(from = %name, to = %fixed, "soft-corrected table name");
                fixes.push(SoftFix {
                    from: name.clone(),
                    to: fixed.clone(),
                });
                tables.push(fixed);
            }
            None => tables.push(name.clone()),
        }
    }

    let columns = scope
        .entities
        .columns
        .iter()
        .map(|reference| rewrite_column(reference, &fixes))
        .collect();

    let mut corrected = scope.with_tables(tables);
    corrected.entities.columns = columns;
    (corrected, fixes)
}

fn soft_fix(name: &str, known: &BTreeSet<&str>) -> Option<String> {
    let plural = format!("{name}s");
    if known.contains(plural.as_str()) {
        return Some(plural);
    }
    let singular = name.strip_suffix('s')?;
    known.contains(singular).then(|| singular.to_string())
}

fn rewrite_column(reference: &str, fixes: &[SoftFix]) -> String {
    let Some((table, column)) = split_column_ref(reference) else {
        return reference.to_string();
    };
    for fix in fixes {
        if table == fix.from {
            return format!("{}.{}", fix.to, column);
        }
    }
    reference.to_string()
}

/// Normalize a scope against the matched schema, honoring the tenant's
/// toggles in fixed order: sensitive strip, missing drop, wildcard
/// expansion.
///
/// Fails with [`ScopeError::NoColumnsRemain`] when nothing survives; the
/// pipeline must never proceed with zero columns.
pub fn normalize_scope(
    scope: &QueryScope,
    schema: &Schema,
    settings: &ScopeSettings,
) -> Result<NormalizedScope, ScopeError> {
    let mut columns: Vec<String> = scope.entities.columns.clone();
    let mut dropped_missing = Vec::new();
    let mut dropped_sensitive = Vec::new();

    // 1. Strip columns the schema flags sensitive.
    if settings.remove_sensitive_columns {
        columns.retain(|reference| {
            let sensitive = split_column_ref(reference)
                .and_then(|(table, column)| {
                    schema.resolve_table(table).map(|(_, t)| t.is_sensitive(column))
                })
                .unwrap_or(false);
            if sensitive {
                debug!(column = %reference, "stripped sensitive column");
                dropped_sensitive.push(reference.clone());
            }
            !sensitive
        });
    }

    // 2. Drop references that don't resolve against the schema. Table
    // synonyms count as resolvable.
    if settings.remove_missing_columns {
        columns.retain(|reference| {
            let resolves = if reference == "*" {
                true
            } else {
                match split_column_ref(reference) {
                    Some((table, "*")) => schema.resolve_table(table).is_some(),
                    Some((table, column)) => schema.has_column(table, column),
                    None => false,
                }
            };
            if !resolves {
                debug!(column = %reference, "dropped column missing from schema");
                dropped_missing.push(reference.clone());
            }
            resolves
        });
    }

    // 3. Expand wildcards against the matched schema, or drop them when
    // wildcards are ignored.
    let mut expanded: Vec<String> = Vec::with_capacity(columns.len());
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut push = |expanded: &mut Vec<String>, reference: String| {
        if seen.insert(reference.clone()) {
            expanded.push(reference);
        }
    };
    for reference in &columns {
        let wildcard_tables: Option<Vec<&str>> = if reference == "*" {
            Some(scope.entities.tables.iter().map(String::as_str).collect())
        } else {
            match split_column_ref(reference) {
                Some((table, "*")) => Some(vec![table]),
                _ => None,
            }
        };

        let Some(wildcard_tables) = wildcard_tables else {
            push(&mut expanded, reference.clone());
            continue;
        };
        if settings.ignore_column_wildcards {
            debug!(column = %reference, "dropped wildcard (wildcards ignored)");
            continue;
        }
        for table_name in wildcard_tables {
            let Some((canonical, table)) = schema.resolve_table(table_name) else {
                continue;
            };
            for (column, def) in &table.columns {
                if settings.remove_sensitive_columns && def.is_sensitive_column {
                    continue;
                }
                push(&mut expanded, format!("{canonical}.{column}"));
            }
        }
    }

    if expanded.is_empty() {
        return Err(ScopeError::NoColumnsRemain {
            schema: schema.name.clone(),
            dropped: dropped_missing,
        });
    }

    Ok(NormalizedScope {
        scope: scope.with_columns(expanded),
        dropped_missing,
        dropped_sensitive,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::from_yaml(
            r#"
name: sales
tables:
  users:
    synonyms: [accounts]
    columns:
      id: {}
      name: {}
      password:
        is_sensitive_column: true
  orders:
    columns:
      id: {}
      status: {}
"#,
        )
        .unwrap()
    }

    fn scope(tables: &[&str], columns: &[&str]) -> QueryScope {
        QueryScope::new(
            "test",
            tables.iter().map(|s| s.to_string()).collect(),
            columns.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_soft_fix_pluralizes() {
        let candidates = vec![schema()];
        let (fixed, fixes) = soft_correct_tables(&scope(&["user"], &["user.id"]), &candidates);

        assert_eq!(fixed.entities.tables, vec!["users"]);
        assert_eq!(fixed.entities.columns, vec!["users.id"]);
        assert_eq!(
            fixes,
            vec![SoftFix {
                from: "user".to_string(),
                to: "users".to_string()
            }]
        );
    }

    #[test]
    fn test_soft_fix_singularizes() {
        let candidates = vec![Schema::from_yaml(
            "name: s\ntables:\n  order:\n    columns:\n      id: {}\n",
        )
        .unwrap()];
        let (fixed, _) = soft_correct_tables(&scope(&["orders"], &["orders.id"]), &candidates);
        assert_eq!(fixed.entities.tables, vec!["order"]);
        assert_eq!(fixed.entities.columns, vec!["order.id"]);
    }

    #[test]
    fn test_exact_name_never_altered() {
        let candidates = vec![schema()];
        let (fixed, fixes) = soft_correct_tables(&scope(&["orders"], &["orders.id"]), &candidates);
        assert_eq!(fixed.entities.tables, vec!["orders"]);
        assert!(fixes.is_empty());
    }

    #[test]
    fn test_unknown_name_passes_through() {
        let candidates = vec![schema()];
        let (fixed, fixes) =
            soft_correct_tables(&scope(&["invoices"], &["invoices.id"]), &candidates);
        assert_eq!(fixed.entities.tables, vec!["invoices"]);
        assert!(fixes.is_empty());
    }

    #[test]
    fn test_normalize_strips_sensitive_and_missing() {
        let normalized = normalize_scope(
            &scope(
                &["users"],
                &["users.id", "users.password", "users.ghost", "users.name"],
            ),
            &schema(),
            &ScopeSettings::default(),
        )
        .unwrap();

        assert_eq!(
            normalized.scope.entities.columns,
            vec!["users.id", "users.name"]
        );
        assert_eq!(normalized.dropped_sensitive, vec!["users.password"]);
        assert_eq!(normalized.dropped_missing, vec!["users.ghost"]);
    }

    #[test]
    fn test_wildcard_expansion_excludes_sensitive() {
        let normalized = normalize_scope(
            &scope(&["users"], &["users.*"]),
            &schema(),
            &ScopeSettings::default(),
        )
        .unwrap();
        assert_eq!(
            normalized.scope.entities.columns,
            vec!["users.id", "users.name"]
        );
    }

    #[test]
    fn test_wildcard_expansion_is_idempotent() {
        let settings = ScopeSettings::default();
        let once = normalize_scope(&scope(&["users"], &["users.*"]), &schema(), &settings).unwrap();
        let twice = normalize_scope(&once.scope, &schema(), &settings).unwrap();
        assert_eq!(once.scope.entities.columns, twice.scope.entities.columns);
    }

    #[test]
    fn test_global_wildcard_expands_scope_tables() {
        let normalized = normalize_scope(
            &scope(&["users", "orders"], &["*"]),
            &schema(),
            &ScopeSettings::default(),
        )
        .unwrap();
        assert_eq!(
            normalized.scope.entities.columns,
            vec!["users.id", "users.name", "orders.id", "orders.status"]
        );
    }

    #[test]
    fn test_ignored_wildcards_are_dropped() {
        let settings = ScopeSettings {
            ignore_column_wildcards: true,
            ..Default::default()
        };
        let normalized = normalize_scope(
            &scope(&["users"], &["users.id", "users.*"]),
            &schema(),
            &settings,
        )
        .unwrap();
        assert_eq!(normalized.scope.entities.columns, vec!["users.id"]);
    }

    #[test]
    fn test_synonym_table_resolves_and_expands_canonically() {
        let normalized = normalize_scope(
            &scope(&["accounts"], &["accounts.*"]),
            &schema(),
            &ScopeSettings::default(),
        )
        .unwrap();
        assert_eq!(
            normalized.scope.entities.columns,
            vec!["users.id", "users.name"]
        );
    }

    #[test]
    fn test_empty_result_is_an_error() {
        let err = normalize_scope(
            &scope(&["users"], &["users.ghost", "users.phantom"]),
            &schema(),
            &ScopeSettings::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ScopeError::NoColumnsRemain {
                schema: "sales".to_string(),
                dropped: vec!["users.ghost".to_string(), "users.phantom".to_string()],
            }
        );
    }
}
