//! Schema discovery: score candidate schemas against a query scope.
//!
//! Scoring is +2 per exact table-name intersection and +1 per column
//! intersection. Wildcard columns are expanded against each candidate's
//! own table/column set, so the same scope can legitimately score
//! differently per candidate; the score reflects fit under that schema's
//! shape. Schemas scoring zero are excluded.

use std::collections::BTreeSet;

use oraql_core::schema::Schema;
use oraql_core::scope::{split_column_ref, QueryScope};
use tracing::debug;

/// Outcome of schema discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaMatch {
    /// Exactly one schema scored highest.
    One(String),
    /// Multiple schemas tied at the highest score. The caller must treat
    /// this as ambiguous; multi-schema queries are unsupported.
    Ambiguous(Vec<String>),
    /// No schema scored at all.
    None,
}

/// Score every candidate and select the best match.
///
/// When scores tie, all tied names are returned so the caller can
/// distinguish a single winner from an ambiguous scope.
pub fn match_scope(
    scope: &QueryScope,
    candidates: &[Schema],
    ignore_wildcards: bool,
) -> SchemaMatch {
    let mut scored: Vec<(&str, usize)> = Vec::new();
    for schema in candidates {
        let score = score_schema(scope, schema, ignore_wildcards);
        debug!(schema = %schema.name, score, "scored candidate schema");
        if score > 0 {
            scored.push((&schema.name, score));
        }
    }

    let Some(best) = scored.iter().map(|(_, s)| *s).max() else {
        return SchemaMatch::None;
    };
    let winners: Vec<String> = scored
        .iter()
        .filter(|(_, s)| *s == best)
        .map(|(name, _)| name.to_string())
        .collect();

    match winners.as_slice() {
        [single] => SchemaMatch::One(single.clone()),
        _ => SchemaMatch::Ambiguous(winners),
    }
}

/// Score one candidate: table intersections count double, column
/// intersections (wildcard-expanded against this candidate) count single.
fn score_schema(scope: &QueryScope, schema: &Schema, ignore_wildcards: bool) -> usize {
    let unique_tables: BTreeSet<&String> = scope.entities.tables.iter().collect();
    let matched_tables = unique_tables
        .iter()
        .filter(|t| schema.has_table(t.as_str()))
        .count();

    let mut matched_columns: BTreeSet<String> = BTreeSet::new();
    for reference in &scope.entities.columns {
        if reference == "*" {
            if ignore_wildcards {
                continue;
            }
            for table_name in &scope.entities.tables {
                expand_table(schema, table_name, &mut matched_columns);
            }
        } else if let Some((table, column)) = split_column_ref(reference) {
            if column == "*" {
                if !ignore_wildcards {
                    expand_table(schema, table, &mut matched_columns);
                }
            } else if schema
                .table(table)
                .is_some_and(|t| t.columns.contains_key(column))
            {
                matched_columns.insert(reference.clone());
            }
        }
    }

    matched_tables * 2 + matched_columns.len()
}

fn expand_table(schema: &Schema, table_name: &str, out: &mut BTreeSet<String>) {
    if let Some(table) = schema.table(table_name) {
        for column in table.columns.keys() {
            out.insert(format!("{table_name}.{column}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(name: &str, yaml_tables: &str) -> Schema {
        Schema::from_yaml(&format!("name: {name}\ntables:\n{yaml_tables}")).unwrap()
    }

    fn sales() -> Schema {
        schema(
            "sales",
            r#"
  users:
    columns:
      id: {}
      name: {}
  orders:
    columns:
      id: {}
      status: {}
"#,
        )
    }

    fn hr() -> Schema {
        schema(
            "hr",
            r#"
  employees:
    columns:
      id: {}
      name: {}
"#,
        )
    }

    fn scope(tables: &[&str], columns: &[&str]) -> QueryScope {
        QueryScope::new(
            "test",
            tables.iter().map(|s| s.to_string()).collect(),
            columns.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_unique_best_match() {
        let candidates = vec![sales(), hr()];
        let result = match_scope(&scope(&["users"], &["users.id"]), &candidates, false);
        assert_eq!(result, SchemaMatch::One("sales".to_string()));
    }

    #[test]
    fn test_no_match() {
        let candidates = vec![sales(), hr()];
        let result = match_scope(&scope(&["invoices"], &["invoices.id"]), &candidates, false);
        assert_eq!(result, SchemaMatch::None);
    }

    #[test]
    fn test_ambiguous_tie_returns_all_names() {
        // Both schemas contain an identically-shaped table.
        let a = schema("a", "  users:\n    columns:\n      id: {}\n");
        let b = schema("b", "  users:\n    columns:\n      id: {}\n");
        let result = match_scope(&scope(&["users"], &["users.id"]), &[a, b], false);
        let SchemaMatch::Ambiguous(mut names) = result else {
            panic!("expected ambiguous match");
        };
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_wildcard_scores_per_candidate() {
        // users.* expands to 2 columns in sales, so sales outscores a
        // schema with a single-column users table.
        let narrow = schema("narrow", "  users:\n    columns:\n      id: {}\n");
        let candidates = vec![sales(), narrow];
        let result = match_scope(&scope(&["users"], &["users.*"]), &candidates, false);
        assert_eq!(result, SchemaMatch::One("sales".to_string()));
    }

    #[test]
    fn test_ignore_wildcards_drops_wildcard_scoring() {
        let narrow = schema("narrow", "  users:\n    columns:\n      id: {}\n");
        let candidates = vec![sales(), narrow];
        // With wildcards ignored both candidates score only the table.
        let result = match_scope(&scope(&["users"], &["users.*"]), &candidates, true);
        assert!(matches!(result, SchemaMatch::Ambiguous(_)));
    }

    #[test]
    fn test_scoring_example_table_plus_column() {
        // Table (+2) and one column (+1) → 3, uniquely selecting sales.
        let candidates = vec![sales(), hr()];
        let result = match_scope(&scope(&["users"], &["users.id"]), &candidates, false);
        assert_eq!(result, SchemaMatch::One("sales".to_string()));
    }

    #[test]
    fn test_adding_matching_column_never_lowers_rank() {
        let candidates = vec![sales(), hr()];
        let base = scope(&["users"], &["users.id"]);
        let richer = scope(&["users"], &["users.id", "users.name"]);

        assert_eq!(
            match_scope(&base, &candidates, false),
            SchemaMatch::One("sales".to_string())
        );
        assert_eq!(
            match_scope(&richer, &candidates, false),
            SchemaMatch::One("sales".to_string())
        );
    }
}
