//! The query scope: which tables and columns a natural-language request
//! refers to.
//!
//! A raw scope is produced by the LLM extractor and is deliberately loose:
//! table names may be slightly wrong, columns may reference wildcards
//! (`orders.*`, `*`), and sensitive columns may be listed. Each pipeline
//! stage takes a scope and returns a corrected, narrower one; the scope is
//! never mutated in place.

use serde::{Deserialize, Serialize};

/// The inferred intent and entities of a user request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryScope {
    /// Short natural-language summary of what the user wants.
    #[serde(default)]
    pub intent: String,

    /// Tables and columns the request touches.
    pub entities: ScopeEntities,
}

/// Tables and columns referenced by a scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeEntities {
    /// Referenced table names.
    #[serde(default)]
    pub tables: Vec<String>,

    /// Referenced columns in `table.column` form. `table.*` and the bare
    /// `*` wildcard are allowed until wildcard expansion runs.
    #[serde(default)]
    pub columns: Vec<String>,

    /// Columns the extractor flagged as sensitive.
    #[serde(default)]
    pub sensitive_columns: Vec<String>,
}

impl QueryScope {
    /// Create a scope from an intent plus table and column lists.
    pub fn new(
        intent: impl Into<String>,
        tables: Vec<String>,
        columns: Vec<String>,
    ) -> Self {
        Self {
            intent: intent.into(),
            entities: ScopeEntities {
                tables,
                columns,
                sensitive_columns: Vec::new(),
            },
        }
    }

    /// Return a copy with a different column list.
    pub fn with_columns(&self, columns: Vec<String>) -> Self {
        let mut scope = self.clone();
        scope.entities.columns = columns;
        scope
    }

    /// Return a copy with a different table list.
    pub fn with_tables(&self, tables: Vec<String>) -> Self {
        let mut scope = self.clone();
        scope.entities.tables = tables;
        scope
    }
}

/// Split a `table.column` reference into its parts.
///
/// Returns `None` for the bare `*` wildcard or for tokens without a dot.
/// The column part may itself be `*`.
pub fn split_column_ref(reference: &str) -> Option<(&str, &str)> {
    let (table, column) = reference.split_once('.')?;
    if table.is_empty() || column.is_empty() {
        return None;
    }
    Some((table, column))
}
