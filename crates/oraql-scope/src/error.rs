//! Error types for schema discovery and scope normalization.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while matching or normalizing a query scope. All are
/// terminal for the request; none is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeError {
    /// No candidate schema scored against the scope.
    #[error("no schema matches the requested tables {tables:?}")]
    NoMatchingSchema { tables: Vec<String> },

    /// More than one schema tied at the best score; multi-schema queries
    /// are unsupported.
    #[error("scope is ambiguous across schemas {candidates:?}")]
    MultipleSchemas { candidates: Vec<String> },

    /// Normalization left the scope without any column.
    #[error("no columns remain after resolving scope against schema '{schema}' (dropped: {dropped:?})")]
    NoColumnsRemain {
        schema: String,
        dropped: Vec<String>,
    },
}
