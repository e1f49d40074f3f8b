//! # oraql-scope
//!
//! Schema discovery and query-scope normalization.
//!
//! Two stages of the pipeline live here:
//! - `matcher`: scores each candidate tenant schema against the requested
//!   tables/columns and selects a unique best match (or reports ambiguity
//!   or no match)
//! - `resolver`: soft plural/singular correction of table names before
//!   matching, and post-match normalization (sensitive-column stripping,
//!   missing-column dropping, wildcard expansion) against the one matched
//!   schema

pub mod error;
pub mod matcher;
pub mod resolver;

pub use error::ScopeError;
pub use matcher::{match_scope, SchemaMatch};
pub use resolver::{normalize_scope, soft_correct_tables, NormalizedScope, SoftFix};
