//! # oraql-runtime
//!
//! Pipeline orchestration for Oraql.
//!
//! The pipeline turns a natural-language request into executed SQL:
//! scope inference (external) → soft table-name correction → schema
//! discovery → scope normalization → access control → SQL generation
//! (external) → WHERE-clause injection → execution (external).
//!
//! All external collaborators (schema/ruleset/settings stores, the LLM
//! scope extractor, the SQL generator and runner) sit behind async traits;
//! the pipeline itself is request-scoped and holds no state between
//! requests.

pub mod adapter;
pub mod error;
pub mod orchestrator;

pub use adapter::{RulesetStore, SchemaStore, ScopeExtractor, SettingsStore, SqlGenerator, SqlRunner};
pub use error::GatewayError;
pub use orchestrator::{Pipeline, PipelineOutcome};
