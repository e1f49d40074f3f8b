//! # oraql-core
//!
//! Shared data model for the Oraql NL-to-SQL gateway.
//!
//! This crate defines the types that flow through the query pipeline:
//! - [`QueryScope`]: the inferred tables/columns a request refers to
//! - [`Schema`]: a tenant's relational schema (tables, columns, synonyms)
//! - [`Ruleset`]: a tenant's access-control and row-filter policy
//! - [`Session`]: the authenticated caller and its claims
//! - [`ScopeSettings`]: typed per-tenant pipeline toggles
//!
//! Schemas and rulesets are tenant-owned and loaded from YAML or JSON
//! documents; the pipeline only ever reads them. The query scope is the one
//! value that changes shape as it moves through the pipeline stages.

pub mod error;
pub mod ruleset;
pub mod schema;
pub mod scope;
pub mod session;
pub mod settings;

pub use error::ConfigError;
pub use ruleset::{
    AccessList, GroupCriteria, GroupPolicy, Injector, InjectorTable, Ruleset, TableRule,
    UserPolicy,
};
pub use schema::{Column, Schema, Table};
pub use scope::{QueryScope, ScopeEntities};
pub use session::Session;
pub use settings::ScopeSettings;
