//! # oraql-policy
//!
//! Condition resolution and access-control enforcement for Oraql.
//!
//! This crate implements the security-relevant half of the pipeline:
//! - `template`: placeholder substitution (`${conditions.*}`, `${jwt.*}`)
//!   over a typed token list, in strict or advisory mode
//! - `expr`: a small sandboxed boolean-expression evaluator; ruleset text
//!   is tenant-authored and never handed to a general interpreter
//! - `merge`: global/group/user allow-deny merging with wildcard expansion
//! - `access`: the resolver that walks a query scope against all three
//!   policy tiers and accumulates a structured violation report

pub mod access;
pub mod error;
pub mod expr;
pub mod merge;
pub mod template;

pub use access::AccessControlResolver;
pub use error::{
    AccessControlViolation, PolicyError, PolicyTier, ViolationReason, ViolationRecord,
};
pub use merge::{merge_table_access, MergedAccess};
pub use template::{ConditionResolver, LiteralFormat, ResolveMode};
