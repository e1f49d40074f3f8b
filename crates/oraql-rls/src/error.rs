//! Error types for WHERE-clause injection.

use thiserror::Error;

/// Errors that can occur while applying injectors.
#[derive(Debug, Error)]
pub enum InjectionError {
    /// A filter template or injector condition failed to resolve.
    #[error("invalid injector condition: {0}")]
    InvalidCondition(#[from] oraql_policy::PolicyError),
}
