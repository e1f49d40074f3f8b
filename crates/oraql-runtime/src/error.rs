//! The structured error surfaced to the transport layer.
//!
//! Pipeline stages return their own typed errors; this module folds them
//! into one tagged payload at the boundary. Every kind is terminal for
//! the request: failures are policy-definitive (deny) or data-definitive
//! (no match), never transient, so nothing is retried.

use oraql_policy::{AccessControlViolation, PolicyError};
use oraql_scope::ScopeError;
use serde_json::json;
use thiserror::Error;

/// Terminal pipeline errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Schema discovery or scope normalization failed.
    #[error(transparent)]
    Scope(#[from] ScopeError),

    /// The scope violates the tenant's access policy.
    #[error("{0}")]
    AccessDenied(AccessControlViolation),

    /// A condition failed strict resolution: an undefined named condition
    /// or an absent required claim.
    #[error("invalid condition: {0}")]
    InvalidCondition(String),

    /// An external collaborator failed (store, extractor, runner).
    #[error("upstream failure: {0}")]
    Upstream(#[from] anyhow::Error),
}

impl GatewayError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Scope(ScopeError::NoMatchingSchema { .. }) => "NO_MATCHING_SCHEMA",
            GatewayError::Scope(ScopeError::MultipleSchemas { .. }) => "MULTIPLE_SCHEMAS",
            GatewayError::Scope(ScopeError::NoColumnsRemain { .. }) => "NO_COLUMN_REMAIN",
            GatewayError::AccessDenied(_) => "ACCESS_DENIED",
            GatewayError::InvalidCondition(_) => "INVALID_CONDITION",
            GatewayError::Upstream(_) => "UPSTREAM_FAILURE",
        }
    }

    /// Serialize as the structured payload handed to the caller.
    pub fn to_payload(&self) -> serde_json::Value {
        let detail = match self {
            GatewayError::Scope(err) => serde_json::to_value(err).unwrap_or_default(),
            GatewayError::AccessDenied(report) => {
                serde_json::to_value(report).unwrap_or_default()
            }
            GatewayError::InvalidCondition(message) => json!({ "message": message }),
            GatewayError::Upstream(err) => json!({ "message": err.to_string() }),
        };
        json!({
            "kind": self.kind(),
            "message": self.to_string(),
            "detail": detail,
        })
    }
}

impl From<PolicyError> for GatewayError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::AccessDenied(report) => GatewayError::AccessDenied(report),
            PolicyError::InvalidCondition(message) => GatewayError::InvalidCondition(message),
        }
    }
}

impl From<oraql_rls::InjectionError> for GatewayError {
    fn from(err: oraql_rls::InjectionError) -> Self {
        match err {
            oraql_rls::InjectionError::InvalidCondition(inner) => inner.into(),
        }
    }
}
