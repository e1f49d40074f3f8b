//! Error and violation types for policy enforcement.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while resolving conditions or enforcing access policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A named condition is undefined, a required `${jwt.*}` field is
    /// absent during strict resolution, or a resolved expression failed to
    /// parse or evaluate.
    #[error("invalid condition: {0}")]
    InvalidCondition(String),

    /// The scope violates the tenant's access policy. Carries the full
    /// violation report; nothing is partially granted.
    #[error("{0}")]
    AccessDenied(AccessControlViolation),
}

/// The policy tier a decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyTier {
    Global,
    Group,
    User,
}

/// Why an entity was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationReason {
    /// No policy tier grants access to the entity.
    MissingPermission,
    /// The table is explicitly denied.
    TableAccessDenied,
    /// The column is explicitly denied.
    ColumnAccessDenied,
}

/// One denied table or column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    /// The refused entity (`table` or `table.column`).
    pub entity: String,

    /// The tier the refusal came from.
    pub tier: PolicyTier,

    /// Group name, when the tier is a group policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_name: Option<String>,

    /// The refusal reason.
    pub reason: ViolationReason,

    /// The condition that evaluated false, if one gated the rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_condition: Option<String>,
}

/// The full violation report for one request.
///
/// All violations across all tables and columns are accumulated before the
/// report is raised; a request either passes completely or is refused with
/// every failure listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlViolation {
    /// Tables the session may not query.
    pub denied_tables: Vec<String>,

    /// Columns (`table.column`) the session may not read.
    pub denied_columns: Vec<String>,

    /// One record per failure.
    pub violations: Vec<ViolationRecord>,
}

impl AccessControlViolation {
    /// Whether any violation was recorded.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Record a refused table.
    pub fn deny_table(&mut self, record: ViolationRecord) {
        if !self.denied_tables.contains(&record.entity) {
            self.denied_tables.push(record.entity.clone());
        }
        self.violations.push(record);
    }

    /// Record a refused column.
    pub fn deny_column(&mut self, record: ViolationRecord) {
        if !self.denied_columns.contains(&record.entity) {
            self.denied_columns.push(record.entity.clone());
        }
        self.violations.push(record);
    }
}

impl fmt::Display for AccessControlViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "access denied: {} violation(s) across {} table(s) and {} column(s)",
            self.violations.len(),
            self.denied_tables.len(),
            self.denied_columns.len()
        )
    }
}

impl std::error::Error for AccessControlViolation {}
