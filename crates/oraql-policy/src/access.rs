//! Scope-level access-control enforcement.
//!
//! The resolver walks an already-schema-matched query scope against the
//! three policy tiers. For each table: a wildcard global deny refuses the
//! table outright; otherwise a user-specific rule, the first matching
//! group, or the global rule grants access; with no grant the table is a
//! MISSING_PERMISSION violation. Columns of granted tables are checked
//! against the merged allow/deny sets. All violations are accumulated
//! across every table and column before a single structured report is
//! raised; a table-level violation suppresses that table's column checks.

use serde_json::Value as Json;
use tracing::debug;

use oraql_core::ruleset::{GroupCriteria, Ruleset, TableRule};
use oraql_core::schema::{Schema, Table};
use oraql_core::scope::{split_column_ref, QueryScope};
use oraql_core::Session;

use crate::error::{
    AccessControlViolation, PolicyError, PolicyTier, ViolationReason, ViolationRecord,
};
use crate::merge::merge_table_access;
use crate::template::{ConditionResolver, ResolveMode};

/// Enforces a tenant's ruleset against one request's scope.
pub struct AccessControlResolver<'a> {
    session: &'a Session,
    ruleset: &'a Ruleset,
    schema: &'a Schema,
}

/// The tier that granted access to a table.
#[derive(Debug, Clone)]
enum Grant<'a> {
    User(&'a TableRule),
    Group(String, &'a TableRule),
    Global,
}

impl<'a> AccessControlResolver<'a> {
    /// Create a resolver for one request.
    pub fn new(session: &'a Session, ruleset: &'a Ruleset, schema: &'a Schema) -> Self {
        Self {
            session,
            ruleset,
            schema,
        }
    }

    /// Check every table and column in the scope against the ruleset.
    ///
    /// Returns `Ok(true)` when the whole scope is permitted. Any violation
    /// refuses the entire request: the error carries one record per
    /// failure across all tables and columns.
    pub fn has_access_to_scope(&self, scope: &QueryScope) -> Result<bool, PolicyError> {
        let conditions = ConditionResolver::new(self.session, &self.ruleset.conditions);
        let mut report = AccessControlViolation::default();

        for table_name in &scope.entities.tables {
            let Some((canonical, table)) = self.schema.resolve_table(table_name) else {
                report.deny_table(ViolationRecord {
                    entity: table_name.clone(),
                    tier: PolicyTier::Global,
                    policy_name: None,
                    reason: ViolationReason::MissingPermission,
                    failed_condition: None,
                });
                continue;
            };

            let global_rule = self.ruleset.global_table_rule(canonical);

            // A wildcard global deny refuses the table unconditionally.
            if let Some(rule) = global_rule {
                if rule.deny.as_ref().is_some_and(|d| d.is_wildcard()) {
                    report.deny_table(ViolationRecord {
                        entity: table_name.clone(),
                        tier: PolicyTier::Global,
                        policy_name: None,
                        reason: ViolationReason::TableAccessDenied,
                        failed_condition: None,
                    });
                    continue;
                }
            }

            let grant = match self.resolve_grant(&conditions, canonical, global_rule)? {
                Ok(grant) => grant,
                Err(record) => {
                    report.deny_table(ViolationRecord {
                        entity: table_name.clone(),
                        ..record
                    });
                    // Table violation suppresses this table's column checks.
                    continue;
                }
            };
            debug!(table = canonical, grant = ?grant_tier(&grant), "table access granted");

            self.check_columns(scope, table_name, canonical, table, global_rule, &grant, &mut report);
        }

        if report.is_empty() {
            Ok(true)
        } else {
            Err(PolicyError::AccessDenied(report))
        }
    }

    /// Find the tier granting access to a table, or the violation record
    /// explaining why none does.
    fn resolve_grant(
        &self,
        conditions: &ConditionResolver<'_>,
        table: &str,
        global_rule: Option<&'a TableRule>,
    ) -> Result<Result<Grant<'a>, ViolationRecord>, PolicyError> {
        // User tier shadows groups even when its condition fails.
        if let Some(rule) = self.ruleset.user_table_rule(&self.session.user_id, table) {
            return Ok(match self.rule_condition_holds(conditions, rule)? {
                true => Ok(Grant::User(rule)),
                false => Err(ViolationRecord {
                    entity: String::new(),
                    tier: PolicyTier::User,
                    policy_name: None,
                    reason: ViolationReason::MissingPermission,
                    failed_condition: rule.condition.clone(),
                }),
            });
        }

        for (name, group) in &self.ruleset.group_access_policy {
            let Some(rule) = group.tables.get(table) else {
                continue;
            };
            if !self.group_matches(conditions, name, &group.criteria)? {
                continue;
            }
            if !self.rule_condition_holds(conditions, rule)? {
                debug!(group = %name, table, "group rule condition false, skipping group");
                continue;
            }
            return Ok(Ok(Grant::Group(name.clone(), rule)));
        }

        if let Some(rule) = global_rule {
            if self.rule_condition_holds(conditions, rule)? {
                return Ok(Ok(Grant::Global));
            }
            return Ok(Err(ViolationRecord {
                entity: String::new(),
                tier: PolicyTier::Global,
                policy_name: None,
                reason: ViolationReason::MissingPermission,
                failed_condition: rule.condition.clone(),
            }));
        }

        Ok(Err(ViolationRecord {
            entity: String::new(),
            tier: PolicyTier::Global,
            policy_name: None,
            reason: ViolationReason::MissingPermission,
            failed_condition: None,
        }))
    }

    /// Evaluate a rule's gating condition (advisory; absent means true).
    fn rule_condition_holds(
        &self,
        conditions: &ConditionResolver<'_>,
        rule: &TableRule,
    ) -> Result<bool, PolicyError> {
        match &rule.condition {
            None => Ok(true),
            Some(expr) => conditions.evaluate(expr, ResolveMode::Advisory),
        }
    }

    /// Check whether the session belongs to a group: every matching
    /// criterion must equal the session's custom field (case-insensitive
    /// string compare) and the group condition, if any, must hold.
    fn group_matches(
        &self,
        conditions: &ConditionResolver<'_>,
        name: &str,
        criteria: &GroupCriteria,
    ) -> Result<bool, PolicyError> {
        for (key, expected) in &criteria.matching_criteria {
            let Some(actual) = self.session.custom_field(key) else {
                debug!(group = %name, key, "criterion field absent from session");
                return Ok(false);
            };
            if !json_as_string(actual).eq_ignore_ascii_case(&json_as_string(expected)) {
                debug!(group = %name, key, "criterion value mismatch");
                return Ok(false);
            }
        }
        match &criteria.condition {
            None => Ok(true),
            Some(expr) => conditions.evaluate(expr, ResolveMode::Advisory),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn check_columns(
        &self,
        scope: &QueryScope,
        requested_table: &str,
        canonical: &str,
        table: &Table,
        global_rule: Option<&TableRule>,
        grant: &Grant<'a>,
        report: &mut AccessControlViolation,
    ) {
        let (group_rule, user_rule) = match grant {
            Grant::User(rule) => (None, Some(*rule)),
            Grant::Group(_, rule) => (Some(*rule), None),
            Grant::Global => (None, None),
        };
        let merged = merge_table_access(global_rule, group_rule, user_rule, table);

        for reference in &scope.entities.columns {
            let Some((ref_table, column)) = split_column_ref(reference) else {
                continue;
            };
            if ref_table != requested_table && ref_table != canonical {
                continue;
            }
            // Wildcards are expanded or dropped before access control runs.
            if column == "*" {
                continue;
            }

            if merged.denied.contains(column) {
                report.deny_column(ViolationRecord {
                    entity: reference.clone(),
                    tier: self.deny_tier(canonical, column, grant),
                    policy_name: group_name(grant),
                    reason: ViolationReason::ColumnAccessDenied,
                    failed_condition: None,
                });
            } else if !merged.allowed.contains(column) {
                debug!(column = %reference, "column outside merged allow set");
                report.deny_column(ViolationRecord {
                    entity: reference.clone(),
                    tier: grant_tier(grant),
                    policy_name: group_name(grant),
                    reason: ViolationReason::MissingPermission,
                    failed_condition: None,
                });
            } else {
                debug!(column = %reference, "column allowed");
            }
        }
    }

    /// Attribute an explicit deny to the tier that carries it.
    fn deny_tier(&self, table: &str, column: &str, grant: &Grant<'_>) -> PolicyTier {
        let denies = |rule: Option<&TableRule>| {
            rule.and_then(|r| r.deny.as_ref()).is_some_and(|deny| {
                deny.is_wildcard()
                    || matches!(deny, oraql_core::ruleset::AccessList::Columns(c) if c.iter().any(|x| x == column))
            })
        };
        if denies(self.ruleset.global_table_rule(table)) {
            return PolicyTier::Global;
        }
        match grant {
            Grant::User(rule) if denies(Some(rule)) => PolicyTier::User,
            Grant::Group(_, rule) if denies(Some(rule)) => PolicyTier::Group,
            _ => PolicyTier::Global,
        }
    }
}

fn grant_tier(grant: &Grant<'_>) -> PolicyTier {
    match grant {
        Grant::User(_) => PolicyTier::User,
        Grant::Group(_, _) => PolicyTier::Group,
        Grant::Global => PolicyTier::Global,
    }
}

fn group_name(grant: &Grant<'_>) -> Option<String> {
    match grant {
        Grant::Group(name, _) => Some(name.clone()),
        _ => None,
    }
}

/// Render a JSON value as the string used in criteria comparison.
fn json_as_string(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}
