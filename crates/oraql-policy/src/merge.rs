//! Allow/deny merging across policy tiers for one table.
//!
//! Precedence:
//! - The global `allow` list is the ceiling: nothing outside it is ever
//!   granted. The global `deny` is unconditional.
//! - A user-specific rule for the table shadows group rules entirely; its
//!   `allow` (wildcard-expanded) is intersected with the ceiling and its
//!   `deny` is unioned in.
//! - Without a user rule, the group rule's `allow`/`deny`
//!   (wildcard-expanded) are unioned in.
//! - Deny always wins over allow, at any tier.
//!
//! Wildcards are expanded against the table's live column set here, never
//! at rule-storage time.

use std::collections::BTreeSet;

use oraql_core::ruleset::{AccessList, TableRule};
use oraql_core::schema::Table;
use tracing::debug;

/// The merged column grants for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedAccess {
    /// Columns the session may read (`allowed - denied`).
    pub allowed: BTreeSet<String>,
    /// Columns explicitly denied at any tier.
    pub denied: BTreeSet<String>,
}

/// Merge global, group, and user rules for one table into final
/// allow/deny sets.
pub fn merge_table_access(
    global: Option<&TableRule>,
    group: Option<&TableRule>,
    user: Option<&TableRule>,
    table: &Table,
) -> MergedAccess {
    let all_columns: BTreeSet<String> = table.columns.keys().cloned().collect();

    // The ceiling is the global allow set; a wildcard (or absent global
    // rule) leaves it unconstrained.
    let global_allow = global.and_then(|rule| rule.allow.as_ref());
    let ceiling: BTreeSet<String> = match global_allow {
        Some(AccessList::Columns(columns)) => columns.iter().cloned().collect(),
        _ => all_columns.clone(),
    };

    let mut denied = expand(global.and_then(|rule| rule.deny.as_ref()), &all_columns);

    let allowed: BTreeSet<String> = if let Some(user_rule) = user {
        // User tier shadows groups. An allow-less user rule inherits the
        // ceiling rather than granting nothing.
        let user_allow = match user_rule.allow.as_ref() {
            Some(list) => expand(Some(list), &all_columns),
            None => ceiling.clone(),
        };
        denied.extend(expand(user_rule.deny.as_ref(), &all_columns));
        user_allow.intersection(&ceiling).cloned().collect()
    } else if let Some(group_rule) = group {
        // An explicit global list seeds the allow set; a global wildcard
        // defers to the group's explicit list.
        let base: BTreeSet<String> = match global_allow {
            Some(AccessList::Columns(columns)) => columns.iter().cloned().collect(),
            _ => BTreeSet::new(),
        };
        denied.extend(expand(group_rule.deny.as_ref(), &all_columns));
        let unioned: BTreeSet<String> = base
            .union(&expand(group_rule.allow.as_ref(), &all_columns))
            .cloned()
            .collect();
        unioned.intersection(&ceiling).cloned().collect()
    } else {
        ceiling.clone()
    };

    let merged = MergedAccess {
        allowed: allowed.difference(&denied).cloned().collect(),
        denied,
    };
    debug!(
        allowed = ?merged.allowed,
        denied = ?merged.denied,
        "merged table access"
    );
    merged
}

/// Expand an access list against the table's column set. Absent lists
/// expand to nothing.
fn expand(list: Option<&AccessList>, all_columns: &BTreeSet<String>) -> BTreeSet<String> {
    match list {
        None => BTreeSet::new(),
        Some(AccessList::Wildcard(_)) => all_columns.clone(),
        Some(AccessList::Columns(columns)) => columns.iter().cloned().collect(),
    }
}
