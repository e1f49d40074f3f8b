//! Ruleset types: a tenant's access-control and row-filter policy.
//!
//! A ruleset is bound 1:1 to a schema by name and holds three tiers of
//! access policy (global, group, user-specific), a set of named reusable
//! conditions, and the dynamic WHERE-clause injectors. Rules store the `*`
//! wildcard verbatim; it is expanded against the live table schema at
//! evaluation time, never at load time.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// A tenant ruleset, bound to the schema of the same name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ruleset {
    /// Ruleset name; must equal the name of the schema it governs.
    pub name: String,

    /// Named reusable condition expressions, referenced from rules and
    /// injectors as `${conditions.NAME}`.
    #[serde(default)]
    pub conditions: HashMap<String, String>,

    /// Baseline policy applied to every request.
    #[serde(default)]
    pub global_access_policy: GlobalAccessPolicy,

    /// Group policies keyed by group name. Evaluated in name order; the
    /// first group whose criteria match the session wins.
    #[serde(default)]
    pub group_access_policy: BTreeMap<String, GroupPolicy>,

    /// Per-user overrides. A user entry for a table shadows any group
    /// policy for that table.
    #[serde(default)]
    pub user_specific_access_policy: Vec<UserPolicy>,

    /// Dynamic WHERE-clause injectors keyed by name, applied in name order.
    #[serde(default)]
    pub injectors: BTreeMap<String, Injector>,
}

/// The global tier of the access policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalAccessPolicy {
    /// Table rules keyed by table name.
    #[serde(default)]
    pub tables: BTreeMap<String, TableRule>,
}

/// A group policy: who it applies to and what it grants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupPolicy {
    /// Membership criteria evaluated against the session.
    #[serde(default)]
    pub criteria: GroupCriteria,

    /// Table rules granted to members of this group.
    #[serde(default)]
    pub tables: BTreeMap<String, TableRule>,
}

/// Criteria deciding whether a session belongs to a group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupCriteria {
    /// Claim values that must all match the session's custom fields
    /// (case-insensitive string compare).
    #[serde(default)]
    pub matching_criteria: HashMap<String, serde_json::Value>,

    /// Optional condition expression that must additionally hold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// A per-user policy override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPolicy {
    /// The user this override applies to.
    pub user_identifier: String,

    /// Table rules for this user.
    #[serde(default)]
    pub tables: BTreeMap<String, TableRule>,
}

/// Allow/deny rule for one table at one policy tier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableRule {
    /// Columns granted. `"*"` means every column of the table at
    /// evaluation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<AccessList>,

    /// Columns denied. Deny always wins over allow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny: Option<AccessList>,

    /// Optional condition expression gating this rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Either the `*` wildcard or an explicit column list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccessList {
    /// The literal `"*"` wildcard.
    Wildcard(Wildcard),
    /// An explicit list of column names.
    Columns(Vec<String>),
}

/// Serde helper restricting the wildcard variant to the literal `"*"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wildcard;

impl Serialize for Wildcard {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("*")
    }
}

impl<'de> Deserialize<'de> for Wildcard {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == "*" {
            Ok(Wildcard)
        } else {
            Err(serde::de::Error::custom("expected \"*\""))
        }
    }
}

impl AccessList {
    /// The `*` wildcard.
    pub fn wildcard() -> Self {
        AccessList::Wildcard(Wildcard)
    }

    /// An explicit column list.
    pub fn columns<I: IntoIterator<Item = S>, S: Into<String>>(names: I) -> Self {
        AccessList::Columns(names.into_iter().map(Into::into).collect())
    }

    /// Whether this is the wildcard.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, AccessList::Wildcard(_))
    }
}

/// A dynamic WHERE-clause injector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Injector {
    /// Whether the injector is active.
    #[serde(default)]
    pub enabled: bool,

    /// Condition deciding whether the injector applies to a session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Per-table filter templates.
    #[serde(default)]
    pub tables: BTreeMap<String, InjectorTable>,
}

/// The filter template an injector contributes for one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectorTable {
    /// SQL fragment template; `${jwt.*}` and `${conditions.*}` placeholders
    /// are resolved against the session at injection time.
    pub filters: String,
}

impl Ruleset {
    /// Load a ruleset from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse a ruleset from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Get the global rule for a table, if any.
    pub fn global_table_rule(&self, table: &str) -> Option<&TableRule> {
        self.global_access_policy.tables.get(table)
    }

    /// Get the user-specific rule for a table, if any.
    pub fn user_table_rule(&self, user_identifier: &str, table: &str) -> Option<&TableRule> {
        self.user_specific_access_policy
            .iter()
            .find(|p| p.user_identifier == user_identifier)
            .and_then(|p| p.tables.get(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ruleset_yaml() {
        let yaml = r#"
name: sales
conditions:
  is_customer: "${jwt.custom_fields.role} == 'customer'"
global_access_policy:
  tables:
    orders:
      allow: "*"
      deny: [card_number]
group_access_policy:
  support:
    criteria:
      matching_criteria:
        department: support
    tables:
      orders:
        allow: [id, status]
user_specific_access_policy:
  - user_identifier: auditor_1
    tables:
      orders:
        allow: "*"
injectors:
  own_rows:
    enabled: true
    condition: "${conditions.is_customer}"
    tables:
      orders:
        filters: "user_id = ${jwt.custom_fields.sub}"
"#;
        let ruleset = Ruleset::from_yaml(yaml).unwrap();
        assert_eq!(ruleset.name, "sales");

        let global = ruleset.global_table_rule("orders").unwrap();
        assert!(global.allow.as_ref().unwrap().is_wildcard());
        assert_eq!(
            global.deny,
            Some(AccessList::columns(["card_number"]))
        );

        assert!(ruleset.user_table_rule("auditor_1", "orders").is_some());
        assert!(ruleset.user_table_rule("someone_else", "orders").is_none());

        let injector = &ruleset.injectors["own_rows"];
        assert!(injector.enabled);
        assert_eq!(
            injector.tables["orders"].filters,
            "user_id = ${jwt.custom_fields.sub}"
        );
    }

    #[test]
    fn test_wildcard_rejects_other_strings() {
        let yaml = r#"
name: s
global_access_policy:
  tables:
    orders:
      allow: "everything"
"#;
        assert!(Ruleset::from_yaml(yaml).is_err());
    }
}
