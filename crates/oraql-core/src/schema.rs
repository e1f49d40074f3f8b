//! Tenant schema types.
//!
//! A [`Schema`] describes one relational schema a tenant has registered:
//! tables, their columns, optional join relationships, and synonyms used
//! when matching loosely-worded requests. Table and column names are
//! case-sensitive exact keys; synonyms are an auxiliary lookup, never
//! treated as equal to the canonical name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// A named tenant schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    /// Unique schema name within the tenant.
    pub name: String,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Tables keyed by canonical name.
    #[serde(default)]
    pub tables: BTreeMap<String, Table>,
}

/// A table in a tenant schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    /// Columns keyed by canonical name.
    #[serde(default)]
    pub columns: BTreeMap<String, Column>,

    /// Named join relationships to other tables.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, Join>,

    /// Alternative names the table is known by.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A column in a table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Column {
    /// SQL type of the column (informational).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub column_type: Option<String>,

    /// Whether the column holds sensitive data and may be stripped from
    /// scopes before SQL generation.
    #[serde(default)]
    pub is_sensitive_column: bool,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Alternative names the column is known by.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,

    /// Declared constraints (informational, e.g. "primary key").
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
}

/// A join relationship between two tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Join {
    /// The foreign table joined to.
    pub table: String,

    /// Column on this table used in the join.
    pub local_column: String,

    /// Column on the foreign table used in the join.
    pub foreign_column: String,
}

impl Schema {
    /// Load a schema from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse a schema from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Parse a schema from a JSON value (as stored by the admin API).
    pub fn from_json(value: serde_json::Value) -> Result<Self, ConfigError> {
        serde_json::from_value(value).map_err(ConfigError::from)
    }

    /// Look up a table by canonical name only.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Check if a table exists under its canonical name.
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Resolve a table reference, treating synonyms as equivalent to the
    /// canonical name. Returns the canonical name and the table.
    pub fn resolve_table(&self, name: &str) -> Option<(&str, &Table)> {
        if let Some((canonical, table)) = self.tables.get_key_value(name) {
            return Some((canonical.as_str(), table));
        }
        self.tables
            .iter()
            .find(|(_, table)| table.synonyms.iter().any(|s| s == name))
            .map(|(canonical, table)| (canonical.as_str(), table))
    }

    /// Check if `table.column` resolves against this schema.
    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.resolve_table(table)
            .map(|(_, t)| t.columns.contains_key(column))
            .unwrap_or(false)
    }
}

impl Table {
    /// All canonical column names, in deterministic order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    /// Check whether a column is flagged sensitive.
    pub fn is_sensitive(&self, column: &str) -> bool {
        self.columns
            .get(column)
            .map(|c| c.is_sensitive_column)
            .unwrap_or(false)
    }
}
