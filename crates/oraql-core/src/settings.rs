//! Typed pipeline toggles resolved from the tenant settings blob.
//!
//! Tenant settings are stored as loose string key/value pairs; the pipeline
//! resolves them once per request into this struct so the stages never see
//! stringly-typed booleans.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Setting key for stripping sensitive columns from scopes.
pub const REMOVE_SENSITIVE_COLUMNS: &str = "REMOVE_SENSITIVE_COLUMNS";
/// Setting key for dropping columns that don't resolve against the schema.
pub const REMOVE_MISSING_COLUMNS: &str = "REMOVE_MISSING_COLUMNS_ON_QUERY_SCOPE";
/// Setting key for dropping wildcards instead of expanding them.
pub const IGNORE_COLUMN_WILDCARDS: &str = "IGNORE_COLUMN_WILDCARDS";
/// Setting key for dynamic WHERE-clause injection.
pub const DYNAMIC_INJECTION: &str = "DYNAMIC_INJECTION";

/// Per-tenant pipeline toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSettings {
    /// Strip columns flagged sensitive in the matched schema.
    pub remove_sensitive_columns: bool,

    /// Drop scope columns that don't resolve against the matched schema.
    pub remove_missing_columns: bool,

    /// Drop `table.*` tokens instead of expanding them.
    pub ignore_column_wildcards: bool,

    /// Apply ruleset injectors; when off, user-supplied WHERE clauses are
    /// stripped as well.
    pub dynamic_injection: bool,
}

impl Default for ScopeSettings {
    fn default() -> Self {
        Self {
            remove_sensitive_columns: true,
            remove_missing_columns: true,
            ignore_column_wildcards: false,
            dynamic_injection: true,
        }
    }
}

impl ScopeSettings {
    /// Resolve settings from a tenant's string settings blob, falling back
    /// to defaults for absent keys.
    pub fn from_settings(settings: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        Self {
            remove_sensitive_columns: get_bool(settings, REMOVE_SENSITIVE_COLUMNS)
                .unwrap_or(defaults.remove_sensitive_columns),
            remove_missing_columns: get_bool(settings, REMOVE_MISSING_COLUMNS)
                .unwrap_or(defaults.remove_missing_columns),
            ignore_column_wildcards: get_bool(settings, IGNORE_COLUMN_WILDCARDS)
                .unwrap_or(defaults.ignore_column_wildcards),
            dynamic_injection: get_bool(settings, DYNAMIC_INJECTION)
                .unwrap_or(defaults.dynamic_injection),
        }
    }
}

/// Coerce a settings value to a boolean. Accepts the usual spellings
/// case-insensitively; anything else is treated as unset.
fn get_bool(settings: &HashMap<String, String>, key: &str) -> Option<bool> {
    let value = settings.get(key)?;
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        other => {
            tracing::warn!(key, value = other, "unrecognized boolean setting, using default");
            None
        }
    }
}
