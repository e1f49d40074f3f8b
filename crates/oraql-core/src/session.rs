//! Session types: the authenticated caller and its claims.
//!
//! A session is supplied by the caller's auth layer and is read-only from
//! the pipeline's perspective. Its claims are the sole source of
//! `${jwt.*}` substitution values in conditions and filter templates.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// An authenticated session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    /// Stable user identifier, matched against
    /// `user_specific_access_policy` entries.
    pub user_id: String,

    /// Decoded token claims. By convention user attributes live under the
    /// `custom_fields` key, but top-level claims are also resolvable.
    #[serde(default)]
    pub claims: serde_json::Map<String, Value>,

    /// Session-scoped settings blob.
    #[serde(default)]
    pub settings: HashMap<String, String>,
}

impl Session {
    /// Create a session for a user with empty claims.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            claims: serde_json::Map::new(),
            settings: HashMap::new(),
        }
    }

    /// Add a custom field to the session's claims.
    pub fn with_custom_field(mut self, key: impl Into<String>, value: Value) -> Self {
        let fields = self
            .claims
            .entry("custom_fields")
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let Value::Object(map) = fields {
            map.insert(key.into(), value);
        }
        self
    }

    /// The session's custom fields, if present.
    pub fn custom_fields(&self) -> Option<&serde_json::Map<String, Value>> {
        self.claims.get("custom_fields").and_then(Value::as_object)
    }

    /// Look up one custom field by key.
    pub fn custom_field(&self, key: &str) -> Option<&Value> {
        self.custom_fields().and_then(|m| m.get(key))
    }

    /// Resolve a dot-separated `${jwt.PATH}` reference against the claims.
    ///
    /// The path is first walked from the top-level claims; if that fails,
    /// it is walked from `custom_fields`, and finally tried as a literal
    /// key inside `custom_fields`.
    pub fn lookup_claim(&self, path: &str) -> Option<&Value> {
        if let Some(value) = walk_path(&self.claims, path) {
            return Some(value);
        }
        let fields = self.custom_fields()?;
        walk_path(fields, path).or_else(|| fields.get(path))
    }
}

fn walk_path<'a>(root: &'a serde_json::Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = root.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}
