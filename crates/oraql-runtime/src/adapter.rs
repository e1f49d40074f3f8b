//! Trait boundaries for the pipeline's external collaborators.

use async_trait::async_trait;
use oraql_core::{QueryScope, Ruleset, Schema};
use std::collections::HashMap;

/// Read access to a tenant's registered schemas.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// All schemas registered for a tenant, used as match candidates.
    async fn candidate_schemas(&self, tenant_id: &str) -> anyhow::Result<Vec<Schema>>;

    /// One schema in full detail.
    async fn schema(&self, tenant_id: &str, name: &str) -> anyhow::Result<Schema>;
}

/// Read access to a tenant's rulesets. A ruleset shares its name with the
/// schema it governs.
#[async_trait]
pub trait RulesetStore: Send + Sync {
    async fn ruleset(&self, tenant_id: &str, name: &str) -> anyhow::Result<Ruleset>;
}

/// Read access to a tenant's settings blob.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn settings(&self, tenant_id: &str) -> anyhow::Result<HashMap<String, String>>;
}

/// The LLM scope extractor. A black box from the pipeline's perspective:
/// takes free text, returns a raw uncorrected scope.
#[async_trait]
pub trait ScopeExtractor: Send + Sync {
    async fn infer(&self, user_input: &str) -> anyhow::Result<QueryScope>;
}

/// SQL synthesis from a resolved scope. External; the pipeline only
/// post-processes its output.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate(&self, scope: &QueryScope, schema: &Schema) -> anyhow::Result<String>;
}

/// SQL execution. External; failures propagate as upstream errors.
#[async_trait]
pub trait SqlRunner: Send + Sync {
    async fn run(&self, sql: &str) -> anyhow::Result<Vec<serde_json::Value>>;
}
