//! The request pipeline.

use std::sync::Arc;

use oraql_core::{QueryScope, ScopeSettings, Session};
use oraql_policy::AccessControlResolver;
use oraql_rls::InjectorResolver;
use oraql_scope::{match_scope, normalize_scope, soft_correct_tables, SchemaMatch, ScopeError, SoftFix};
use serde::Serialize;
use tracing::debug;

use crate::adapter::{
    RulesetStore, SchemaStore, ScopeExtractor, SettingsStore, SqlGenerator, SqlRunner,
};
use crate::error::GatewayError;

/// Wires the pipeline stages over the external collaborators.
///
/// A `Pipeline` is cheap to clone and holds no per-request state; each
/// call to [`Pipeline::answer`] fetches schemas, ruleset, and settings
/// fresh and runs the stages strictly in order.
#[derive(Clone)]
pub struct Pipeline {
    schemas: Arc<dyn SchemaStore>,
    rulesets: Arc<dyn RulesetStore>,
    settings: Arc<dyn SettingsStore>,
    extractor: Arc<dyn ScopeExtractor>,
    generator: Arc<dyn SqlGenerator>,
    runner: Arc<dyn SqlRunner>,
}

/// Everything the pipeline produced for one request, for response and
/// audit purposes.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    /// The final resolved scope.
    pub scope: QueryScope,
    /// The matched schema.
    pub schema_name: String,
    /// The SQL that was executed, after injection.
    pub sql: String,
    /// The injected row-filter clause, if any.
    pub injected_clause: Option<String>,
    /// Rows returned by the runner.
    pub rows: Vec<serde_json::Value>,
    /// Table-name corrections applied before matching.
    pub soft_fixes: Vec<SoftFix>,
    /// Columns dropped during normalization because they didn't resolve.
    pub dropped_columns: Vec<String>,
}

impl Pipeline {
    /// Assemble a pipeline from its collaborators.
    pub fn new(
        schemas: Arc<dyn SchemaStore>,
        rulesets: Arc<dyn RulesetStore>,
        settings: Arc<dyn SettingsStore>,
        extractor: Arc<dyn ScopeExtractor>,
        generator: Arc<dyn SqlGenerator>,
        runner: Arc<dyn SqlRunner>,
    ) -> Self {
        Self {
            schemas,
            rulesets,
            settings,
            extractor,
            generator,
            runner,
        }
    }

    /// Answer a natural-language request end to end.
    pub async fn answer(
        &self,
        tenant_id: &str,
        session: &Session,
        user_input: &str,
    ) -> Result<PipelineOutcome, GatewayError> {
        let settings_blob = self.settings.settings(tenant_id).await?;
        let settings = ScopeSettings::from_settings(&settings_blob);

        let raw_scope = self.extractor.infer(user_input).await?;
        debug!(?raw_scope, "extracted raw scope");

        let candidates = self.schemas.candidate_schemas(tenant_id).await?;
        let (corrected, soft_fixes) = soft_correct_tables(&raw_scope, &candidates);

        let schema_name =
            match match_scope(&corrected, &candidates, settings.ignore_column_wildcards) {
                SchemaMatch::One(name) => name,
                SchemaMatch::Ambiguous(candidates) => {
                    return Err(ScopeError::MultipleSchemas { candidates }.into())
                }
                SchemaMatch::None => {
                    return Err(ScopeError::NoMatchingSchema {
                        tables: corrected.entities.tables.clone(),
                    }
                    .into())
                }
            };
        debug!(schema = %schema_name, "matched schema");

        let schema = self.schemas.schema(tenant_id, &schema_name).await?;
        let normalized = normalize_scope(&corrected, &schema, &settings)?;

        let ruleset = self.rulesets.ruleset(tenant_id, &schema_name).await?;
        AccessControlResolver::new(session, &ruleset, &schema)
            .has_access_to_scope(&normalized.scope)?;

        let sql = self
            .generator
            .generate(&normalized.scope, &schema)
            .await?;
        debug!(sql = %sql, "generated SQL");

        let injection = InjectorResolver::new().apply(&sql, &ruleset, session, &settings)?;
        let rows = self.runner.run(&injection.sql).await?;

        Ok(PipelineOutcome {
            scope: normalized.scope,
            schema_name,
            sql: injection.sql,
            injected_clause: injection.injected_clause,
            rows,
            soft_fixes,
            dropped_columns: normalized.dropped_missing,
        })
    }
}
