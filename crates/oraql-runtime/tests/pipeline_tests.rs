//! End-to-end pipeline tests over in-memory collaborators.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use oraql_core::{QueryScope, Ruleset, Schema, Session};
use oraql_runtime::{
    GatewayError, Pipeline, RulesetStore, SchemaStore, ScopeExtractor, SettingsStore,
    SqlGenerator, SqlRunner,
};

struct InMemorySchemas(Vec<Schema>);

#[async_trait]
impl SchemaStore for InMemorySchemas {
    async fn candidate_schemas(&self, _tenant_id: &str) -> anyhow::Result<Vec<Schema>> {
        Ok(self.0.clone())
    }

    async fn schema(&self, _tenant_id: &str, name: &str) -> anyhow::Result<Schema> {
        self.0
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("schema not found: {name}"))
    }
}

struct InMemoryRulesets(Ruleset);

#[async_trait]
impl RulesetStore for InMemoryRulesets {
    async fn ruleset(&self, _tenant_id: &str, _name: &str) -> anyhow::Result<Ruleset> {
        Ok(self.0.clone())
    }
}

struct InMemorySettings(HashMap<String, String>);

#[async_trait]
impl SettingsStore for InMemorySettings {
    async fn settings(&self, _tenant_id: &str) -> anyhow::Result<HashMap<String, String>> {
        Ok(self.0.clone())
    }
}

struct StubExtractor(QueryScope);

#[async_trait]
impl ScopeExtractor for StubExtractor {
    async fn infer(&self, _user_input: &str) -> anyhow::Result<QueryScope> {
        Ok(self.0.clone())
    }
}

/// Renders `SELECT <columns> FROM <tables>`, optionally with a canned
/// user-supplied WHERE clause.
struct StubGenerator {
    where_clause: Option<&'static str>,
}

#[async_trait]
impl SqlGenerator for StubGenerator {
    async fn generate(&self, scope: &QueryScope, _schema: &Schema) -> anyhow::Result<String> {
        let mut sql = format!(
            "SELECT {} FROM {}",
            scope.entities.columns.join(", "),
            scope.entities.tables.join(", ")
        );
        if let Some(clause) = self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(clause);
        }
        sql.push(';');
        Ok(sql)
    }
}

struct StubRunner;

#[async_trait]
impl SqlRunner for StubRunner {
    async fn run(&self, _sql: &str) -> anyhow::Result<Vec<serde_json::Value>> {
        Ok(vec![json!({"id": 1})])
    }
}

fn sales_schema() -> Schema {
    Schema::from_yaml(
        r#"
name: sales
tables:
  users:
    columns:
      id: {}
      name: {}
      password:
        is_sensitive_column: true
  orders:
    columns:
      id: {}
      status: {}
"#,
    )
    .unwrap()
}

fn sales_ruleset() -> Ruleset {
    Ruleset::from_yaml(
        r#"
name: sales
conditions:
  is_customer: "${jwt.custom_fields.role} == 'customer'"
global_access_policy:
  tables:
    users:
      allow: "*"
      deny: [password]
    orders:
      allow: "*"
injectors:
  own_rows:
    enabled: true
    condition: "${conditions.is_customer}"
    tables:
      users:
        filters: "user_id = ${jwt.custom_fields.sub}"
"#,
    )
    .unwrap()
}

fn customer_session() -> Session {
    Session::new("customer_user_1")
        .with_custom_field("role", json!("customer"))
        .with_custom_field("sub", json!("customer_user_1"))
}

fn pipeline(
    schemas: Vec<Schema>,
    ruleset: Ruleset,
    settings: HashMap<String, String>,
    raw_scope: QueryScope,
    where_clause: Option<&'static str>,
) -> Pipeline {
    Pipeline::new(
        Arc::new(InMemorySchemas(schemas)),
        Arc::new(InMemoryRulesets(ruleset)),
        Arc::new(InMemorySettings(settings)),
        Arc::new(StubExtractor(raw_scope)),
        Arc::new(StubGenerator { where_clause }),
        Arc::new(StubRunner),
    )
}

fn scope(tables: &[&str], columns: &[&str]) -> QueryScope {
    QueryScope::new(
        "test",
        tables.iter().map(|s| s.to_string()).collect(),
        columns.iter().map(|s| s.to_string()).collect(),
    )
}

#[tokio::test]
async fn test_end_to_end_soft_fix_expansion_and_injection() {
    // "user" soft-fixes to "users"; the wildcard expands without the
    // sensitive password column; the customer injector appends its filter.
    let pipeline = pipeline(
        vec![sales_schema()],
        sales_ruleset(),
        HashMap::new(),
        scope(&["user"], &["user.*"]),
        None,
    );

    let outcome = pipeline
        .answer("tenant_a", &customer_session(), "show my user record")
        .await
        .unwrap();

    assert_eq!(outcome.schema_name, "sales");
    assert_eq!(outcome.scope.entities.tables, vec!["users"]);
    assert_eq!(outcome.scope.entities.columns, vec!["users.id", "users.name"]);
    assert_eq!(outcome.soft_fixes.len(), 1);
    assert_eq!(outcome.soft_fixes[0].from, "user");
    assert_eq!(outcome.soft_fixes[0].to, "users");
    assert_eq!(
        outcome.sql,
        "SELECT users.id, users.name FROM users WHERE user_id = 'customer_user_1';"
    );
    assert_eq!(
        outcome.injected_clause.as_deref(),
        Some("user_id = 'customer_user_1'")
    );
    assert_eq!(outcome.rows.len(), 1);
}

#[tokio::test]
async fn test_outcome_serializes_for_audit() {
    let pipeline = pipeline(
        vec![sales_schema()],
        sales_ruleset(),
        HashMap::new(),
        scope(&["orders"], &["orders.id"]),
        None,
    );

    let outcome = pipeline
        .answer("tenant_a", &customer_session(), "order ids")
        .await
        .unwrap();

    let value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(value["schema_name"], "sales");
    assert_eq!(value["sql"], "SELECT orders.id FROM orders;");
    assert_eq!(value["scope"]["entities"]["columns"][0], "orders.id");
}

#[tokio::test]
async fn test_disabled_injection_strips_user_where() {
    let mut settings = HashMap::new();
    settings.insert("DYNAMIC_INJECTION".to_string(), "false".to_string());

    let pipeline = pipeline(
        vec![sales_schema()],
        sales_ruleset(),
        settings,
        scope(&["orders"], &["orders.id"]),
        Some("status = 'pending'"),
    );

    let outcome = pipeline
        .answer("tenant_a", &customer_session(), "pending orders")
        .await
        .unwrap();

    assert_eq!(outcome.sql, "SELECT orders.id FROM orders;");
    assert_eq!(outcome.injected_clause, None);
}

#[tokio::test]
async fn test_ambiguous_schemas_rejected() {
    let mut other = sales_schema();
    other.name = "sales_copy".to_string();

    let pipeline = pipeline(
        vec![sales_schema(), other],
        sales_ruleset(),
        HashMap::new(),
        scope(&["orders"], &["orders.id"]),
        None,
    );

    let err = pipeline
        .answer("tenant_a", &customer_session(), "orders")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "MULTIPLE_SCHEMAS");
}

#[tokio::test]
async fn test_no_matching_schema() {
    let pipeline = pipeline(
        vec![sales_schema()],
        sales_ruleset(),
        HashMap::new(),
        scope(&["inventory"], &["inventory.sku"]),
        None,
    );

    let err = pipeline
        .answer("tenant_a", &customer_session(), "inventory")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "NO_MATCHING_SCHEMA");
}

#[tokio::test]
async fn test_denied_column_refuses_whole_request() {
    let pipeline = pipeline(
        vec![sales_schema()],
        sales_ruleset(),
        // Keep the sensitive column in the scope so access control sees it.
        HashMap::from([("REMOVE_SENSITIVE_COLUMNS".to_string(), "false".to_string())]),
        scope(&["users"], &["users.id", "users.password"]),
        None,
    );

    let err = pipeline
        .answer("tenant_a", &customer_session(), "user passwords")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "ACCESS_DENIED");
    let GatewayError::AccessDenied(report) = err else {
        panic!("expected AccessDenied");
    };
    assert_eq!(report.denied_columns, vec!["users.password"]);
}

#[tokio::test]
async fn test_all_columns_dropped_is_terminal() {
    let pipeline = pipeline(
        vec![sales_schema()],
        sales_ruleset(),
        HashMap::new(),
        scope(&["users"], &["users.shoe_size"]),
        None,
    );

    let err = pipeline
        .answer("tenant_a", &customer_session(), "shoe sizes")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "NO_COLUMN_REMAIN");
    let payload = err.to_payload();
    assert_eq!(payload["detail"]["schema"], "sales");
    assert_eq!(payload["detail"]["dropped"][0], "users.shoe_size");
}
