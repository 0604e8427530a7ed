//! End-to-end scoping tests against the in-memory executor.
//!
//! Run with: cargo test --package tenantry-scope --test scoping

use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tenantry_core::{Principal, TenancyConfig, TenancyError, TenantContext};
use tenantry_scope::{
    FilterQuery, MemoryExecutor, Predicate, QueryExecutor, Row, ScopeError, ScopeState,
    ScopedEntity, SqlAnalyzer, TenantRepository, TenantScope, render_select, with_tenant_context,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    #[serde(default)]
    tenant_id: Option<i64>,
    status: String,
}

impl Order {
    fn new(status: &str) -> Self {
        Self {
            id: None,
            tenant_id: None,
            status: status.to_string(),
        }
    }
}

impl ScopedEntity for Order {
    const TABLE: &'static str = "orders";

    fn key(&self) -> Option<Value> {
        self.id.map(Value::from)
    }

    fn tenant_id(&self) -> Option<i64> {
        self.tenant_id
    }

    fn set_tenant_id(&mut self, tenant_id: i64) {
        self.tenant_id = Some(tenant_id);
    }
}

fn row(value: Value) -> Row {
    value.as_object().cloned().unwrap()
}

async fn seeded_store() -> MemoryExecutor {
    let store = MemoryExecutor::new().require_not_null("orders", "tenant_id");
    store
        .seed(
            "orders",
            vec![
                row(json!({"tenant_id": 7, "status": "open"})),
                row(json!({"tenant_id": 7, "status": "closed"})),
                row(json!({"tenant_id": 8, "status": "open"})),
                row(json!({"tenant_id": 9, "status": "open"})),
            ],
        )
        .await;
    store
}

fn statuses(orders: &[Order]) -> Vec<(i64, &str)> {
    orders
        .iter()
        .map(|o| (o.tenant_id.unwrap(), o.status.as_str()))
        .collect()
}

#[tokio::test]
async fn test_open_orders_scenario() {
    let store = seeded_store().await;
    let config = TenancyConfig::default();
    let repo = TenantRepository::<Order>::new(&config, TenantContext::for_tenant(7), &store);

    let mut query = repo.query().unwrap().filter("status", "open");
    assert_eq!(query.state(), ScopeState::ScopeApplied);
    let q = query.clone().into_query();
    assert_eq!(
        q.predicates(),
        &[
            Predicate::eq("status", "open"),
            Predicate::eq("orders.tenant_id", 7),
        ]
    );
    assert_eq!(q.bindings(), &[json!("open"), json!(7)]);

    let found = repo.fetch(&mut query).await.unwrap();
    assert_eq!(statuses(&found), vec![(7, "open")]);
    assert_eq!(query.state(), ScopeState::Executed);
}

#[tokio::test]
async fn test_parsed_sql_scenario() {
    // SELECT * FROM orders WHERE status = 'open' with tenant 7
    let parsed = SqlAnalyzer::new()
        .parse_query("SELECT * FROM orders WHERE status = 'open'")
        .unwrap();
    let scope = TenantScope::new(&TenancyConfig::default(), "orders");
    let scoped = tenantry_scope::ScopedQuery::from_query(
        parsed.query,
        scope,
        &TenantContext::for_tenant(7),
    )
    .unwrap();

    let q = scoped.into_query();
    assert_eq!(
        q.predicates(),
        &[
            Predicate::eq("status", "open"),
            Predicate::eq("orders.tenant_id", 7),
        ]
    );
    assert_eq!(q.bindings(), &[json!("open"), json!(7)]);
    assert_eq!(
        render_select(&q).sql,
        "SELECT * FROM orders WHERE status = $1 AND orders.tenant_id = $2"
    );
}

#[tokio::test]
async fn test_administrator_sees_all_tenants() {
    let store = seeded_store().await;
    let config = TenancyConfig::default();
    let admin = Principal::administrator("root");
    let ctx = TenantContext::for_actor(Some(&admin));
    let repo = TenantRepository::<Order>::new(&config, ctx, &store);

    let mut query = repo.query().unwrap().filter("status", "open");
    assert_eq!(query.state(), ScopeState::Overridden);
    assert_eq!(query.query().predicates(), &[Predicate::eq("status", "open")]);

    let found = repo.fetch(&mut query).await.unwrap();
    assert_eq!(statuses(&found), vec![(7, "open"), (8, "open"), (9, "open")]);
}

#[tokio::test]
async fn test_unresolved_context_fails() {
    let store = seeded_store().await;
    let config = TenancyConfig::default();
    let repo = TenantRepository::<Order>::new(&config, TenantContext::new(), &store);

    let err = repo.all().await.unwrap_err();
    assert!(matches!(err, ScopeError::Tenancy(TenancyError::TenantIdNotSet)));
}

#[tokio::test]
async fn test_user_without_tenant_fails() {
    let store = seeded_store().await;
    let config = TenancyConfig::default();
    let user = Principal {
        id: "dangling".to_string(),
        tenant_id: None,
        administrator: false,
    };
    let repo =
        TenantRepository::<Order>::new(&config, TenantContext::for_actor(Some(&user)), &store);

    assert!(repo.query().unwrap_err().is_tenant_not_set());
}

#[tokio::test]
async fn test_create_stamps_ambient_tenant() {
    let store = MemoryExecutor::new().require_not_null("orders", "tenant_id");
    let config = TenancyConfig::default();
    let repo = TenantRepository::<Order>::new(&config, TenantContext::for_tenant(3), &store);

    let mut order = Order::new("open");
    repo.create(&mut order).await.unwrap();

    assert_eq!(order.tenant_id, Some(3));
    assert!(order.id.is_some());
    let stored = store.rows("orders").await;
    assert_eq!(stored[0].get("tenant_id"), Some(&json!(3)));
}

#[tokio::test]
async fn test_create_without_tenant_hits_storage_constraint() {
    let store = MemoryExecutor::new().require_not_null("orders", "tenant_id");
    let config = TenancyConfig::default();
    let repo = TenantRepository::<Order>::new(&config, TenantContext::unrestricted(), &store);

    let mut order = Order::new("open");
    let err = repo.create(&mut order).await.unwrap_err();
    assert!(matches!(err, ScopeError::Execution(_)));
    assert!(store.rows("orders").await.is_empty());
}

#[tokio::test]
async fn test_remove_tenant_spans_all_rows() {
    let store = seeded_store().await;
    let config = TenancyConfig::default();
    let repo = TenantRepository::<Order>::new(&config, TenantContext::for_tenant(7), &store);

    let scoped = repo.query().unwrap().count(&store).await.unwrap();
    let everyone = repo.query().unwrap().remove_tenant().count(&store).await.unwrap();
    let alias = repo.query().unwrap().all_tenants().count(&store).await.unwrap();

    assert_eq!(scoped, 2);
    assert_eq!(everyone, 4);
    assert_eq!(alias, 4);
}

#[tokio::test]
async fn test_apply_tenant_selects_specific_tenants() {
    let store = seeded_store().await;
    let config = TenancyConfig::default();
    let repo = TenantRepository::<Order>::new(&config, TenantContext::for_tenant(7), &store);

    let mut query = repo.query().unwrap().apply_tenant(vec![8_i64, 9]).unwrap();
    let found = repo.fetch(&mut query).await.unwrap();
    assert_eq!(statuses(&found), vec![(8, "open"), (9, "open")]);

    let mut query = repo.query().unwrap().apply_tenant([9_i64]).unwrap();
    assert_eq!(
        query.query().predicates(),
        &[Predicate::eq("orders.tenant_id", 9)]
    );
    assert_eq!(repo.fetch(&mut query).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_apply_tenant_empty_fails() {
    let store = seeded_store().await;
    let config = TenancyConfig::default();
    let repo = TenantRepository::<Order>::new(&config, TenantContext::for_tenant(7), &store);

    let err = repo
        .query()
        .unwrap()
        .apply_tenant(Vec::<i64>::new())
        .unwrap_err();
    assert!(err.is_tenant_not_set());
}

#[tokio::test]
async fn test_or_filter_cannot_escape_tenant() {
    let store = seeded_store().await;
    let config = TenancyConfig::default();
    let repo = TenantRepository::<Order>::new(&config, TenantContext::for_tenant(8), &store);

    let mut query = repo
        .query()
        .unwrap()
        .filter("status", "closed")
        .or_filter("status", "open");
    let found = repo.fetch(&mut query).await.unwrap();

    assert_eq!(statuses(&found), vec![(8, "open")]);
}

#[tokio::test]
async fn test_scoped_delete_only_touches_own_tenant() {
    let store = seeded_store().await;
    let config = TenancyConfig::default();
    let repo = TenantRepository::<Order>::new(&config, TenantContext::for_tenant(7), &store);

    let deleted = repo
        .query()
        .unwrap()
        .filter("status", "open")
        .delete(&store)
        .await
        .unwrap();

    assert_eq!(deleted, 1);
    assert_eq!(store.rows("orders").await.len(), 3);
}

#[tokio::test]
async fn test_find_respects_scope() {
    let store = seeded_store().await;
    let config = TenancyConfig::default();
    let repo = TenantRepository::<Order>::new(&config, TenantContext::for_tenant(7), &store);

    // Row 3 belongs to tenant 8.
    assert!(repo.find(3).await.unwrap().is_none());
    assert_eq!(repo.find(1).await.unwrap().map(|o| o.status), Some("open".to_string()));
}

#[tokio::test]
async fn test_admin_delete_bypasses_scope() {
    let store = seeded_store().await;
    let config = TenancyConfig::default();
    let tenant_eight = TenantRepository::<Order>::new(&config, TenantContext::for_tenant(8), &store);
    let other = tenant_eight.find(3).await.unwrap().unwrap();

    let repo = TenantRepository::<Order>::new(&config, TenantContext::for_tenant(7), &store);
    assert!(repo.admin_delete(&other).await.unwrap());
    assert!(!repo.admin_delete(&other).await.unwrap());
    assert_eq!(store.rows("orders").await.len(), 3);
}

#[tokio::test]
async fn test_admin_delete_requires_key() {
    let store = MemoryExecutor::new();
    let config = TenancyConfig::default();
    let repo = TenantRepository::<Order>::new(&config, TenantContext::for_tenant(7), &store);

    let err = repo.admin_delete(&Order::new("open")).await.unwrap_err();
    assert!(matches!(err, ScopeError::MissingPrimaryKey { .. }));
}

#[tokio::test]
async fn test_repository_uses_request_context() {
    let store = seeded_store().await;
    let config = TenancyConfig::default();

    let count = with_tenant_context(TenantContext::for_tenant(9), async {
        let repo = TenantRepository::<Order>::from_request(&config, &store);
        repo.all().await.map(|orders| orders.len())
    })
    .await
    .unwrap();
    assert_eq!(count, 1);

    let outside = TenantRepository::<Order>::from_request(&config, &store);
    assert!(outside.all().await.unwrap_err().is_tenant_not_set());
}

#[tokio::test]
async fn test_custom_tenant_column() {
    let store = MemoryExecutor::new();
    store
        .seed(
            "orders",
            vec![
                row(json!({"account_id": 1, "status": "open"})),
                row(json!({"account_id": 2, "status": "open"})),
            ],
        )
        .await;
    let config = TenancyConfig::from_yaml("tenant_column: account_id\nqualify_columns: false\n")
        .unwrap();
    let scope = TenantScope::new(&config, "orders");
    let mut query = tenantry_scope::ScopedQuery::build(scope, &TenantContext::for_tenant(2)).unwrap();

    assert_eq!(
        query.query().predicates(),
        &[Predicate::eq("account_id", 2)]
    );
    let rows = query.get(&store).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("account_id"), Some(&json!(2)));

    // Executor trait object works the same way.
    let executor: &dyn QueryExecutor = &store;
    assert_eq!(executor.select(&tenantry_scope::Query::new("orders")).await.unwrap().len(), 2);
}
