//! The scope interceptor.
//!
//! [`TenantScope`] runs once per query build against a scoped table: it
//! consults the [`TenantContext`] and asks the [`ConstraintRewriter`] to add
//! the tenant predicate. [`ScopedQuery`] wraps a built query and exposes the
//! escape hatches (`remove_tenant`, `apply_tenant`, `all_tenants`) as
//! ordinary methods.

use serde_json::Value;
use tenantry_core::{TenancyConfig, TenantContext};

use crate::entity::Row;
use crate::error::ScopeError;
use crate::executor::QueryExecutor;
use crate::query::{Connector, FilterQuery, Operator, Predicate, Query};
use crate::rewriter::{ConstraintRewriter, TenantSelector};

/// Where a query is in its scoping lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// Built, scope not yet applied.
    Built,
    /// Tenant predicate present.
    ScopeApplied,
    /// Context override active; no predicate added.
    Overridden,
    /// Caller replaced the ambient tenant with explicit ids.
    RescopedExplicitly,
    /// No tenant predicate: removed by the caller, or a global table.
    Unscoped,
    /// Sent to the executor at least once.
    Executed,
}

/// Applies tenant scoping to queries against one table.
#[derive(Debug, Clone)]
pub struct TenantScope {
    table: String,
    rewriter: Option<ConstraintRewriter>,
}

impl TenantScope {
    /// Scope for `table` as configured. Global tables get a scope that never
    /// adds predicates.
    pub fn new(config: &TenancyConfig, table: impl Into<String>) -> Self {
        let table = table.into();
        let rewriter = config
            .qualified_tenant_column(&table)
            .map(ConstraintRewriter::new);
        Self { table, rewriter }
    }

    /// Scope for `table` with an explicit tenant column.
    pub fn with_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            rewriter: Some(ConstraintRewriter::new(column)),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// The tenant column used in predicates, or `None` for a global table.
    pub fn tenant_column(&self) -> Option<&str> {
        self.rewriter.as_ref().map(ConstraintRewriter::column)
    }

    pub fn rewriter(&self) -> Option<&ConstraintRewriter> {
        self.rewriter.as_ref()
    }

    /// Apply the ambient tenant to `query`.
    ///
    /// Fails with `TenantIdNotSet` when the context is not overridden and has
    /// no tenant id >= 1. Caller predicates joined with `OR` are grouped so
    /// the tenant predicate constrains all of them.
    pub fn apply<Q: FilterQuery + ?Sized>(
        &self,
        query: &mut Q,
        context: &TenantContext,
    ) -> Result<ScopeState, ScopeError> {
        let Some(rewriter) = &self.rewriter else {
            return Ok(ScopeState::Unscoped);
        };

        if context.is_overridden() {
            tracing::info!(table = %self.table, "tenant scope overridden for query");
            return Ok(ScopeState::Overridden);
        }

        let tenant_id = context.require_tenant().inspect_err(|_| {
            tracing::error!(table = %self.table, "scoped query built without a tenant id");
        })?;

        rewriter.remove(query);
        group_disjunction(query);
        rewriter.inject(query, tenant_id);
        Ok(ScopeState::ScopeApplied)
    }

    /// Strip the tenant predicate. Returns how many were removed.
    pub fn remove<Q: FilterQuery + ?Sized>(&self, query: &mut Q) -> usize {
        match &self.rewriter {
            Some(rewriter) => rewriter.remove(query),
            None => 0,
        }
    }

    /// Replace the tenant predicate with explicit ids.
    ///
    /// Global tables have no tenant column, so an explicit selection on one
    /// is rejected once the ids themselves have been validated.
    pub fn apply_explicit<Q: FilterQuery + ?Sized>(
        &self,
        query: &mut Q,
        selector: impl Into<TenantSelector>,
    ) -> Result<(), ScopeError> {
        match &self.rewriter {
            Some(rewriter) => rewriter.apply_explicit(query, selector),
            None => {
                selector.into().validate()?;
                tracing::warn!(table = %self.table, "apply_tenant on a global table rejected");
                Err(ScopeError::Unsupported {
                    reason: format!("{} is a global table and has no tenant column", self.table),
                })
            }
        }
    }

    /// Move tenant constraints to the end of the predicate list, behind a
    /// group of everything else if the rest contains an `OR`. Constraints
    /// repeating an earlier one are dropped.
    ///
    /// Run before executing a scoped query so predicates added after scoping
    /// cannot escape the tenant constraint through `OR`. Queries that are
    /// overridden or unscoped must not be sealed: their tenant column
    /// predicates belong to the caller.
    pub fn seal<Q: FilterQuery + ?Sized>(&self, query: &mut Q) {
        let Some(rewriter) = &self.rewriter else {
            return;
        };
        let mut constraints: Vec<Predicate> = Vec::new();
        for constraint in rewriter.tenant_constraints(query) {
            if !constraints.iter().any(|kept| same_constraint(kept, constraint)) {
                constraints.push(constraint.clone());
            }
        }
        if constraints.is_empty() {
            return;
        }

        rewriter.remove(query);
        group_disjunction(query);
        for mut constraint in constraints {
            constraint.set_connector(Connector::And);
            query.push_predicate(constraint);
        }
    }
}

// Both are tenant constraints of the same rewriter, so their columns match.
fn same_constraint(a: &Predicate, b: &Predicate) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b) && a.values() == b.values()
}

/// Wrap all predicates into one group when any of them is joined with `OR`.
fn group_disjunction<Q: FilterQuery + ?Sized>(query: &mut Q) {
    let disjunctive = query
        .predicates()
        .iter()
        .skip(1)
        .any(|p| p.connector() == Connector::Or);
    if !disjunctive {
        return;
    }

    // Grouping preserves value order, so the bindings stay as they are.
    let grouped = Predicate::nested(query.predicates().to_vec());
    query.set_predicates(vec![grouped]);
}

/// A query built against a scoped table.
///
/// ```ignore
/// let open = repo.query()?
///     .filter("status", "open")
///     .get(&executor)
///     .await?;
///
/// let everyone = repo.query()?.all_tenants().count(&executor).await?;
/// let two = repo.query()?.apply_tenant(vec![3, 4])?.get(&executor).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ScopedQuery {
    query: Query,
    scope: TenantScope,
    state: ScopeState,
    // Set while a tenant constraint added by the scope is in force. Survives
    // the move to `Executed`.
    constrained: bool,
}

impl ScopedQuery {
    /// Build a query for the scope's table and apply the ambient tenant.
    pub fn build(scope: TenantScope, context: &TenantContext) -> Result<Self, ScopeError> {
        let mut query = Query::new(scope.table());
        let state = scope.apply(&mut query, context)?;
        Ok(Self {
            query,
            scope,
            state,
            constrained: state == ScopeState::ScopeApplied,
        })
    }

    /// Wrap an existing query (e.g. one parsed from SQL) and apply the
    /// ambient tenant to it.
    pub fn from_query(
        mut query: Query,
        scope: TenantScope,
        context: &TenantContext,
    ) -> Result<Self, ScopeError> {
        let state = scope.apply(&mut query, context)?;
        Ok(Self {
            query,
            scope,
            state,
            constrained: state == ScopeState::ScopeApplied,
        })
    }

    /// A query that never had the scope applied.
    pub fn unscoped(scope: TenantScope) -> Self {
        Self {
            query: Query::new(scope.table()),
            scope,
            state: ScopeState::Unscoped,
            constrained: false,
        }
    }

    pub fn state(&self) -> ScopeState {
        self.state
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn scope(&self) -> &TenantScope {
        &self.scope
    }

    /// The query as it will be executed.
    pub fn into_query(mut self) -> Query {
        if self.constrained {
            self.scope.seal(&mut self.query);
        }
        self.query
    }

    /// `AND column = value`
    pub fn filter(self, column: &str, value: impl Into<Value>) -> Self {
        self.push(Predicate::eq(column, value))
    }

    /// `AND column <op> value`
    pub fn filter_op(self, column: &str, operator: Operator, value: impl Into<Value>) -> Self {
        self.push(Predicate::basic(column, operator, value))
    }

    /// `OR column = value`
    pub fn or_filter(self, column: &str, value: impl Into<Value>) -> Self {
        self.push(Predicate::eq(column, value).or())
    }

    /// `AND column IN (values...)`
    pub fn filter_in<V: Into<Value>>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.push(Predicate::is_in(column, values))
    }

    /// `AND column IS NULL`
    pub fn filter_null(self, column: &str) -> Self {
        self.push(Predicate::is_null(column))
    }

    /// Any predicate, including nested groups.
    pub fn push(mut self, predicate: Predicate) -> Self {
        self.query.push_predicate(predicate);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.query.set_limit(Some(limit));
        self
    }

    /// Drop the tenant predicate; the query then spans every tenant.
    pub fn remove_tenant(mut self) -> Self {
        self.scope.remove(&mut self.query);
        self.state = ScopeState::Unscoped;
        self.constrained = false;
        self
    }

    /// Alias of [`remove_tenant`](Self::remove_tenant).
    pub fn all_tenants(self) -> Self {
        self.remove_tenant()
    }

    /// Scope to specific tenant(s) regardless of the ambient context.
    pub fn apply_tenant(mut self, tenants: impl Into<TenantSelector>) -> Result<Self, ScopeError> {
        self.scope.apply_explicit(&mut self.query, tenants)?;
        self.state = ScopeState::RescopedExplicitly;
        self.constrained = true;
        Ok(self)
    }

    fn prepare(&mut self) -> &Query {
        if self.constrained {
            self.scope.seal(&mut self.query);
        }
        debug_assert!(self.query.is_consistent());
        tracing::debug!(
            table = %self.scope.table(),
            state = ?self.state,
            predicates = self.query.predicates().len(),
            "executing scoped query"
        );
        self.state = ScopeState::Executed;
        &self.query
    }

    /// Fetch matching rows.
    pub async fn get(&mut self, executor: &dyn QueryExecutor) -> Result<Vec<Row>, ScopeError> {
        let query = self.prepare();
        Ok(executor.select(query).await?)
    }

    /// Fetch the first matching row.
    pub async fn first(&mut self, executor: &dyn QueryExecutor) -> Result<Option<Row>, ScopeError> {
        self.query.set_limit(Some(1));
        let query = self.prepare();
        Ok(executor.select(query).await?.into_iter().next())
    }

    /// Count matching rows.
    pub async fn count(&mut self, executor: &dyn QueryExecutor) -> Result<u64, ScopeError> {
        let query = self.prepare();
        Ok(executor.select(query).await?.len() as u64)
    }

    /// Delete matching rows. Returns the number deleted.
    pub async fn delete(&mut self, executor: &dyn QueryExecutor) -> Result<u64, ScopeError> {
        let query = self.prepare();
        Ok(executor.delete(query).await?)
    }
}
