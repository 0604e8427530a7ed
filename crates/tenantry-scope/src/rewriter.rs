//! Tenant constraint rewriting.
//!
//! [`ConstraintRewriter`] adds, finds and removes the tenant predicate on a
//! [`FilterQuery`] while keeping predicates and bindings aligned.

use serde_json::Value;
use tenantry_core::{TenancyError, TenantId};

use crate::error::ScopeError;
use crate::query::{FilterQuery, Operator, Predicate, binding_ranges};

/// Injects and strips tenant predicates for one tenant column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintRewriter {
    column: String,
}

impl ConstraintRewriter {
    /// Create a rewriter for `column` (qualified or bare).
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Whether `column` names the tenant column.
    ///
    /// `orders.tenant_id` and `tenant_id` match each other; two different
    /// qualifiers never do.
    pub fn is_tenant_column(&self, column: &str) -> bool {
        if column == self.column {
            return true;
        }
        match (column.rsplit_once('.'), self.column.rsplit_once('.')) {
            (None, Some((_, ours))) => column == ours,
            (Some((_, theirs)), None) => theirs == self.column,
            _ => false,
        }
    }

    /// Whether `predicate` is a tenant constraint this rewriter owns:
    /// `tenant = x` or `tenant IN (...)` on the tenant column.
    pub fn is_tenant_constraint(&self, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::Basic {
                column,
                operator: Operator::Eq,
                ..
            } => self.is_tenant_column(column),
            Predicate::In {
                column,
                negated: false,
                ..
            } => self.is_tenant_column(column),
            _ => false,
        }
    }

    /// Top-level tenant constraints present on `query`.
    pub fn tenant_constraints<'q, Q: FilterQuery + ?Sized>(&self, query: &'q Q) -> Vec<&'q Predicate> {
        query
            .predicates()
            .iter()
            .filter(|p| self.is_tenant_constraint(p))
            .collect()
    }

    pub fn contains_tenant_constraint<Q: FilterQuery + ?Sized>(&self, query: &Q) -> bool {
        query.predicates().iter().any(|p| self.is_tenant_constraint(p))
    }

    /// Append `column = tenant_id`.
    ///
    /// Existing tenant constraints are removed first, so repeated calls leave
    /// exactly one.
    pub fn inject<Q: FilterQuery + ?Sized>(&self, query: &mut Q, tenant_id: TenantId) {
        self.remove(query);
        query.add_where(&self.column, Value::from(tenant_id.get()));
        tracing::debug!(column = %self.column, tenant_id = %tenant_id, "tenant constraint injected");
    }

    /// Remove every tenant constraint together with its bindings.
    ///
    /// Remaining predicates and bindings keep their relative order. Returns
    /// the number of predicates removed; zero leaves the query untouched.
    pub fn remove<Q: FilterQuery + ?Sized>(&self, query: &mut Q) -> usize {
        if !self.contains_tenant_constraint(query) {
            return 0;
        }

        let ranges = binding_ranges(query.predicates());
        let bindings = query.bindings();
        let mut kept_predicates = Vec::with_capacity(query.predicates().len());
        let mut kept_bindings = Vec::with_capacity(bindings.len());
        let mut removed = 0;

        for (predicate, range) in query.predicates().iter().zip(ranges) {
            if self.is_tenant_constraint(predicate) {
                removed += 1;
                continue;
            }
            match bindings.get(range.clone()) {
                Some(values) => kept_bindings.extend_from_slice(values),
                None => tracing::warn!(
                    range = ?range,
                    bindings = bindings.len(),
                    "bindings out of sync with predicates"
                ),
            }
            kept_predicates.push(predicate.clone());
        }

        query.set_predicates(kept_predicates);
        query.set_bindings(kept_bindings);

        tracing::debug!(column = %self.column, removed, "tenant constraints removed");
        removed
    }

    /// Replace any tenant constraint with an explicit one.
    ///
    /// One id produces `column = id`; several produce `column IN (ids)`. An
    /// empty selection fails with [`TenancyError::TenantIdNotSet`] and the
    /// query is left as it was.
    pub fn apply_explicit<Q: FilterQuery + ?Sized>(
        &self,
        query: &mut Q,
        selector: impl Into<TenantSelector>,
    ) -> Result<(), ScopeError> {
        let ids = selector.into().validate()?;

        self.remove(query);
        match ids.as_slice() {
            [id] => query.add_where(&self.column, Value::from(id.get())),
            _ => query.add_where_in(
                &self.column,
                ids.iter().map(|id| Value::from(id.get())).collect(),
            ),
        }

        tracing::debug!(column = %self.column, tenants = ids.len(), "explicit tenant constraint applied");
        Ok(())
    }
}

/// The tenant(s) passed to an explicit `apply_tenant` call.
///
/// Built from a single id, a collection of ids, or an `Option` of either
/// (`None` is the "null" argument and is rejected).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantSelector {
    One(i64),
    Many(Vec<i64>),
    Absent,
}

impl TenantSelector {
    /// Validate and normalise into a non-empty, duplicate-free id list.
    pub fn validate(self) -> Result<Vec<TenantId>, TenancyError> {
        let raw = match self {
            TenantSelector::One(id) => vec![id],
            TenantSelector::Many(ids) => ids,
            TenantSelector::Absent => Vec::new(),
        };
        if raw.is_empty() {
            return Err(TenancyError::TenantIdNotSet);
        }

        let mut ids: Vec<TenantId> = Vec::with_capacity(raw.len());
        for id in raw {
            let id = TenantId::new(id)?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}

impl From<i64> for TenantSelector {
    fn from(id: i64) -> Self {
        TenantSelector::One(id)
    }
}

impl From<TenantId> for TenantSelector {
    fn from(id: TenantId) -> Self {
        TenantSelector::One(id.get())
    }
}

impl From<Vec<i64>> for TenantSelector {
    fn from(ids: Vec<i64>) -> Self {
        TenantSelector::Many(ids)
    }
}

impl From<&[i64]> for TenantSelector {
    fn from(ids: &[i64]) -> Self {
        TenantSelector::Many(ids.to_vec())
    }
}

impl<const N: usize> From<[i64; N]> for TenantSelector {
    fn from(ids: [i64; N]) -> Self {
        TenantSelector::Many(ids.to_vec())
    }
}

impl<T: Into<TenantSelector>> From<Option<T>> for TenantSelector {
    fn from(ids: Option<T>) -> Self {
        ids.map(Into::into).unwrap_or(TenantSelector::Absent)
    }
}
