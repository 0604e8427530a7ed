//! Entity-level access: a scope, a context and an executor bound together
//! for one [`ScopedEntity`] type.

use serde_json::Value;
use std::marker::PhantomData;
use tenantry_core::{TenancyConfig, TenantContext};

use crate::entity::{Row, ScopedEntity, before_create};
use crate::error::ScopeError;
use crate::executor::QueryExecutor;
use crate::request::current_context;
use crate::scope::{ScopedQuery, TenantScope};

/// Scoped reads and writes for entity type `E`.
pub struct TenantRepository<'a, E> {
    scope: TenantScope,
    context: TenantContext,
    executor: &'a dyn QueryExecutor,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, E: ScopedEntity> TenantRepository<'a, E> {
    pub fn new(
        config: &TenancyConfig,
        context: TenantContext,
        executor: &'a dyn QueryExecutor,
    ) -> Self {
        Self {
            scope: TenantScope::new(config, E::TABLE),
            context,
            executor,
            _entity: PhantomData,
        }
    }

    /// Use the context of the enclosing request scope
    /// (see [`with_tenant_context`](crate::request::with_tenant_context)).
    ///
    /// Outside a request scope the context is unresolved and every scoped
    /// query fails with `TenantIdNotSet`.
    pub fn from_request(config: &TenancyConfig, executor: &'a dyn QueryExecutor) -> Self {
        Self::new(config, current_context().unwrap_or_default(), executor)
    }

    pub fn context(&self) -> &TenantContext {
        &self.context
    }

    pub fn scope(&self) -> &TenantScope {
        &self.scope
    }

    /// A new query with the ambient tenant applied.
    pub fn query(&self) -> Result<ScopedQuery, ScopeError> {
        ScopedQuery::build(self.scope.clone(), &self.context)
    }

    /// A new query without the tenant scope.
    pub fn query_without_scope(&self) -> ScopedQuery {
        ScopedQuery::unscoped(self.scope.clone())
    }

    /// Run `query` and decode the rows.
    pub async fn fetch(&self, query: &mut ScopedQuery) -> Result<Vec<E>, ScopeError> {
        query
            .get(self.executor)
            .await?
            .into_iter()
            .map(decode::<E>)
            .collect()
    }

    /// Every entity visible in the current context.
    pub async fn all(&self) -> Result<Vec<E>, ScopeError> {
        let mut query = self.query()?;
        self.fetch(&mut query).await
    }

    /// The entity with primary key `key`, if visible in the current context.
    pub async fn find(&self, key: impl Into<Value>) -> Result<Option<E>, ScopeError> {
        let mut query = self.query()?.filter(E::KEY, key).limit(1);
        Ok(self.fetch(&mut query).await?.into_iter().next())
    }

    /// Insert a new entity, stamping it with the current tenant first.
    ///
    /// On success `entity` is replaced with the stored version (primary key
    /// included).
    pub async fn create(&self, entity: &mut E) -> Result<(), ScopeError> {
        before_create(entity, &self.context);

        let row = match serde_json::to_value(&*entity) {
            Ok(Value::Object(row)) => row,
            Ok(other) => {
                return Err(ScopeError::Unsupported {
                    reason: format!("{} entity serialized to {}, expected an object", E::TABLE, other),
                });
            }
            Err(source) => {
                return Err(ScopeError::Encode {
                    table: E::TABLE.to_string(),
                    source,
                });
            }
        };

        let stored = self.executor.insert(E::TABLE, row).await?;
        *entity = decode(stored)?;
        Ok(())
    }

    /// Delete `entity` by primary key, ignoring tenant scoping.
    ///
    /// This is the privileged path; ordinary deletes go through
    /// [`query`](Self::query). Returns whether a row was deleted.
    pub async fn admin_delete(&self, entity: &E) -> Result<bool, ScopeError> {
        let key = entity.key().ok_or_else(|| ScopeError::MissingPrimaryKey {
            table: E::TABLE.to_string(),
        })?;

        tracing::info!(table = E::TABLE, key = %key, "admin delete bypassing tenant scope");
        let deleted = self
            .query_without_scope()
            .filter(E::KEY, key)
            .delete(self.executor)
            .await?;
        Ok(deleted > 0)
    }
}

fn decode<E: ScopedEntity>(row: Row) -> Result<E, ScopeError> {
    serde_json::from_value(Value::Object(row)).map_err(|source| ScopeError::Decode {
        table: E::TABLE.to_string(),
        source,
    })
}
