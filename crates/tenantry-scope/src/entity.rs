//! Scoped entity types and the pre-persist lifecycle hook.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tenantry_core::TenantContext;

/// A stored row, keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// A persisted record type whose queries are scoped to the current tenant.
///
/// Entities move to and from storage as [`Row`]s through serde, so the field
/// carrying the tenant id must serialize under the configured tenant column
/// name.
pub trait ScopedEntity: Serialize + DeserializeOwned {
    /// Table the entity is stored in.
    const TABLE: &'static str;

    /// Primary key column.
    const KEY: &'static str = "id";

    /// Primary key value, or `None` before the first insert.
    fn key(&self) -> Option<Value>;

    fn tenant_id(&self) -> Option<i64>;

    fn set_tenant_id(&mut self, tenant_id: i64);
}

/// Stamp a new entity with the context's tenant id.
///
/// Only runs on the create path, before the first insert. An entity that
/// already carries a tenant id keeps it. When the context has no tenant id
/// nothing is stamped; the insert is then rejected by the storage not-null
/// constraint on the tenant column. Returns whether the entity was changed.
pub fn before_create<E: ScopedEntity>(entity: &mut E, context: &TenantContext) -> bool {
    if entity.tenant_id().is_some() {
        return false;
    }
    match context.tenant_id() {
        Some(tenant_id) => {
            entity.set_tenant_id(tenant_id);
            tracing::debug!(table = E::TABLE, tenant_id, "new entity stamped with tenant");
            true
        }
        None => false,
    }
}
